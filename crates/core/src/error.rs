use crate::engine::EngineError;
use crate::metrics::ParseError;
use crate::normalize::NormalizeError;
use crate::workspace::WorkspaceError;
use serde::{Deserialize, Serialize};

/// Why one analysis branch produced no result.
#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

/// Failure taxonomy reported per branch. Classification and reference-table problems
/// are logged and never fail a branch; they are listed so callers can match exhaustively.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InputNotFound,
    EngineInvocationFailure,
    EngineTimeout,
    ParseFailure,
    ClassificationFailure,
    ReferenceLoadFailure,
    WorkspaceFailure,
}

impl AnalysisError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Normalize(NormalizeError::InputNotFound(_)) => FailureKind::InputNotFound,
            Self::Normalize(_) => FailureKind::EngineInvocationFailure,
            Self::Engine(EngineError::Timeout(_)) => FailureKind::EngineTimeout,
            Self::Engine(e) if e.is_input_missing() => FailureKind::InputNotFound,
            Self::Engine(_) => FailureKind::EngineInvocationFailure,
            Self::Parse(_) => FailureKind::ParseFailure,
            Self::Workspace(_) => FailureKind::WorkspaceFailure,
        }
    }
}
