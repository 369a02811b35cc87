use crate::error::FailureKind;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ReferenceError {
    #[error("failed to read reference table {path}: {details}")]
    Read { path: PathBuf, details: String },

    #[error("reference table {0} has no header")]
    Empty(PathBuf),

    #[error("reference table row {row}, column {column}: {value:?} is not numeric")]
    NonNumeric {
        row: usize,
        column: usize,
        value: String,
    },
}

impl ReferenceError {
    pub fn kind(&self) -> FailureKind {
        FailureKind::ReferenceLoadFailure
    }
}

/// Native-speaker baseline: a header row, then rows of `label, value, value, ...`.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceTable {
    pub columns: Vec<String>,
    pub rows: Vec<ReferenceRow>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceRow {
    pub label: String,
    pub values: Vec<f64>,
}

impl ReferenceTable {
    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        let text = std::fs::read_to_string(path).map_err(|e| ReferenceError::Read {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        Self::parse(&text).map_err(|e| match e {
            ReferenceError::Empty(_) => ReferenceError::Empty(path.to_path_buf()),
            other => other,
        })
    }

    pub fn parse(text: &str) -> Result<Self, ReferenceError> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header = lines.next().ok_or(ReferenceError::Empty(PathBuf::new()))?;
        let columns = split_row(header).map(str::to_owned).collect();

        let mut rows = Vec::new();
        for (row, line) in lines.enumerate() {
            let mut cells = split_row(line);
            let label = cells.next().unwrap_or_default().to_owned();
            let values = cells
                .enumerate()
                .map(|(i, cell)| {
                    cell.parse::<f64>().map_err(|_| ReferenceError::NonNumeric {
                        row: row + 1,
                        column: i + 1,
                        value: cell.to_owned(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(ReferenceRow { label, values });
        }
        Ok(Self { columns, rows })
    }
}

fn split_row(line: &str) -> impl Iterator<Item = &str> {
    line.split(',').map(|c| c.trim().trim_matches('"'))
}
