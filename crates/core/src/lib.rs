pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod prosody;
pub mod workspace;
