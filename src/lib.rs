pub mod bio;
pub mod cli;
pub mod core;
pub mod pipeline;
pub mod stats;
pub mod tools;
pub mod utils;

pub use crate::core::{config::Config, layout::OutputLayout};
pub use crate::pipeline::{Pipeline, RunSummary};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KmatrixError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{stage} precondition failed: {message}")]
    Precondition { stage: String, message: String },

    #[error("External command failed (exit code {code:?}): {command}\n{stderr}")]
    ExternalProcess {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Sampling error: {0}")]
    Sampling(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for KmatrixError {
    fn from(err: serde_json::Error) -> Self {
        KmatrixError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for KmatrixError {
    fn from(err: bincode::Error) -> Self {
        KmatrixError::Serialization(err.to_string())
    }
}

impl From<tempfile::PersistError> for KmatrixError {
    fn from(err: tempfile::PersistError) -> Self {
        KmatrixError::Io(err.error)
    }
}

impl From<tempfile::PathPersistError> for KmatrixError {
    fn from(err: tempfile::PathPersistError) -> Self {
        KmatrixError::Io(err.error)
    }
}

impl KmatrixError {
    /// Prefix the message with the stage and the artifact it was working on.
    /// Variants that already name their subject are returned unchanged.
    pub fn in_stage(self, stage: &str, artifact: impl std::fmt::Display) -> Self {
        let at = |msg: String| format!("{} stage, {}: {}", stage, artifact, msg);
        match self {
            KmatrixError::Io(e) => KmatrixError::Io(std::io::Error::new(e.kind(), at(e.to_string()))),
            KmatrixError::Parse(msg) => KmatrixError::Parse(at(msg)),
            KmatrixError::Engine(msg) => KmatrixError::Engine(at(msg)),
            KmatrixError::Sampling(msg) => KmatrixError::Sampling(at(msg)),
            KmatrixError::Serialization(msg) => KmatrixError::Serialization(at(msg)),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, KmatrixError>;
