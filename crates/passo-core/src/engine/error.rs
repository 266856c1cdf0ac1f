use thiserror::Error;

use super::collaborators::{DesignEngineError, GeometryError, QueueError};
use super::config::ConfigError;
use crate::core::io::error::ReportError;
use crate::core::models::pose::BlockId;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid docking geometry: {0}")]
    InvalidGeometry(String),

    #[error("Structural block {block} not found in the input structure")]
    BlockNotFound { block: BlockId },

    #[error("Design engine failed: {source}")]
    Design {
        #[from]
        source: DesignEngineError,
    },

    #[error("Queue system error: {source}")]
    Queue {
        #[from]
        source: QueueError,
    },

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Reporter error: {source}")]
    Report {
        #[from]
        source: ReportError,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl From<GeometryError> for EngineError {
    fn from(e: GeometryError) -> Self {
        match e {
            GeometryError::BlockNotFound { block } => EngineError::BlockNotFound { block },
            GeometryError::Degenerate(msg) => EngineError::InvalidGeometry(msg),
        }
    }
}

impl EngineError {
    /// Errors that end the whole run before any work is submitted.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidGeometry(_)
                | EngineError::BlockNotFound { .. }
                | EngineError::Config { .. }
        )
    }
}
