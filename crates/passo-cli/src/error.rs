use passo::engine::error::EngineError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Decoy {decoy} failed: {message}")]
    DecoyFailed { decoy: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Process exit code. Failures of the search itself are distinguished from usage errors
    /// so batch scripts can tell a bad decoy from a bad invocation.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::DecoyFailed { .. } => 3,
            CliError::Engine(e) if !e.is_run_fatal() => 3,
            CliError::Config(_) | CliError::Argument(_) | CliError::FileParsing { .. } => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passo::engine::collaborators::DesignEngineError;
    use passo::engine::config::ConfigError;

    #[test]
    fn engine_errors_are_displayed_transparently() {
        let err: CliError = EngineError::InvalidGeometry("A and B coincide".into()).into();
        assert_eq!(err.to_string(), "Invalid docking geometry: A and B coincide");
    }

    #[test]
    fn exit_codes_separate_usage_from_search_failures() {
        let usage = CliError::Argument("bad".into());
        let fatal: CliError = EngineError::from(ConfigError::MissingParameter("target_chain")).into();
        let design: CliError =
            EngineError::from(DesignEngineError::Simulation("diverged".into())).into();

        assert_eq!(usage.exit_code(), 2);
        assert_eq!(fatal.exit_code(), 1);
        assert_eq!(design.exit_code(), 3);
        let failed = CliError::DecoyFailed {
            decoy: "1_3".into(),
            message: "packer diverged".into(),
        };
        assert_eq!(failed.exit_code(), 3);
        assert_eq!(failed.to_string(), "Decoy 1_3 failed: packer diverged");
    }
}
