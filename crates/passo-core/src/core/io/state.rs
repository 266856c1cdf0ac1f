use super::atomic::atomic_write;
use super::error::ReportError;
use crate::core::models::decoy::DecoyStatus;
use crate::core::models::ids::JobId;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Durable summary of a decoy, replaced atomically on every status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DecoyState {
    pub status: DecoyStatus,
    pub steps_completed: usize,
    pub max_steps: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DecoyState {
    pub fn queued(max_steps: usize) -> Self {
        Self {
            status: DecoyStatus::Queued,
            ..Self::running(max_steps)
        }
    }

    pub fn running(max_steps: usize) -> Self {
        Self {
            status: DecoyStatus::Running,
            steps_completed: 0,
            max_steps,
            best_energy: None,
            structure: None,
            message: None,
        }
    }

    pub fn failed(steps_completed: usize, max_steps: usize, message: impl Into<String>) -> Self {
        Self {
            status: DecoyStatus::Failed,
            steps_completed,
            max_steps,
            best_energy: None,
            structure: None,
            message: Some(message.into()),
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        let content = toml::to_string(self).map_err(|e| ReportError::TomlWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
        atomic_write(path, content.as_bytes()).map_err(|e| ReportError::io(path, e))
    }

    pub fn read(path: &Path) -> Result<Self, ReportError> {
        let content = std::fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
        toml::from_str(&content).map_err(|e| ReportError::TomlParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn read_if_exists(path: &Path) -> Result<Option<Self>, ReportError> {
        if !path.exists() {
            return Ok(None);
        }
        Self::read(path).map(Some)
    }
}

/// Records the queue job that owns a decoy. Only the submitting driver writes this file;
/// the decoy job itself never touches it.
pub fn record_job_id(path: &Path, id: &JobId) -> Result<(), ReportError> {
    atomic_write(path, format!("{}\n", id).as_bytes()).map_err(|e| ReportError::io(path, e))
}

/// The job last submitted for a decoy, if any was recorded.
pub fn recorded_job_id(path: &Path) -> Result<Option<JobId>, ReportError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let id = content.trim();
            Ok((!id.is_empty()).then(|| JobId(id.to_string())))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ReportError::io(path, e)),
    }
}
