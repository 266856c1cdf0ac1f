use crate::error::{CliError, Result};
use passo::core::io::job_script::BatchSettings;
use passo::engine::config as core_config;
use passo::engine::filter::PreFilterConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileProtocolConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_translation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rotation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design_cutoff: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design_cycles: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_chain: Option<char>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileGridConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spacing: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_per_axis: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_radius: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileBatchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requeue: Option<bool>,
}

impl FileBatchConfig {
    pub fn merge_onto(self, base: BatchSettings) -> BatchSettings {
        BatchSettings {
            partition: self.partition.unwrap_or(base.partition),
            memory: self.memory.unwrap_or(base.memory),
            time_limit: self.time_limit.unwrap_or(base.time_limit),
            requeue: self.requeue.unwrap_or(base.requeue),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileQueueConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admission_cap: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_timeout_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_submit_attempts: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_completion: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<FileBatchConfig>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FileExecutionMode {
    Local,
    Cluster,
}

impl From<FileExecutionMode> for core_config::ExecutionMode {
    fn from(mode: FileExecutionMode) -> Self {
        match mode {
            FileExecutionMode::Local => core_config::ExecutionMode::Local,
            FileExecutionMode::Cluster => core_config::ExecutionMode::Cluster,
        }
    }
}

impl From<core_config::ExecutionMode> for FileExecutionMode {
    fn from(mode: core_config::ExecutionMode) -> Self {
        match mode {
            core_config::ExecutionMode::Local => FileExecutionMode::Local,
            core_config::ExecutionMode::Cluster => FileExecutionMode::Cluster,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileExecutionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<FileExecutionMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoys_per_origin: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileEngineConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

/// Top-level layout of a `passo.toml` search configuration.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<FileProtocolConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<FileGridConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_filter: Option<PreFilterConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<FileQueueConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<FileExecutionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<FileEngineConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| CliError::Other(e.into()))
    }
}
