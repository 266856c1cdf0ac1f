use super::file::{
    FileBatchConfig, FileConfig, FileEngineConfig, FileExecutionConfig, FileGridConfig,
    FileProtocolConfig, FileQueueConfig,
};
use crate::error::{CliError, Result};
use passo::core::io::atomic::atomic_write;
use passo::engine::config as core_config;
use std::path::PathBuf;

/// File name of the resolved configuration written into the output directory.
pub const SNAPSHOT_FILE: &str = "passo.toml";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSettings {
    pub program: Option<String>,
    pub args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub geometry_path: PathBuf,
    pub core_config: core_config::PassoConfig,
    pub engine: EngineSettings,
}

impl AppConfig {
    pub fn output_dir(&self) -> &PathBuf {
        &self.core_config.execution.output_dir
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.output_dir().join(SNAPSHOT_FILE)
    }

    /// The fully resolved configuration in file form. Loading it reproduces `core_config`.
    pub fn to_file_config(&self) -> FileConfig {
        let c = &self.core_config;
        FileConfig {
            protocol: Some(FileProtocolConfig {
                max_steps: Some(c.protocol.max_steps),
                max_translation: Some(c.protocol.max_translation),
                max_rotation: Some(c.protocol.max_rotation_degrees),
                design_cutoff: Some(c.protocol.design_cutoff),
                design_cycles: Some(c.protocol.design_cycles),
                target_chain: Some(c.protocol.target_chain),
            }),
            grid: Some(FileGridConfig {
                spacing: Some(c.grid.spacing),
                points_per_axis: Some(c.grid.points_per_axis),
                max_radius: c.grid.max_radius,
            }),
            pre_filter: Some(c.filter.clone()),
            queue: Some(FileQueueConfig {
                admission_cap: Some(c.queue.admission_cap),
                poll_interval_secs: Some(c.queue.poll_interval.as_secs_f64()),
                call_timeout_secs: Some(c.queue.call_timeout.as_secs_f64()),
                max_submit_attempts: Some(c.queue.max_submit_attempts),
                user: Some(c.queue.user.clone()).filter(|u| !u.is_empty()),
                wait_for_completion: Some(c.queue.wait_for_completion),
                batch: Some(FileBatchConfig {
                    partition: Some(c.queue.batch.partition.clone()),
                    memory: Some(c.queue.batch.memory.clone()),
                    time_limit: Some(c.queue.batch.time_limit.clone()),
                    requeue: Some(c.queue.batch.requeue),
                }),
            }),
            execution: Some(FileExecutionConfig {
                mode: Some(c.execution.mode.into()),
                decoys_per_origin: Some(c.execution.decoys_per_origin),
                max_parallel: Some(c.execution.max_parallel),
                seed: c.execution.seed,
                output_dir: Some(c.execution.output_dir.clone()),
            }),
            engine: Some(FileEngineConfig {
                program: self.engine.program.clone(),
                args: self.engine.args.clone(),
            }),
        }
    }

    /// Writes the resolved configuration so batch jobs run with exactly these settings.
    pub fn write_snapshot(&self) -> Result<PathBuf> {
        let path = self.snapshot_path();
        let content = self.to_file_config().to_toml()?;
        atomic_write(&path, content.as_bytes()).map_err(CliError::Io)?;
        Ok(path)
    }
}
