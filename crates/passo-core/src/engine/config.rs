use super::filter::PreFilterConfig;
use crate::core::io::job_script::BatchSettings;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DECOYS_PER_ORIGIN: usize = 100;
pub const DEFAULT_MAX_STEPS: usize = 2000;
pub const DEFAULT_MAX_TRANSLATION: f64 = 0.5;
pub const DEFAULT_MAX_ROTATION_DEGREES: f64 = 3.0;
pub const DEFAULT_DESIGN_CUTOFF: f64 = 9.0;
pub const DEFAULT_DESIGN_CYCLES: usize = 4;
pub const DEFAULT_ADMISSION_CAP: usize = 500;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_SUBMIT_ATTEMPTS: usize = 3;
pub const DEFAULT_GRID_SPACING: f64 = 1.0;
pub const DEFAULT_GRID_POINTS_PER_AXIS: usize = 3;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Local,
    Cluster,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolConfig {
    pub max_steps: usize,
    /// Å
    pub max_translation: f64,
    pub max_rotation_degrees: f64,
    /// Å
    pub design_cutoff: f64,
    pub design_cycles: usize,
    pub target_chain: char,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    pub spacing: f64,
    pub points_per_axis: usize,
    pub max_radius: Option<f64>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            spacing: DEFAULT_GRID_SPACING,
            points_per_axis: DEFAULT_GRID_POINTS_PER_AXIS,
            max_radius: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    pub admission_cap: usize,
    pub poll_interval: Duration,
    pub call_timeout: Duration,
    pub max_submit_attempts: usize,
    pub user: String,
    pub wait_for_completion: bool,
    pub batch: BatchSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub mode: ExecutionMode,
    pub decoys_per_origin: usize,
    pub max_parallel: usize,
    pub seed: Option<u64>,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassoConfig {
    pub protocol: ProtocolConfig,
    pub grid: GridConfig,
    pub filter: PreFilterConfig,
    pub queue: QueueConfig,
    pub execution: ExecutionConfig,
}

#[derive(Default)]
pub struct PassoConfigBuilder {
    max_steps: Option<usize>,
    max_translation: Option<f64>,
    max_rotation_degrees: Option<f64>,
    design_cutoff: Option<f64>,
    design_cycles: Option<usize>,
    target_chain: Option<char>,
    grid: Option<GridConfig>,
    filter: Option<PreFilterConfig>,
    admission_cap: Option<usize>,
    poll_interval: Option<Duration>,
    call_timeout: Option<Duration>,
    max_submit_attempts: Option<usize>,
    queue_user: Option<String>,
    wait_for_completion: Option<bool>,
    batch: Option<BatchSettings>,
    mode: Option<ExecutionMode>,
    decoys_per_origin: Option<usize>,
    max_parallel: Option<usize>,
    seed: Option<u64>,
    output_dir: Option<PathBuf>,
}

impl PassoConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_steps(mut self, steps: usize) -> Self {
        self.max_steps = Some(steps);
        self
    }
    pub fn max_translation(mut self, angstroms: f64) -> Self {
        self.max_translation = Some(angstroms);
        self
    }
    pub fn max_rotation_degrees(mut self, degrees: f64) -> Self {
        self.max_rotation_degrees = Some(degrees);
        self
    }
    pub fn design_cutoff(mut self, angstroms: f64) -> Self {
        self.design_cutoff = Some(angstroms);
        self
    }
    pub fn design_cycles(mut self, cycles: usize) -> Self {
        self.design_cycles = Some(cycles);
        self
    }
    pub fn target_chain(mut self, chain: char) -> Self {
        self.target_chain = Some(chain);
        self
    }
    pub fn grid(mut self, grid: GridConfig) -> Self {
        self.grid = Some(grid);
        self
    }
    pub fn filter(mut self, filter: PreFilterConfig) -> Self {
        self.filter = Some(filter);
        self
    }
    pub fn admission_cap(mut self, cap: usize) -> Self {
        self.admission_cap = Some(cap);
        self
    }
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }
    pub fn max_submit_attempts(mut self, attempts: usize) -> Self {
        self.max_submit_attempts = Some(attempts);
        self
    }
    pub fn queue_user(mut self, user: impl Into<String>) -> Self {
        self.queue_user = Some(user.into());
        self
    }
    pub fn wait_for_completion(mut self, wait: bool) -> Self {
        self.wait_for_completion = Some(wait);
        self
    }
    pub fn batch_settings(mut self, batch: BatchSettings) -> Self {
        self.batch = Some(batch);
        self
    }
    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = Some(mode);
        self
    }
    pub fn decoys_per_origin(mut self, n: usize) -> Self {
        self.decoys_per_origin = Some(n);
        self
    }
    pub fn max_parallel(mut self, n: usize) -> Self {
        self.max_parallel = Some(n);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }

    pub fn build(self) -> Result<PassoConfig, ConfigError> {
        let protocol = ProtocolConfig {
            max_steps: self.max_steps.unwrap_or(DEFAULT_MAX_STEPS),
            max_translation: self.max_translation.unwrap_or(DEFAULT_MAX_TRANSLATION),
            max_rotation_degrees: self
                .max_rotation_degrees
                .unwrap_or(DEFAULT_MAX_ROTATION_DEGREES),
            design_cutoff: self.design_cutoff.unwrap_or(DEFAULT_DESIGN_CUTOFF),
            design_cycles: self.design_cycles.unwrap_or(DEFAULT_DESIGN_CYCLES),
            target_chain: self
                .target_chain
                .ok_or(ConfigError::MissingParameter("target_chain"))?,
        };
        let queue = QueueConfig {
            admission_cap: self.admission_cap.unwrap_or(DEFAULT_ADMISSION_CAP),
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            call_timeout: self.call_timeout.unwrap_or(DEFAULT_CALL_TIMEOUT),
            max_submit_attempts: self
                .max_submit_attempts
                .unwrap_or(DEFAULT_MAX_SUBMIT_ATTEMPTS),
            user: self.queue_user.unwrap_or_default(),
            wait_for_completion: self.wait_for_completion.unwrap_or(false),
            batch: self.batch.unwrap_or_default(),
        };
        let execution = ExecutionConfig {
            mode: self.mode.unwrap_or(ExecutionMode::Local),
            decoys_per_origin: self.decoys_per_origin.unwrap_or(DEFAULT_DECOYS_PER_ORIGIN),
            max_parallel: self.max_parallel.unwrap_or(1),
            seed: self.seed,
            output_dir: self
                .output_dir
                .ok_or(ConfigError::MissingParameter("output_dir"))?,
        };
        let config = PassoConfig {
            protocol,
            grid: self.grid.unwrap_or_default(),
            filter: self.filter.unwrap_or_default(),
            queue,
            execution,
        };
        config.validate()?;
        Ok(config)
    }
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        parameter,
        reason: reason.into(),
    }
}

impl PassoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.protocol;
        if !p.max_translation.is_finite() || p.max_translation < 0.0 {
            return Err(invalid("max_translation", "must be a non-negative distance"));
        }
        if !(0.0..=180.0).contains(&p.max_rotation_degrees) {
            return Err(invalid("max_rotation_degrees", "must lie within [0, 180]"));
        }
        if !p.design_cutoff.is_finite() || p.design_cutoff <= 0.0 {
            return Err(invalid("design_cutoff", "must be positive"));
        }
        if p.design_cycles == 0 {
            return Err(invalid("design_cycles", "at least one cycle is required"));
        }
        if !self.grid.spacing.is_finite() || self.grid.spacing <= 0.0 {
            return Err(invalid("grid.spacing", "must be positive"));
        }
        if self.grid.points_per_axis == 0 {
            return Err(invalid("grid.points_per_axis", "must be at least 1"));
        }
        if matches!(self.grid.max_radius, Some(r) if !r.is_finite() || r < 0.0) {
            return Err(invalid("grid.max_radius", "must be a non-negative distance"));
        }
        if self.queue.admission_cap == 0 {
            return Err(invalid("queue.admission_cap", "must be at least 1"));
        }
        if self.queue.max_submit_attempts == 0 {
            return Err(invalid("queue.max_submit_attempts", "must be at least 1"));
        }
        if self.execution.max_parallel == 0 {
            return Err(invalid("execution.max_parallel", "must be at least 1"));
        }
        if self.execution.mode == ExecutionMode::Cluster && self.queue.user.is_empty() {
            return Err(ConfigError::MissingParameter("queue.user"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> PassoConfigBuilder {
        PassoConfigBuilder::new()
            .target_chain('C')
            .output_dir(PathBuf::from("out"))
    }

    #[test]
    fn build_fills_protocol_defaults() {
        let config = minimal().build().unwrap();

        assert_eq!(config.protocol.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(config.protocol.max_translation, 0.5);
        assert_eq!(config.protocol.max_rotation_degrees, 3.0);
        assert_eq!(config.protocol.design_cutoff, 9.0);
        assert_eq!(config.queue.admission_cap, 500);
        assert_eq!(config.execution.decoys_per_origin, 100);
        assert_eq!(config.execution.mode, ExecutionMode::Local);
    }

    #[test]
    fn build_requires_target_chain() {
        let result = PassoConfigBuilder::new()
            .output_dir(PathBuf::from("out"))
            .build();
        assert_eq!(result, Err(ConfigError::MissingParameter("target_chain")));
    }

    #[test]
    fn build_requires_output_dir() {
        let result = PassoConfigBuilder::new().target_chain('C').build();
        assert_eq!(result, Err(ConfigError::MissingParameter("output_dir")));
    }

    #[test]
    fn negative_translation_is_rejected() {
        let result = minimal().max_translation(-0.1).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                parameter: "max_translation",
                ..
            })
        ));
    }

    #[test]
    fn zero_admission_cap_is_rejected() {
        let result = minimal().admission_cap(0).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                parameter: "queue.admission_cap",
                ..
            })
        ));
    }

    #[test]
    fn cluster_mode_requires_queue_user() {
        let result = minimal().execution_mode(ExecutionMode::Cluster).build();
        assert_eq!(result, Err(ConfigError::MissingParameter("queue.user")));

        let ok = minimal()
            .execution_mode(ExecutionMode::Cluster)
            .queue_user("jdoe")
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn zero_grid_spacing_is_rejected() {
        let result = minimal()
            .grid(GridConfig {
                spacing: 0.0,
                ..GridConfig::default()
            })
            .build();
        assert!(result.is_err());
    }
}
