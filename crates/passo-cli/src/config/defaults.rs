use passo::core::io::job_script::BatchSettings;
use passo::engine::config as core_config;
use passo::engine::filter::PreFilterConfig;
use std::path::PathBuf;
use std::time::Duration;

pub struct DefaultsConfig {
    pub max_steps: usize,
    pub max_translation: f64,
    pub max_rotation_degrees: f64,
    pub design_cutoff: f64,
    pub design_cycles: usize,
    pub grid_spacing: f64,
    pub grid_points_per_axis: usize,
    pub pre_filter: PreFilterConfig,
    pub admission_cap: usize,
    pub poll_interval: Duration,
    pub call_timeout: Duration,
    pub max_submit_attempts: usize,
    pub queue_user: Option<String>,
    pub batch: BatchSettings,
    pub mode: core_config::ExecutionMode,
    pub decoys_per_origin: usize,
    pub max_parallel: usize,
    pub output_dir: PathBuf,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            max_steps: core_config::DEFAULT_MAX_STEPS,
            max_translation: core_config::DEFAULT_MAX_TRANSLATION,
            max_rotation_degrees: core_config::DEFAULT_MAX_ROTATION_DEGREES,
            design_cutoff: core_config::DEFAULT_DESIGN_CUTOFF,
            design_cycles: core_config::DEFAULT_DESIGN_CYCLES,
            grid_spacing: core_config::DEFAULT_GRID_SPACING,
            grid_points_per_axis: core_config::DEFAULT_GRID_POINTS_PER_AXIS,
            pre_filter: PreFilterConfig::default(),
            admission_cap: core_config::DEFAULT_ADMISSION_CAP,
            poll_interval: core_config::DEFAULT_POLL_INTERVAL,
            call_timeout: core_config::DEFAULT_CALL_TIMEOUT,
            max_submit_attempts: core_config::DEFAULT_MAX_SUBMIT_ATTEMPTS,
            queue_user: std::env::var("USER").ok().filter(|u| !u.is_empty()),
            batch: BatchSettings::default(),
            mode: core_config::ExecutionMode::Local,
            decoys_per_origin: core_config::DEFAULT_DECOYS_PER_ORIGIN,
            max_parallel: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            output_dir: PathBuf::from("passo_output"),
        }
    }
}
