use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileExecutionMode};
use super::models::{AppConfig, EngineSettings};
use crate::cli::{ModeArg, RunArgs, SearchArgs};
use crate::error::{CliError, Result};
use passo::engine::config as core_config;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Settings only the `run` command can override from the command line.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOverrides {
    pub mode: Option<ModeArg>,
    pub max_parallel: Option<usize>,
    pub admission_cap: Option<usize>,
    pub wait: bool,
}

impl From<&RunArgs> for ExecutionOverrides {
    fn from(args: &RunArgs) -> Self {
        Self {
            mode: args.mode,
            max_parallel: args.max_parallel,
            admission_cap: args.admission_cap,
            wait: args.wait,
        }
    }
}

/// Resolves the search configuration: command-line flags over `-S` values over the config
/// file over built-in defaults.
pub fn build_config(args: &SearchArgs, overrides: &ExecutionOverrides) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    if !args.geometry.exists() {
        return Err(CliError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Geometry file does not exist: {}", args.geometry.display()),
        )));
    }

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let protocol = file_config.protocol.take().unwrap_or_default();
    let grid = file_config.grid.take().unwrap_or_default();
    let queue = file_config.queue.take().unwrap_or_default();
    let execution = file_config.execution.take().unwrap_or_default();
    let engine = file_config.engine.take().unwrap_or_default();

    let max_steps = args
        .max_steps
        .or(protocol.max_steps)
        .unwrap_or(defaults.max_steps);
    let decoys_per_origin = args
        .decoys
        .or(execution.decoys_per_origin)
        .unwrap_or(defaults.decoys_per_origin);
    let target_chain = args.target_chain.or(protocol.target_chain).ok_or_else(|| {
        CliError::Config(
            "`protocol.target-chain` is required either in the config file or via --target-chain."
                .to_string(),
        )
    })?;

    let mode = match overrides.mode {
        Some(ModeArg::Local) => core_config::ExecutionMode::Local,
        Some(ModeArg::Cluster) => core_config::ExecutionMode::Cluster,
        None => execution.mode.map(Into::into).unwrap_or(defaults.mode),
    };

    let poll_interval = seconds(
        "queue.poll-interval-secs",
        queue.poll_interval_secs,
        defaults.poll_interval,
    )?;
    let call_timeout = seconds(
        "queue.call-timeout-secs",
        queue.call_timeout_secs,
        defaults.call_timeout,
    )?;

    let output_dir = args
        .output_dir
        .clone()
        .or(execution.output_dir)
        .unwrap_or(defaults.output_dir);

    let mut builder = core_config::PassoConfigBuilder::new()
        .max_steps(max_steps)
        .max_translation(protocol.max_translation.unwrap_or(defaults.max_translation))
        .max_rotation_degrees(
            protocol
                .max_rotation
                .unwrap_or(defaults.max_rotation_degrees),
        )
        .design_cutoff(protocol.design_cutoff.unwrap_or(defaults.design_cutoff))
        .design_cycles(protocol.design_cycles.unwrap_or(defaults.design_cycles))
        .target_chain(target_chain)
        .grid(core_config::GridConfig {
            spacing: grid.spacing.unwrap_or(defaults.grid_spacing),
            points_per_axis: grid
                .points_per_axis
                .unwrap_or(defaults.grid_points_per_axis),
            max_radius: grid.max_radius,
        })
        .filter(file_config.pre_filter.take().unwrap_or(defaults.pre_filter))
        .admission_cap(
            overrides
                .admission_cap
                .or(queue.admission_cap)
                .unwrap_or(defaults.admission_cap),
        )
        .poll_interval(poll_interval)
        .call_timeout(call_timeout)
        .max_submit_attempts(
            queue
                .max_submit_attempts
                .unwrap_or(defaults.max_submit_attempts),
        )
        .wait_for_completion(overrides.wait || queue.wait_for_completion.unwrap_or(false))
        .batch_settings(queue.batch.unwrap_or_default().merge_onto(defaults.batch))
        .execution_mode(mode)
        .decoys_per_origin(decoys_per_origin)
        .max_parallel(
            overrides
                .max_parallel
                .or(execution.max_parallel)
                .unwrap_or(defaults.max_parallel),
        )
        .output_dir(output_dir);

    if let Some(user) = queue.user.or(defaults.queue_user) {
        builder = builder.queue_user(user);
    }
    if let Some(seed) = args.seed.or(execution.seed) {
        builder = builder.seed(seed);
    }

    let core_config = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AppConfig {
        geometry_path: args.geometry.clone(),
        core_config,
        engine: EngineSettings {
            program: engine.program,
            args: engine.args,
        },
    })
}

fn seconds(key: &str, value: Option<f64>, default: Duration) -> Result<Duration> {
    match value {
        None => Ok(default),
        Some(secs) => Duration::try_from_secs_f64(secs).map_err(|_| {
            CliError::Config(format!(
                "Invalid duration for {}: {} (expected non-negative seconds)",
                key, secs
            ))
        }),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    if set_values.is_empty() {
        return Ok(config);
    }
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };

        match key {
            "protocol.max-steps" => {
                config.protocol.get_or_insert_with(Default::default).max_steps =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "protocol.max-translation" => {
                config.protocol.get_or_insert_with(Default::default).max_translation =
                    Some(parse_value(key, value_str, "float")?);
            }
            "protocol.max-rotation" => {
                config.protocol.get_or_insert_with(Default::default).max_rotation =
                    Some(parse_value(key, value_str, "float")?);
            }
            "protocol.design-cutoff" => {
                config.protocol.get_or_insert_with(Default::default).design_cutoff =
                    Some(parse_value(key, value_str, "float")?);
            }
            "protocol.design-cycles" => {
                config.protocol.get_or_insert_with(Default::default).design_cycles =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "protocol.target-chain" => {
                config.protocol.get_or_insert_with(Default::default).target_chain =
                    Some(parse_value(key, value_str, "chain")?);
            }
            "grid.spacing" => {
                config.grid.get_or_insert_with(Default::default).spacing =
                    Some(parse_value(key, value_str, "float")?);
            }
            "grid.points-per-axis" => {
                config
                    .grid
                    .get_or_insert_with(Default::default)
                    .points_per_axis = Some(parse_value(key, value_str, "integer")?);
            }
            "grid.max-radius" => {
                config.grid.get_or_insert_with(Default::default).max_radius =
                    Some(parse_value(key, value_str, "float")?);
            }
            "pre-filter.min-distance" => {
                config
                    .pre_filter
                    .get_or_insert_with(Default::default)
                    .min_distance = Some(parse_value(key, value_str, "float")?);
            }
            "pre-filter.max-distance" => {
                config
                    .pre_filter
                    .get_or_insert_with(Default::default)
                    .max_distance = Some(parse_value(key, value_str, "float")?);
            }
            "pre-filter.clash-distance" => {
                config
                    .pre_filter
                    .get_or_insert_with(Default::default)
                    .clash_distance = parse_value(key, value_str, "float")?;
            }
            "pre-filter.max-clashes" => {
                config
                    .pre_filter
                    .get_or_insert_with(Default::default)
                    .max_clashes = Some(parse_value(key, value_str, "integer")?);
            }
            "pre-filter.contact-distance" => {
                config
                    .pre_filter
                    .get_or_insert_with(Default::default)
                    .contact_distance = parse_value(key, value_str, "float")?;
            }
            "pre-filter.min-contacts" => {
                config
                    .pre_filter
                    .get_or_insert_with(Default::default)
                    .min_contacts = Some(parse_value(key, value_str, "integer")?);
            }
            "queue.admission-cap" => {
                config.queue.get_or_insert_with(Default::default).admission_cap =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "queue.poll-interval-secs" => {
                config
                    .queue
                    .get_or_insert_with(Default::default)
                    .poll_interval_secs = Some(parse_value(key, value_str, "float")?);
            }
            "queue.call-timeout-secs" => {
                config
                    .queue
                    .get_or_insert_with(Default::default)
                    .call_timeout_secs = Some(parse_value(key, value_str, "float")?);
            }
            "queue.max-submit-attempts" => {
                config
                    .queue
                    .get_or_insert_with(Default::default)
                    .max_submit_attempts = Some(parse_value(key, value_str, "integer")?);
            }
            "queue.user" => {
                config.queue.get_or_insert_with(Default::default).user =
                    Some(value_str.to_string());
            }
            "queue.wait-for-completion" => {
                config
                    .queue
                    .get_or_insert_with(Default::default)
                    .wait_for_completion = Some(parse_value(key, value_str, "boolean")?);
            }
            "queue.batch.partition" | "queue.batch.memory" | "queue.batch.time-limit" => {
                let batch = config
                    .queue
                    .get_or_insert_with(Default::default)
                    .batch
                    .get_or_insert_with(Default::default);
                let slot = match key {
                    "queue.batch.partition" => &mut batch.partition,
                    "queue.batch.memory" => &mut batch.memory,
                    _ => &mut batch.time_limit,
                };
                *slot = Some(value_str.to_string());
            }
            "queue.batch.requeue" => {
                config
                    .queue
                    .get_or_insert_with(Default::default)
                    .batch
                    .get_or_insert_with(Default::default)
                    .requeue = Some(parse_value(key, value_str, "boolean")?);
            }
            "execution.mode" => {
                let mode = match value_str {
                    "local" => FileExecutionMode::Local,
                    "cluster" => FileExecutionMode::Cluster,
                    _ => {
                        return Err(CliError::Config(format!(
                            "Invalid mode for {}: {} (expected 'local' or 'cluster')",
                            key, value_str
                        )));
                    }
                };
                config.execution.get_or_insert_with(Default::default).mode = Some(mode);
            }
            "execution.decoys-per-origin" => {
                config
                    .execution
                    .get_or_insert_with(Default::default)
                    .decoys_per_origin = Some(parse_value(key, value_str, "integer")?);
            }
            "execution.max-parallel" => {
                config
                    .execution
                    .get_or_insert_with(Default::default)
                    .max_parallel = Some(parse_value(key, value_str, "integer")?);
            }
            "execution.seed" => {
                config.execution.get_or_insert_with(Default::default).seed =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "execution.output-dir" => {
                config
                    .execution
                    .get_or_insert_with(Default::default)
                    .output_dir = Some(PathBuf::from(value_str));
            }
            "engine.program" => {
                config.engine.get_or_insert_with(Default::default).program =
                    Some(value_str.to_string());
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::FileConfig;
    use std::fs;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    fn setup() -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let geometry = dir.path().join("geometry.toml");
        fs::write(&geometry, "").unwrap();
        (dir, geometry)
    }

    fn base_args(geometry: &Path) -> SearchArgs {
        SearchArgs {
            geometry: geometry.to_path_buf(),
            target_chain: Some('C'),
            ..Default::default()
        }
    }

    #[test]
    fn build_config_fills_defaults() {
        let (_dir, geometry) = setup();
        let app = build_config(&base_args(&geometry), &ExecutionOverrides::default()).unwrap();
        let cfg = app.core_config;
        let defaults = DefaultsConfig::default();

        assert_eq!(cfg.protocol.max_steps, defaults.max_steps);
        assert_eq!(cfg.protocol.max_translation, 0.5);
        assert_eq!(cfg.protocol.max_rotation_degrees, 3.0);
        assert_eq!(cfg.protocol.design_cutoff, 9.0);
        assert_eq!(cfg.protocol.design_cycles, 4);
        assert_eq!(cfg.execution.decoys_per_origin, 100);
        assert_eq!(cfg.execution.mode, core_config::ExecutionMode::Local);
        assert_eq!(cfg.execution.output_dir, PathBuf::from("passo_output"));
        assert_eq!(cfg.queue.admission_cap, 500);
        assert_eq!(cfg.queue.poll_interval, Duration::from_secs(30));
        assert_eq!(cfg.execution.seed, None);
        assert_eq!(app.engine, EngineSettings::default());
    }

    #[test]
    fn build_config_reads_file_and_merges() {
        let (dir, geometry) = setup();
        let cfg_path = dir.path().join("passo.toml");
        fs::write(
            &cfg_path,
            r#"
            [protocol]
            max-steps = 150
            design-cycles = 2
            target-chain = "B"

            [grid]
            points-per-axis = 5

            [queue]
            poll-interval-secs = 2.5
            user = "jdoe"

            [queue.batch]
            memory = "8GB"

            [execution]
            mode = "cluster"
            decoys-per-origin = 10
            seed = 42

            [engine]
            program = "design-engine"
            "#,
        )
        .unwrap();

        let mut args = base_args(&geometry);
        args.config = Some(cfg_path);
        args.target_chain = None;

        let app = build_config(&args, &ExecutionOverrides::default()).unwrap();
        let cfg = &app.core_config;

        assert_eq!(cfg.protocol.max_steps, 150);
        assert_eq!(cfg.protocol.design_cycles, 2);
        assert_eq!(cfg.protocol.target_chain, 'B');
        assert_eq!(cfg.grid.points_per_axis, 5);
        assert_eq!(cfg.queue.poll_interval, Duration::from_millis(2500));
        assert_eq!(cfg.queue.user, "jdoe");
        assert_eq!(cfg.queue.batch.memory, "8GB");
        assert_eq!(cfg.queue.batch.partition, "main");
        assert_eq!(cfg.execution.mode, core_config::ExecutionMode::Cluster);
        assert_eq!(cfg.execution.decoys_per_origin, 10);
        assert_eq!(cfg.execution.seed, Some(42));
        assert_eq!(app.engine.program.as_deref(), Some("design-engine"));
    }

    #[test]
    fn cli_overrides_set_values_which_override_file() {
        let (dir, geometry) = setup();
        let cfg_path = dir.path().join("passo.toml");
        fs::write(
            &cfg_path,
            "[protocol]\nmax-steps = 100\nmax-translation = 0.3\n\n[execution]\nmax-parallel = 2\n",
        )
        .unwrap();

        let mut args = base_args(&geometry);
        args.config = Some(cfg_path);
        args.max_steps = Some(7);
        args.set_values = vec![
            "protocol.max-steps=50".to_string(),
            "protocol.max-translation=0.1".to_string(),
        ];
        let overrides = ExecutionOverrides {
            max_parallel: Some(8),
            mode: Some(ModeArg::Local),
            ..Default::default()
        };

        let cfg = build_config(&args, &overrides).unwrap().core_config;

        assert_eq!(cfg.protocol.max_steps, 7);
        assert_eq!(cfg.protocol.max_translation, 0.1);
        assert_eq!(cfg.execution.max_parallel, 8);
    }

    #[test]
    fn missing_target_chain_is_a_config_error() {
        let (_dir, geometry) = setup();
        let mut args = base_args(&geometry);
        args.target_chain = None;

        let result = build_config(&args, &ExecutionOverrides::default());
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("target-chain")));
    }

    #[test]
    fn missing_geometry_file_is_rejected() {
        let args = base_args(Path::new("/no/such/geometry.toml"));
        let result = build_config(&args, &ExecutionOverrides::default());
        assert!(matches!(result, Err(CliError::Io(_))));
    }

    #[test]
    fn invalid_values_surface_as_config_errors() {
        let (_dir, geometry) = setup();
        let mut args = base_args(&geometry);
        args.set_values = vec!["grid.spacing=0".to_string()];
        assert!(matches!(
            build_config(&args, &ExecutionOverrides::default()),
            Err(CliError::Config(_))
        ));

        args.set_values = vec!["queue.poll-interval-secs=-1".to_string()];
        assert!(matches!(
            build_config(&args, &ExecutionOverrides::default()),
            Err(CliError::Config(msg)) if msg.contains("poll-interval")
        ));
    }

    #[test]
    fn set_values_reject_malformed_and_unknown_keys() {
        let config = FileConfig::default();
        assert!(apply_set_values(config.clone(), &["no-equals-sign".to_string()]).is_err());
        assert!(apply_set_values(config.clone(), &["protocol.bogus=1".to_string()]).is_err());
        assert!(
            apply_set_values(config.clone(), &["protocol.max-steps=-3".to_string()]).is_err()
        );
        assert!(apply_set_values(config, &["execution.mode=remote".to_string()]).is_err());
    }

    #[test]
    fn set_values_reach_nested_sections() {
        let config = apply_set_values(
            FileConfig::default(),
            &[
                "queue.batch.partition=gpu".to_string(),
                "queue.batch.requeue=false".to_string(),
                "pre-filter.max-clashes=3".to_string(),
                "execution.mode=cluster".to_string(),
            ],
        )
        .unwrap();

        let batch = config.queue.unwrap().batch.unwrap();
        assert_eq!(batch.partition.as_deref(), Some("gpu"));
        assert_eq!(batch.requeue, Some(false));
        assert_eq!(config.pre_filter.unwrap().max_clashes, Some(3));
        assert_eq!(
            config.execution.unwrap().mode,
            Some(FileExecutionMode::Cluster)
        );
    }

    #[test]
    fn wait_flag_enables_draining() {
        let (_dir, geometry) = setup();
        let overrides = ExecutionOverrides {
            wait: true,
            ..Default::default()
        };
        let cfg = build_config(&base_args(&geometry), &overrides)
            .unwrap()
            .core_config;
        assert!(cfg.queue.wait_for_completion);
    }

    #[test]
    fn snapshot_reproduces_the_resolved_configuration() {
        let (dir, geometry) = setup();
        let mut args = base_args(&geometry);
        args.output_dir = Some(dir.path().join("out"));
        args.seed = Some(3);
        args.set_values = vec![
            "queue.user=jdoe".to_string(),
            "grid.max-radius=1.0".to_string(),
            "engine.program=design-engine".to_string(),
        ];
        let first = build_config(&args, &ExecutionOverrides::default()).unwrap();
        let snapshot = first.write_snapshot().unwrap();

        let reloaded = build_config(
            &SearchArgs {
                geometry: geometry.clone(),
                config: Some(snapshot),
                ..Default::default()
            },
            &ExecutionOverrides::default(),
        )
        .unwrap();

        assert_eq!(reloaded.core_config, first.core_config);
        assert_eq!(reloaded.engine, first.engine);
    }
}
