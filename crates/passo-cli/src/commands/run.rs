use super::SearchContext;
use super::status::print_summary;
use crate::cli::RunArgs;
use crate::config::builder::ExecutionOverrides;
use crate::error::Result;
use crate::external::slurm::SlurmQueue;
use crate::utils::progress::CliProgressHandler;
use passo::core::models::ids::DecoyId;
use passo::engine::config::ExecutionMode;
use passo::engine::progress::ProgressReporter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Command line a batch job uses to run one decoy.
pub fn decoy_command(
    program: &str,
    geometry: &Path,
    snapshot: &Path,
    decoy: DecoyId,
) -> Vec<String> {
    vec![
        program.to_string(),
        "-v".to_string(),
        "decoy".to_string(),
        "--geometry".to_string(),
        geometry.display().to_string(),
        "--config".to_string(),
        snapshot.display().to_string(),
        "--origin".to_string(),
        decoy.origin.0.to_string(),
        "--index".to_string(),
        decoy.index.to_string(),
    ]
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

pub async fn run(args: RunArgs) -> Result<()> {
    let overrides = ExecutionOverrides::from(&args);
    let ctx = SearchContext::load(&args.search, &overrides)?;
    let cfg = &ctx.app.core_config;

    let snapshot = ctx.app.write_snapshot()?;
    info!("Resolved configuration written to {:?}", &snapshot);

    let driver = ctx.driver();
    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let summary = match cfg.execution.mode {
        ExecutionMode::Local => {
            let engine = ctx.design_engine()?;
            println!(
                "Starting PASSO search with {} parallel decoy(s)...",
                cfg.execution.max_parallel
            );
            tokio::task::block_in_place(|| driver.run_local(&engine, &reporter))?
        }
        ExecutionMode::Cluster => {
            let program = std::env::current_exe()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "passo".to_string());
            let geometry = absolute(&ctx.app.geometry_path);
            let snapshot = absolute(&snapshot);
            let queue = Arc::new(SlurmQueue::new(cfg.queue.call_timeout));

            println!(
                "Submitting decoys to SLURM (at most {} queued at once)...",
                cfg.queue.admission_cap
            );
            let (report, summary) = tokio::task::block_in_place(|| {
                driver.run_cluster(
                    queue,
                    |decoy| decoy_command(&program, &geometry, &snapshot, decoy),
                    &reporter,
                )
            })?;

            println!(
                "Submitted {} job(s) in {} cycle(s); peak outstanding {}.",
                report.submitted.len(),
                report.cycles,
                report.peak_outstanding
            );
            if !report.failed.is_empty() {
                warn!(failed = report.failed.len(), "Some decoys could not be submitted.");
                println!("{} decoy(s) could not be submitted.", report.failed.len());
            }
            summary
        }
    };

    print_summary(&summary, false);
    Ok(())
}
