use super::SearchContext;
use crate::cli::DecoyArgs;
use crate::config::builder::ExecutionOverrides;
use crate::error::{CliError, Result};
use passo::core::models::ids::{DecoyId, GridOriginId};
use passo::workflows::decoy::{DecoyOutcome, DecoyRunner};
use tracing::info;

pub async fn run(args: DecoyArgs) -> Result<()> {
    let ctx = SearchContext::load(&args.search, &ExecutionOverrides::default())?;
    let cfg = &ctx.app.core_config;
    let decoy = DecoyId::new(GridOriginId(args.origin), args.index);

    let driver = ctx.driver();
    let plan = driver.plan()?;
    let item = plan.item(decoy).ok_or_else(|| {
        CliError::Argument(format!(
            "decoy {} is outside the search ({} grid origins x {} decoys)",
            decoy,
            plan.grid.origins.len(),
            cfg.execution.decoys_per_origin
        ))
    })?;
    let filter = driver.pre_filter()?;
    let engine = ctx.design_engine()?;

    info!(%decoy, steps = cfg.protocol.max_steps, "Running decoy.");
    let runner = DecoyRunner::new(&cfg.protocol, &filter, &engine, cfg.execution.seed);
    let outcome = tokio::task::block_in_place(|| runner.run(item))?;

    match outcome {
        DecoyOutcome::Finished {
            best_energy,
            structure,
        } => {
            println!(
                "Decoy {} finished. Best energy {:.4}, structure: {}",
                decoy, best_energy, structure
            );
            Ok(())
        }
        DecoyOutcome::Skipped(state) => {
            println!(
                "Decoy {} already {:?}; nothing to do.",
                decoy, state.status
            );
            Ok(())
        }
        DecoyOutcome::Failed { message } => Err(CliError::DecoyFailed {
            decoy: decoy.to_string(),
            message,
        }),
    }
}
