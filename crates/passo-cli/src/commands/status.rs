use super::SearchContext;
use crate::cli::StatusArgs;
use crate::config::builder::ExecutionOverrides;
use crate::error::Result;
use passo::core::models::grid::GridOriginStatus;
use passo::workflows::multi_dock::DockSummary;
use std::fmt::Write as _;

fn status_label(status: GridOriginStatus) -> &'static str {
    match status {
        GridOriginStatus::Pending => "pending",
        GridOriginStatus::Running => "running",
        GridOriginStatus::Completed => "completed",
    }
}

pub fn render_summary(summary: &DockSummary, show_active: bool) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "{:>6}  {:<10} {:>9} {:>7} {:>12}",
        "origin", "status", "finished", "failed", "best energy"
    );
    for origin in &summary.origins {
        let best = origin
            .best_energy()
            .map_or_else(|| "-".to_string(), |e| format!("{:.4}", e));
        let _ = writeln!(
            out,
            "{:>6}  {:<10} {:>4}/{:<4} {:>7} {:>12}",
            origin.id().0,
            status_label(origin.status),
            origin.decoys_completed(),
            origin.decoys_total(),
            origin.decoys_failed(),
            best
        );
    }
    let _ = writeln!(
        out,
        "\n{} decoys: {} finished, {} failed, {} active, {} not started.",
        summary.total(),
        summary.finished,
        summary.failed,
        summary.active.len(),
        summary.not_started
    );
    if let Some(best) = &summary.best {
        let _ = write!(out, "Best decoy {} with energy {:.4}", best.decoy, best.energy);
        match &best.structure {
            Some(structure) => {
                let _ = writeln!(out, " ({})", structure);
            }
            None => {
                let _ = writeln!(out);
            }
        }
    }
    if show_active && !summary.active.is_empty() {
        let _ = writeln!(out, "\nActive decoys:");
        for progress in &summary.active {
            let step = progress
                .step
                .map_or_else(|| "-".to_string(), |(s, max)| format!("{}/{}", s, max));
            let _ = writeln!(
                out,
                "  {:<10} {:<9} step {}",
                progress.decoy.to_string(),
                format!("{:?}", progress.status).to_lowercase(),
                step
            );
        }
    }
    out
}

pub fn print_summary(summary: &DockSummary, show_active: bool) {
    print!("{}", render_summary(summary, show_active));
    if summary.is_complete() {
        println!("Search complete.");
    }
}

pub async fn run(args: StatusArgs) -> Result<()> {
    let ctx = SearchContext::load(&args.search, &ExecutionOverrides::default())?;
    let summary = tokio::task::block_in_place(|| ctx.driver().summarize())?;
    print_summary(&summary, args.active);
    Ok(())
}
