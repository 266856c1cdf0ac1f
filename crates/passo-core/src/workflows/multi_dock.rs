use super::decoy::{DecoyOutcome, DecoyRunner, WorkItem};
use crate::core::io::job_script::JobDescription;
use crate::core::io::reporters::{DecoyPaths, StatusLine};
use crate::core::io::state::{DecoyState, record_job_id, recorded_job_id};
use crate::core::models::decoy::DecoyStatus;
use crate::core::models::grid::GridOrigin;
use crate::core::models::ids::{DecoyId, JobId};
use crate::core::models::pose::StructureHandle;
use crate::engine::collaborators::{DesignEngine, GeometrySource, JobQueue};
use crate::engine::config::PassoConfig;
use crate::engine::error::EngineError;
use crate::engine::filter::{FilterContext, PreFilter};
use crate::engine::grid::{DockingGrid, DockingGridBuilder};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::queue::{PendingJob, QueueController, QueueReport};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Structure handle decoys start from unless the caller names one.
pub const INPUT_STRUCTURE: &str = "input";

/// The grid and every decoy it expands into.
#[derive(Debug, Clone)]
pub struct DockPlan {
    pub grid: DockingGrid,
    pub items: Vec<WorkItem>,
}

impl DockPlan {
    pub fn item(&self, decoy: DecoyId) -> Option<&WorkItem> {
        self.items.iter().find(|item| item.decoy == decoy)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BestDecoy {
    pub decoy: DecoyId,
    pub energy: f64,
    pub structure: Option<String>,
}

/// Where a non-terminal decoy stands, as far as its durable files tell.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoyProgress {
    pub decoy: DecoyId,
    pub status: DecoyStatus,
    pub step: Option<(usize, usize)>,
}

/// Aggregate view of a search, rebuilt from durable state files.
#[derive(Debug, Clone, PartialEq)]
pub struct DockSummary {
    pub origins: Vec<GridOrigin>,
    pub finished: usize,
    pub failed: usize,
    pub active: Vec<DecoyProgress>,
    pub not_started: usize,
    pub best: Option<BestDecoy>,
}

impl DockSummary {
    pub fn total(&self) -> usize {
        self.finished + self.failed + self.active.len() + self.not_started
    }

    pub fn is_complete(&self) -> bool {
        self.finished + self.failed == self.total()
    }
}

/// Expands the docking grid into decoys and sees them through, locally or on a cluster.
pub struct MultiDockDriver<'a> {
    config: &'a PassoConfig,
    geometry: &'a dyn GeometrySource,
    input: StructureHandle,
}

impl<'a> MultiDockDriver<'a> {
    pub fn new(config: &'a PassoConfig, geometry: &'a dyn GeometrySource) -> Self {
        Self {
            config,
            geometry,
            input: StructureHandle::new(INPUT_STRUCTURE),
        }
    }

    pub fn with_input_structure(mut self, input: StructureHandle) -> Self {
        self.input = input;
        self
    }

    /// Builds the grid and enumerates grid origin × decoy index, in id order.
    pub fn plan(&self) -> Result<DockPlan, EngineError> {
        let builder = DockingGridBuilder::new(
            self.config.grid.clone(),
            self.config.execution.decoys_per_origin,
        );
        let grid = builder.build(self.geometry)?;
        let root = &self.config.execution.output_dir;
        let input = &self.input;

        let items = grid
            .origins
            .iter()
            .flat_map(|origin| {
                (0..origin.decoys_total()).map(move |index| {
                    let decoy = DecoyId::new(origin.id(), index);
                    WorkItem {
                        decoy,
                        start: origin.start_pose(input.clone()),
                        paths: DecoyPaths::new(root, decoy),
                    }
                })
            })
            .collect();

        Ok(DockPlan { grid, items })
    }

    pub fn pre_filter(&self) -> Result<PreFilter, EngineError> {
        let context = FilterContext::from_geometry(self.geometry)?;
        Ok(PreFilter::new(self.config.filter.clone(), context))
    }

    /// Runs every decoy in this process on a pool of `max_parallel` threads.
    ///
    /// A failing decoy is recorded and the rest continue; only planning errors abort.
    #[instrument(skip_all, name = "multi_dock_local")]
    pub fn run_local(
        &self,
        engine: &dyn DesignEngine,
        reporter: &ProgressReporter,
    ) -> Result<DockSummary, EngineError> {
        reporter.report(Progress::PhaseStart { name: "Planning" });
        let plan = self.plan()?;
        let filter = self.pre_filter()?;
        reporter.report(Progress::PhaseFinish);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.execution.max_parallel)
            .build()
            .map_err(|e| EngineError::Internal(format!("cannot build thread pool: {}", e)))?;
        let runner = DecoyRunner::new(
            &self.config.protocol,
            &filter,
            engine,
            self.config.execution.seed,
        );

        info!(
            decoys = plan.items.len(),
            threads = self.config.execution.max_parallel,
            "Running decoys locally."
        );
        reporter.report(Progress::PhaseStart { name: "Decoys" });
        reporter.report(Progress::TaskStart {
            total_steps: plan.items.len() as u64,
        });
        pool.install(|| {
            plan.items.par_iter().for_each(|item| {
                let energy = match runner.run(item) {
                    Ok(DecoyOutcome::Finished { best_energy, .. }) => Some(best_energy),
                    Ok(DecoyOutcome::Skipped(state)) => state.best_energy,
                    Ok(DecoyOutcome::Failed { .. }) => None,
                    Err(e) => {
                        error!(decoy = %item.decoy, error = %e, "Decoy aborted.");
                        None
                    }
                };
                reporter.report(Progress::DecoyFinished {
                    decoy: item.decoy,
                    energy,
                });
                reporter.report(Progress::TaskIncrement);
            });
        });
        reporter.report(Progress::TaskFinish);
        reporter.report(Progress::PhaseFinish);

        self.summarize_plan(&plan)
    }

    /// Renders one batch job per decoy that needs one and submits them through the queue
    /// controller. `command` produces the command line that runs a single decoy.
    ///
    /// Terminal decoys are skipped. So is any decoy whose recorded job the queue still
    /// holds: that job owns the decoy's reporters, and a second submission would truncate
    /// them under it. A recorded job the queue reports as done is resubmitted.
    #[instrument(skip_all, name = "multi_dock_cluster")]
    pub fn run_cluster<F>(
        &self,
        queue: Arc<dyn JobQueue>,
        command: F,
        reporter: &ProgressReporter,
    ) -> Result<(QueueReport, DockSummary), EngineError>
    where
        F: Fn(DecoyId) -> Vec<String>,
    {
        reporter.report(Progress::PhaseStart { name: "Planning" });
        let plan = self.plan()?;
        let max_steps = self.config.protocol.max_steps;
        let mut controller = QueueController::new(queue, self.config.queue.clone());

        let mut fresh = Vec::new();
        let mut recorded = Vec::new();
        for item in &plan.items {
            if let Some(state) = DecoyState::read_if_exists(&item.paths.state)? {
                if state.status.is_terminal() {
                    continue;
                }
                if let Some(job_id) = recorded_job_id(&item.paths.job_id)? {
                    recorded.push((item, job_id));
                    continue;
                }
            }
            fresh.push(item);
        }

        let ids: Vec<JobId> = recorded.iter().map(|(_, id)| id.clone()).collect();
        let states = controller.job_states(&ids)?;
        let mut still_live = 0;
        for ((item, job_id), state) in recorded.into_iter().zip(states) {
            if state.is_outstanding() {
                debug!(decoy = %item.decoy, job = %job_id, ?state, "Decoy still held by its job.");
                still_live += 1;
            } else {
                fresh.push(item);
            }
        }

        let mut jobs = Vec::with_capacity(fresh.len());
        for item in fresh {
            let job = JobDescription::new(
                format!("passo_{}", item.decoy),
                item.paths.job_script.clone(),
                &command(item.decoy),
                &self.config.queue.batch,
                &item.paths.job_stdout,
                &item.paths.job_stderr,
            );
            job.materialize()?;
            DecoyState::queued(max_steps).write(&item.paths.state)?;
            jobs.push(PendingJob {
                decoy: item.decoy,
                job,
            });
        }
        reporter.report(Progress::PhaseFinish);

        info!(
            jobs = jobs.len(),
            still_live,
            skipped = plan.items.len() - jobs.len() - still_live,
            cap = self.config.queue.admission_cap,
            "Submitting decoys to the cluster queue."
        );
        reporter.report(Progress::PhaseStart { name: "Submission" });
        let report = controller.run_recording(jobs, reporter, |slot| {
            let Some(item) = plan.item(slot.decoy) else {
                return;
            };
            if let Err(e) = record_job_id(&item.paths.job_id, &slot.job_id) {
                warn!(decoy = %slot.decoy, job = %slot.job_id, error = %e, "Could not record job id.");
            }
        });
        reporter.report(Progress::PhaseFinish);

        for failure in &report.failed {
            let Some(item) = plan.item(failure.decoy) else {
                continue;
            };
            let message = format!(
                "submission failed after {} attempts: {}",
                failure.attempts, failure.error
            );
            if let Err(e) = DecoyState::failed(0, max_steps, message).write(&item.paths.state) {
                warn!(decoy = %failure.decoy, error = %e, "Could not record submission failure.");
            }
        }

        let summary = self.summarize_plan(&plan)?;
        Ok((report, summary))
    }

    /// Reads every decoy's durable state and aggregates it per grid origin.
    pub fn summarize(&self) -> Result<DockSummary, EngineError> {
        let plan = self.plan()?;
        self.summarize_plan(&plan)
    }

    fn summarize_plan(&self, plan: &DockPlan) -> Result<DockSummary, EngineError> {
        let mut origins = plan.grid.origins.clone();
        for origin in &mut origins {
            origin.reset_counters();
        }

        let mut summary = DockSummary {
            origins: Vec::new(),
            finished: 0,
            failed: 0,
            active: Vec::new(),
            not_started: 0,
            best: None,
        };

        for item in &plan.items {
            let origin = origins
                .get_mut(item.decoy.origin.0)
                .ok_or_else(|| EngineError::Internal(format!("unknown origin for {}", item.decoy)))?;

            match DecoyState::read_if_exists(&item.paths.state)? {
                Some(state) if state.status == DecoyStatus::Finished => {
                    origin.record_finished(state.best_energy);
                    summary.finished += 1;
                    if let Some(energy) = state.best_energy {
                        let better = summary.best.as_ref().is_none_or(|b| energy < b.energy);
                        if better {
                            summary.best = Some(BestDecoy {
                                decoy: item.decoy,
                                energy,
                                structure: state.structure.clone(),
                            });
                        }
                    }
                }
                Some(state) if state.status == DecoyStatus::Failed => {
                    origin.record_failed();
                    summary.failed += 1;
                }
                Some(state) => {
                    origin.mark_running();
                    let step = StatusLine::read(&item.paths.status).ok();
                    summary.active.push(DecoyProgress {
                        decoy: item.decoy,
                        status: state.status,
                        step,
                    });
                }
                None => summary.not_started += 1,
            }
        }

        summary.origins = origins;
        Ok(summary)
    }
}
