use crate::core::io::reporters::{DecoyPaths, ReporterSet};
use crate::core::io::state::DecoyState;
use crate::core::models::decoy::DecoyStatus;
use crate::core::models::ids::DecoyId;
use crate::core::models::pose::{Pose, StructureHandle};
use crate::engine::collaborators::DesignEngine;
use crate::engine::config::ProtocolConfig;
use crate::engine::error::EngineError;
use crate::engine::filter::PreFilter;
use crate::engine::passo::PassoStepMachine;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, instrument, warn};

/// One decoy to run: where it starts and where it writes.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub decoy: DecoyId,
    pub start: Pose,
    pub paths: DecoyPaths,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecoyOutcome {
    Finished {
        best_energy: f64,
        structure: StructureHandle,
    },
    Failed {
        message: String,
    },
    /// The durable state was already terminal; nothing was run.
    Skipped(DecoyState),
}

/// Random stream of one decoy. With a base seed every decoy gets its own reproducible
/// ChaCha stream; without one the generator is seeded from OS entropy.
pub fn decoy_rng(seed: Option<u64>, decoy: DecoyId) -> ChaCha8Rng {
    match seed {
        Some(seed) => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(((decoy.origin.0 as u64) << 32) | decoy.index as u64);
            rng
        }
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Runs one decoy end to end and keeps its durable state file current.
///
/// The state file is written as `Running` before the first step and replaced with the
/// terminal state afterwards. A decoy whose state is already terminal is skipped, which
/// makes re-running a partially completed search safe. Non-terminal leftovers from an
/// interrupted attempt are restarted from the grid origin.
pub struct DecoyRunner<'a> {
    protocol: &'a ProtocolConfig,
    filter: &'a PreFilter,
    engine: &'a dyn DesignEngine,
    seed: Option<u64>,
}

impl<'a> DecoyRunner<'a> {
    pub fn new(
        protocol: &'a ProtocolConfig,
        filter: &'a PreFilter,
        engine: &'a dyn DesignEngine,
        seed: Option<u64>,
    ) -> Self {
        Self {
            protocol,
            filter,
            engine,
            seed,
        }
    }

    #[instrument(skip_all, name = "decoy", fields(decoy = %work.decoy))]
    pub fn run(&self, work: &WorkItem) -> Result<DecoyOutcome, EngineError> {
        let paths = &work.paths;
        let max_steps = self.protocol.max_steps;

        if let Some(state) = DecoyState::read_if_exists(&paths.state)? {
            if state.status.is_terminal() {
                info!(status = ?state.status, "Decoy already terminal; skipping.");
                return Ok(DecoyOutcome::Skipped(state));
            }
        }

        DecoyState::running(max_steps).write(&paths.state)?;
        let mut reporters = match ReporterSet::create(paths, max_steps) {
            Ok(reporters) => reporters,
            Err(e) => {
                let err = EngineError::from(e);
                self.record_failure(work, 0, &err);
                return Err(err);
            }
        };

        let mut machine = PassoStepMachine::new(
            work.decoy,
            work.start.clone(),
            self.protocol,
            self.filter,
            self.engine,
            decoy_rng(self.seed, work.decoy),
        );
        let result = machine
            .run(&mut reporters)
            .map(|decoy| (decoy.best_energy(), decoy.current().structure.clone()));

        match result {
            Ok((best_energy, structure)) => {
                let state = DecoyState {
                    status: DecoyStatus::Finished,
                    steps_completed: max_steps,
                    max_steps,
                    best_energy: Some(best_energy),
                    structure: Some(structure.to_string()),
                    message: None,
                };
                state.write(&paths.state)?;
                info!(best_energy, "Decoy finished.");
                Ok(DecoyOutcome::Finished {
                    best_energy,
                    structure,
                })
            }
            Err(err) => {
                let steps = machine.decoy().map_or(0, |d| d.step());
                self.record_failure(work, steps, &err);
                match err {
                    EngineError::Design { .. } => Ok(DecoyOutcome::Failed {
                        message: err.to_string(),
                    }),
                    other => Err(other),
                }
            }
        }
    }

    fn record_failure(&self, work: &WorkItem, steps: usize, err: &EngineError) {
        warn!(decoy = %work.decoy, steps, error = %err, "Decoy failed.");
        let state = DecoyState::failed(steps, self.protocol.max_steps, err.to_string());
        if let Err(e) = state.write(&work.paths.state) {
            warn!(decoy = %work.decoy, error = %e, "Could not record decoy failure.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::reporters::{RunLog, StatusLine};
    use crate::core::models::ids::GridOriginId;
    use crate::engine::fakes::{FakeEngine, permissive_filter, protocol};
    use nalgebra::Point3;
    use rand::Rng;
    use tempfile::tempdir;

    fn work(root: &std::path::Path, origin: usize, index: usize) -> WorkItem {
        let decoy = DecoyId::new(GridOriginId(origin), index);
        WorkItem {
            decoy,
            start: Pose::new(Point3::new(15.0, 0.0, 0.0), StructureHandle::new("input")),
            paths: DecoyPaths::new(root, decoy),
        }
    }

    #[test]
    fn finished_decoy_writes_terminal_state() {
        let dir = tempdir().unwrap();
        let item = work(dir.path(), 0, 0);
        let protocol = protocol(12);
        let filter = permissive_filter();
        let engine = FakeEngine::new(1);
        let runner = DecoyRunner::new(&protocol, &filter, &engine, Some(9));

        let outcome = runner.run(&item).unwrap();

        let state = DecoyState::read(&item.paths.state).unwrap();
        assert_eq!(state.status, DecoyStatus::Finished);
        assert_eq!(state.steps_completed, 12);
        match outcome {
            DecoyOutcome::Finished { best_energy, .. } => {
                assert_eq!(state.best_energy, Some(best_energy));
                assert!(best_energy <= engine.start_energy);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(StatusLine::read(&item.paths.status).unwrap(), (12, 12));
    }

    #[test]
    fn design_failure_is_recorded_not_propagated() {
        let dir = tempdir().unwrap();
        let item = work(dir.path(), 1, 3);
        let protocol = protocol(8);
        let filter = permissive_filter();
        let engine = FakeEngine::new(2).failing_when(|label| label == "1_3_step5");
        let runner = DecoyRunner::new(&protocol, &filter, &engine, Some(9));

        let outcome = runner.run(&item).unwrap();

        assert!(matches!(outcome, DecoyOutcome::Failed { .. }));
        let state = DecoyState::read(&item.paths.state).unwrap();
        assert_eq!(state.status, DecoyStatus::Failed);
        assert_eq!(state.steps_completed, 4);
        assert!(state.message.unwrap().contains("scripted failure"));
        assert_eq!(RunLog::read(&item.paths.run_log).unwrap().len(), 4);
    }

    #[test]
    fn terminal_decoy_is_skipped_on_rerun() {
        let dir = tempdir().unwrap();
        let item = work(dir.path(), 0, 1);
        let protocol = protocol(3);
        let filter = permissive_filter();

        let first = FakeEngine::new(3);
        DecoyRunner::new(&protocol, &filter, &first, Some(1))
            .run(&item)
            .unwrap();

        let second = FakeEngine::new(3);
        let outcome = DecoyRunner::new(&protocol, &filter, &second, Some(1))
            .run(&item)
            .unwrap();

        assert!(matches!(outcome, DecoyOutcome::Skipped(_)));
        assert_eq!(second.design_calls(), 0);
    }

    #[test]
    fn interrupted_decoy_restarts_from_scratch() {
        let dir = tempdir().unwrap();
        let item = work(dir.path(), 0, 2);
        let protocol = protocol(5);
        let filter = permissive_filter();
        DecoyState::running(5).write(&item.paths.state).unwrap();

        let engine = FakeEngine::new(4);
        let outcome = DecoyRunner::new(&protocol, &filter, &engine, Some(1))
            .run(&item)
            .unwrap();

        assert!(matches!(outcome, DecoyOutcome::Finished { .. }));
        assert_eq!(engine.design_calls(), 5);
        assert_eq!(RunLog::read(&item.paths.run_log).unwrap().len(), 5);
    }

    #[test]
    fn decoy_streams_are_reproducible_and_distinct() {
        let a = DecoyId::new(GridOriginId(0), 0);
        let b = DecoyId::new(GridOriginId(0), 1);
        let draw = |id| decoy_rng(Some(5), id).r#gen::<u64>();
        assert_eq!(draw(a), draw(a));
        assert_ne!(draw(a), draw(b));
    }
}
