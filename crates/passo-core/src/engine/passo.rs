use super::collaborators::{DesignEngine, DesignOutcome, DesignRequest};
use super::config::ProtocolConfig;
use super::error::EngineError;
use super::filter::{FilterVerdict, PreFilter};
use super::utils::sampling::sample_perturbation;
use crate::core::io::reporters::ReporterSet;
use crate::core::models::decoy::{Decoy, DecoyStatus};
use crate::core::models::ids::DecoyId;
use crate::core::models::pose::Pose;
use crate::core::models::step::{Perturbation, StepRecord};
use rand::Rng;
use tracing::{debug, trace, warn};

/// States of a single PASSO trajectory.
///
/// `Init → Perturb → Filter → (Design → Decide | Skip) → Perturb | Terminal`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Init,
    Perturb,
    Filter,
    Design,
    Skip,
    Decide,
    Terminal,
}

struct PendingStep {
    step: usize,
    perturbation: Perturbation,
    candidate: Pose,
    outcome: Option<DesignOutcome>,
}

/// Drives one decoy through `max_steps` perturb/filter/design/decide rounds.
///
/// Acceptance is strictly greedy: a designed candidate replaces the current structure only
/// when its energy is strictly lower than the best energy so far. Every executed step,
/// filtered or designed, is written to the reporters before the next one starts.
pub struct PassoStepMachine<'a, R: Rng> {
    id: DecoyId,
    protocol: &'a ProtocolConfig,
    filter: &'a PreFilter,
    engine: &'a dyn DesignEngine,
    rng: R,
    state: StepState,
    start: Option<Pose>,
    decoy: Option<Decoy>,
    pending: Option<PendingStep>,
}

impl<'a, R: Rng> PassoStepMachine<'a, R> {
    pub fn new(
        id: DecoyId,
        start: Pose,
        protocol: &'a ProtocolConfig,
        filter: &'a PreFilter,
        engine: &'a dyn DesignEngine,
        rng: R,
    ) -> Self {
        Self {
            id,
            protocol,
            filter,
            engine,
            rng,
            state: StepState::Init,
            start: Some(start),
            decoy: None,
            pending: None,
        }
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    /// The trajectory, available once the starting pose has been scored.
    pub fn decoy(&self) -> Option<&Decoy> {
        self.decoy.as_ref()
    }

    pub fn into_decoy(self) -> Option<Decoy> {
        self.decoy
    }

    /// Runs until the terminal state, returning the finished trajectory.
    ///
    /// A design-engine failure ends the decoy: it is marked `Failed`, reporters are flushed
    /// so the partial history survives, and the error is returned without a retry.
    pub fn run(&mut self, reporters: &mut ReporterSet) -> Result<&Decoy, EngineError> {
        while self.state != StepState::Terminal {
            if let Err(e) = self.advance(reporters) {
                self.fail(reporters);
                return Err(e);
            }
        }
        reporters.flush()?;
        self.decoy
            .as_ref()
            .ok_or_else(|| EngineError::Internal("terminal state without a decoy".to_string()))
    }

    /// Performs one state transition and returns the new state.
    pub fn advance(&mut self, reporters: &mut ReporterSet) -> Result<StepState, EngineError> {
        self.state = match self.state {
            StepState::Init => self.initialize()?,
            StepState::Perturb => self.perturb()?,
            StepState::Filter => self.apply_filter()?,
            StepState::Design => self.design()?,
            StepState::Skip => self.skip(reporters)?,
            StepState::Decide => self.decide(reporters)?,
            StepState::Terminal => StepState::Terminal,
        };
        Ok(self.state)
    }

    fn initialize(&mut self) -> Result<StepState, EngineError> {
        let start = self
            .start
            .take()
            .ok_or_else(|| EngineError::Internal("decoy initialized twice".to_string()))?;
        let energy = self.engine.score(&start)?;
        debug!(decoy = %self.id, energy, "Scored starting pose.");

        let mut decoy = Decoy::new(self.id, start, energy);
        decoy.status = DecoyStatus::Running;
        self.decoy = Some(decoy);
        Ok(self.next_or_terminal())
    }

    fn perturb(&mut self) -> Result<StepState, EngineError> {
        let perturbation = sample_perturbation(
            &mut self.rng,
            self.protocol.max_translation,
            self.protocol.max_rotation_degrees,
        );
        let decoy = self.current_decoy()?;
        let candidate = decoy.current().perturbed(&perturbation);
        self.pending = Some(PendingStep {
            step: decoy.step() + 1,
            perturbation,
            candidate,
            outcome: None,
        });
        Ok(StepState::Filter)
    }

    fn apply_filter(&mut self) -> Result<StepState, EngineError> {
        let pending = self.pending_step()?;
        match self.filter.evaluate(&pending.candidate) {
            FilterVerdict::Pass => Ok(StepState::Design),
            FilterVerdict::Fail(reason) => {
                trace!(decoy = %self.id, step = pending.step, %reason, "Candidate rejected by pre-filter.");
                Ok(StepState::Skip)
            }
        }
    }

    fn design(&mut self) -> Result<StepState, EngineError> {
        let pending = self.pending_step()?;
        let request = DesignRequest {
            pose: &pending.candidate,
            target_chain: self.protocol.target_chain,
            cutoff: self.protocol.design_cutoff,
            cycles: self.protocol.design_cycles,
            label: format!("{}_step{}", self.id, pending.step),
        };
        let outcome = self.engine.design(&request)?;
        if let Some(pending) = self.pending.as_mut() {
            pending.outcome = Some(outcome);
        }
        Ok(StepState::Decide)
    }

    fn skip(&mut self, reporters: &mut ReporterSet) -> Result<StepState, EngineError> {
        let pending = self.take_pending()?;
        let energy_before = self.current_decoy()?.best_energy();
        let record = StepRecord::filtered_out(pending.step, pending.perturbation, energy_before);
        self.commit(record, None, reporters)
    }

    fn decide(&mut self, reporters: &mut ReporterSet) -> Result<StepState, EngineError> {
        let pending = self.take_pending()?;
        let outcome = pending.outcome.ok_or_else(|| {
            EngineError::Internal("decision reached without a design outcome".to_string())
        })?;
        let energy_before = self.current_decoy()?.best_energy();
        let record = StepRecord::designed(
            pending.step,
            pending.perturbation,
            energy_before,
            outcome.total_energy,
        );
        if record.accepted {
            debug!(
                decoy = %self.id,
                step = record.step,
                energy = outcome.total_energy,
                "Accepted improved structure."
            );
        }
        let candidate = pending.candidate.with_structure(outcome.structure);
        self.commit(record, Some(candidate), reporters)
    }

    fn commit(
        &mut self,
        record: StepRecord,
        candidate: Option<Pose>,
        reporters: &mut ReporterSet,
    ) -> Result<StepState, EngineError> {
        reporters.record(&record)?;
        self.current_decoy_mut()?.apply(record, candidate);
        Ok(self.next_or_terminal())
    }

    fn next_or_terminal(&mut self) -> StepState {
        let max_steps = self.protocol.max_steps;
        match self.decoy.as_mut() {
            Some(decoy) if decoy.step() < max_steps => StepState::Perturb,
            Some(decoy) => {
                decoy.status = DecoyStatus::Finished;
                StepState::Terminal
            }
            None => StepState::Terminal,
        }
    }

    fn fail(&mut self, reporters: &mut ReporterSet) {
        self.state = StepState::Terminal;
        self.pending = None;
        if let Some(decoy) = self.decoy.as_mut() {
            decoy.status = DecoyStatus::Failed;
        }
        if let Err(e) = reporters.flush() {
            warn!(decoy = %self.id, error = %e, "Failed to flush reporters of a failed decoy.");
        }
    }

    fn current_decoy(&self) -> Result<&Decoy, EngineError> {
        self.decoy
            .as_ref()
            .ok_or_else(|| EngineError::Internal("decoy used before initialization".to_string()))
    }

    fn current_decoy_mut(&mut self) -> Result<&mut Decoy, EngineError> {
        self.decoy
            .as_mut()
            .ok_or_else(|| EngineError::Internal("decoy used before initialization".to_string()))
    }

    fn pending_step(&self) -> Result<&PendingStep, EngineError> {
        self.pending
            .as_ref()
            .ok_or_else(|| EngineError::Internal("no step in flight".to_string()))
    }

    fn take_pending(&mut self) -> Result<PendingStep, EngineError> {
        self.pending
            .take()
            .ok_or_else(|| EngineError::Internal("no step in flight".to_string()))
    }
}
