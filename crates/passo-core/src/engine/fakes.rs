//! In-memory collaborators shared by the engine and workflow tests.

use super::collaborators::{
    DesignEngine, DesignEngineError, DesignOutcome, DesignRequest, JobQueue, QueueError,
    QueueSlotState, StaticGeometry,
};
use super::config::{DEFAULT_DESIGN_CUTOFF, DEFAULT_DESIGN_CYCLES, ProtocolConfig};
use super::filter::{FilterContext, PreFilter, PreFilterConfig};
use crate::core::io::job_script::JobDescription;
use crate::core::models::ids::JobId;
use crate::core::models::pose::{BlockId, Pose, StructureHandle};
use nalgebra::Point3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

pub(crate) fn protocol(max_steps: usize) -> ProtocolConfig {
    ProtocolConfig {
        max_steps,
        max_translation: 0.5,
        max_rotation_degrees: 3.0,
        design_cutoff: DEFAULT_DESIGN_CUTOFF,
        design_cycles: DEFAULT_DESIGN_CYCLES,
        target_chain: 'C',
    }
}

/// A = (0,0,0), B = (10,0,0), two-atom movable block centered on (10,5,0).
pub(crate) fn docking_geometry() -> StaticGeometry {
    StaticGeometry::new()
        .with_block(BlockId::FixedA, vec![Point3::new(0.0, 0.0, 0.0)])
        .with_block(BlockId::FixedB, vec![Point3::new(10.0, 0.0, 0.0)])
        .with_block(
            BlockId::Movable,
            vec![Point3::new(10.0, 4.0, 0.0), Point3::new(10.0, 6.0, 0.0)],
        )
}

pub(crate) fn permissive_filter() -> PreFilter {
    let config = PreFilterConfig {
        max_clashes: None,
        min_contacts: None,
        ..PreFilterConfig::default()
    };
    filter_with(config)
}

pub(crate) fn rejecting_filter() -> PreFilter {
    let config = PreFilterConfig {
        min_distance: Some(1.0e6),
        ..PreFilterConfig::default()
    };
    filter_with(config)
}

fn filter_with(config: PreFilterConfig) -> PreFilter {
    let context = FilterContext::from_geometry(&docking_geometry())
        .expect("test geometry is complete");
    PreFilter::new(config, context)
}

type FailurePredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Design engine returning scripted energies, then seeded random ones.
pub(crate) struct FakeEngine {
    pub start_energy: f64,
    script: Mutex<VecDeque<f64>>,
    rng: Mutex<ChaCha8Rng>,
    fail_when: Option<FailurePredicate>,
    design_calls: AtomicUsize,
}

impl FakeEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            start_energy: -10.0,
            script: Mutex::new(VecDeque::new()),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            fail_when: None,
            design_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_script(self, energies: impl IntoIterator<Item = f64>) -> Self {
        *self.script.lock().unwrap() = energies.into_iter().collect();
        self
    }

    /// Fails every design request whose label matches.
    pub fn failing_when(mut self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    pub fn design_calls(&self) -> usize {
        self.design_calls.load(Ordering::SeqCst)
    }
}

impl DesignEngine for FakeEngine {
    fn score(&self, _pose: &Pose) -> Result<f64, DesignEngineError> {
        Ok(self.start_energy)
    }

    fn design(&self, request: &DesignRequest<'_>) -> Result<DesignOutcome, DesignEngineError> {
        self.design_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_when.as_ref().is_some_and(|f| f(request.label.as_str())) {
            return Err(DesignEngineError::Simulation(format!(
                "scripted failure for {}",
                request.label
            )));
        }
        let scripted = self.script.lock().unwrap().pop_front();
        let total_energy = scripted.unwrap_or_else(|| {
            self.start_energy + self.rng.lock().unwrap().gen_range(-5.0..1.0)
        });
        Ok(DesignOutcome {
            structure: StructureHandle::new(request.label.clone()),
            total_energy,
        })
    }
}

#[derive(Default)]
struct SimState {
    live: HashMap<String, usize>,
    finished: HashSet<String>,
    next_id: usize,
    peak_live: usize,
    occupancy_script: VecDeque<usize>,
    lag: usize,
    history: VecDeque<usize>,
    submit_failures: HashMap<String, usize>,
    submit_attempts: HashMap<String, usize>,
    stalled_calls: usize,
    unavailable_calls: usize,
    release_calls: usize,
    state_queries: usize,
}

impl SimState {
    fn slot_state(&self, id: &JobId) -> QueueSlotState {
        if self.finished.contains(&id.0) {
            QueueSlotState::Done
        } else if self.live.contains_key(&id.0) {
            QueueSlotState::Running
        } else {
            QueueSlotState::Unknown
        }
    }
}

/// Cluster queue whose clock advances once per occupancy query.
///
/// Jobs run for a fixed number of ticks. Occupancy can be scripted or reported with a lag
/// of several queries, imitating a scheduler that has not yet registered new submissions.
pub(crate) struct SimulatedQueue {
    job_duration: usize,
    stall_for: Duration,
    state: Mutex<SimState>,
}

impl SimulatedQueue {
    pub fn new(job_duration: usize) -> Self {
        Self {
            job_duration,
            stall_for: Duration::ZERO,
            state: Mutex::new(SimState::default()),
        }
    }

    pub fn with_occupancy_script(self, values: impl IntoIterator<Item = usize>) -> Self {
        self.state.lock().unwrap().occupancy_script = values.into_iter().collect();
        self
    }

    pub fn with_lag(self, queries: usize) -> Self {
        self.state.lock().unwrap().lag = queries;
        self
    }

    pub fn failing_submits(self, job_name: &str, times: usize) -> Self {
        self.state
            .lock()
            .unwrap()
            .submit_failures
            .insert(job_name.to_string(), times);
        self
    }

    pub fn stalling_occupancy(mut self, calls: usize, stall_for: Duration) -> Self {
        self.stall_for = stall_for;
        self.state.lock().unwrap().stalled_calls = calls;
        self
    }

    pub fn unavailable_occupancy(self, calls: usize) -> Self {
        self.state.lock().unwrap().unavailable_calls = calls;
        self
    }

    /// A job left behind by an earlier run, live for `ticks` more occupancy queries.
    pub fn with_live_job(self, id: &str, ticks: usize) -> Self {
        self.state.lock().unwrap().live.insert(id.to_string(), ticks);
        self
    }

    pub fn with_finished_job(self, id: &str) -> Self {
        self.state.lock().unwrap().finished.insert(id.to_string());
        self
    }

    pub fn peak_live(&self) -> usize {
        self.state.lock().unwrap().peak_live
    }

    pub fn submit_attempts(&self, job_name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .submit_attempts
            .get(job_name)
            .copied()
            .unwrap_or(0)
    }

    pub fn release_calls(&self) -> usize {
        self.state.lock().unwrap().release_calls
    }

    /// Number of `job_state`/`job_states` calls answered so far.
    pub fn state_queries(&self) -> usize {
        self.state.lock().unwrap().state_queries
    }
}

impl JobQueue for SimulatedQueue {
    fn submit(&self, job: &JobDescription) -> Result<JobId, QueueError> {
        let mut state = self.state.lock().unwrap();
        *state.submit_attempts.entry(job.name.clone()).or_default() += 1;
        if let Some(remaining) = state.submit_failures.get_mut(&job.name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(QueueError::Unavailable("sbatch: socket timed out".to_string()));
            }
        }
        let id = format!("{}", 1000 + state.next_id);
        state.next_id += 1;
        state.live.insert(id.clone(), self.job_duration);
        state.peak_live = state.peak_live.max(state.live.len());
        Ok(JobId(id))
    }

    fn query_occupancy(&self, _user: &str) -> Result<usize, QueueError> {
        let stall = {
            let mut state = self.state.lock().unwrap();
            if state.stalled_calls > 0 {
                state.stalled_calls -= 1;
                true
            } else {
                false
            }
        };
        if stall {
            thread::sleep(self.stall_for);
        }

        let mut state = self.state.lock().unwrap();
        if state.unavailable_calls > 0 {
            state.unavailable_calls -= 1;
            return Err(QueueError::Unavailable("squeue: connection refused".to_string()));
        }

        for remaining in state.live.values_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        let done: Vec<String> = state
            .live
            .iter()
            .filter(|(_, remaining)| **remaining == 0)
            .map(|(id, _)| id.clone())
            .collect();
        for id in done {
            state.live.remove(&id);
            state.finished.insert(id);
        }

        let actual = state.live.len();
        if let Some(scripted) = state.occupancy_script.pop_front() {
            return Ok(scripted);
        }
        state.history.push_back(actual);
        if state.history.len() > state.lag {
            Ok(state.history.pop_front().unwrap_or(0))
        } else {
            Ok(0)
        }
    }

    fn job_state(&self, id: &JobId) -> Result<QueueSlotState, QueueError> {
        let mut state = self.state.lock().unwrap();
        state.state_queries += 1;
        Ok(state.slot_state(id))
    }

    fn job_states(&self, _user: &str, ids: &[JobId]) -> Result<Vec<QueueSlotState>, QueueError> {
        let mut state = self.state.lock().unwrap();
        state.state_queries += 1;
        Ok(ids.iter().map(|id| state.slot_state(id)).collect())
    }

    fn release_held(&self, _user: &str) -> Result<usize, QueueError> {
        self.state.lock().unwrap().release_calls += 1;
        Ok(0)
    }
}
