use super::collaborators::{JobQueue, QueueError, QueueSlotState};
use super::config::QueueConfig;
use super::progress::{Progress, ProgressReporter};
use crate::core::io::job_script::JobDescription;
use crate::core::models::ids::{DecoyId, JobId};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use tracing::{debug, info, instrument, warn};

/// A decoy waiting to be admitted to the cluster queue.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingJob {
    pub decoy: DecoyId,
    pub job: JobDescription,
}

/// A job the controller has handed to the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSlot {
    pub decoy: DecoyId,
    pub job_id: JobId,
    pub state: QueueSlotState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionFailure {
    pub decoy: DecoyId,
    pub attempts: usize,
    pub error: QueueError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueReport {
    pub submitted: Vec<QueueSlot>,
    pub failed: Vec<SubmissionFailure>,
    pub cycles: usize,
    /// Highest number of own outstanding slots seen after any admission round.
    pub peak_outstanding: usize,
}

struct Waiting {
    job: PendingJob,
    attempts: usize,
    retry_after_cycle: usize,
}

/// Admits jobs to a shared queue without exceeding the admission cap.
///
/// Each poll cycle refreshes the state of its own slots, asks the queue how many jobs the
/// user holds and submits at most `cap − max(occupancy, own outstanding)` jobs. Counting
/// its own outstanding slots keeps the controller under the cap even when the queue's
/// occupancy report lags behind recent submissions.
pub struct QueueController {
    queue: Arc<dyn JobQueue>,
    config: QueueConfig,
    slots: Vec<QueueSlot>,
    cycle: usize,
}

impl QueueController {
    pub fn new(queue: Arc<dyn JobQueue>, config: QueueConfig) -> Self {
        Self {
            queue,
            config,
            slots: Vec::new(),
            cycle: 0,
        }
    }

    pub fn slots(&self) -> &[QueueSlot] {
        &self.slots
    }

    pub fn outstanding(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.state.is_outstanding())
            .count()
    }

    /// Submits every job, pacing admissions by the queue's occupancy.
    ///
    /// Returns once all jobs have been submitted or given up on, and, when configured to
    /// wait for completion, once every slot has reached `Done`.
    pub fn run(&mut self, jobs: Vec<PendingJob>, reporter: &ProgressReporter) -> QueueReport {
        self.run_recording(jobs, reporter, |_| {})
    }

    /// Like [`run`](Self::run), calling `on_submit` with every slot as soon as the queue
    /// has accepted its job.
    #[instrument(skip_all, name = "queue_admission", fields(jobs = jobs.len()))]
    pub fn run_recording<F>(
        &mut self,
        jobs: Vec<PendingJob>,
        reporter: &ProgressReporter,
        mut on_submit: F,
    ) -> QueueReport
    where
        F: FnMut(&QueueSlot),
    {
        let mut report = QueueReport::default();
        let mut waiting: VecDeque<Waiting> = jobs
            .into_iter()
            .map(|job| Waiting {
                job,
                attempts: 0,
                retry_after_cycle: 0,
            })
            .collect();

        reporter.report(Progress::TaskStart {
            total_steps: waiting.len() as u64,
        });

        loop {
            self.cycle += 1;
            report.cycles += 1;

            let mut free = self.free_capacity();
            if free > 0 && !waiting.is_empty() {
                waiting = self.admit(waiting, &mut free, &mut report, reporter, &mut on_submit);
            }
            report.peak_outstanding = report.peak_outstanding.max(self.outstanding());

            let waiting_on_slots = self.config.wait_for_completion && self.outstanding() > 0;
            if waiting.is_empty() && !waiting_on_slots {
                break;
            }
            debug!(
                cycle = self.cycle,
                waiting = waiting.len(),
                outstanding = self.outstanding(),
                "Queue cycle complete."
            );
            thread::sleep(self.config.poll_interval);
        }

        reporter.report(Progress::TaskFinish);
        info!(
            submitted = report.submitted.len(),
            failed = report.failed.len(),
            cycles = report.cycles,
            "Queue admission finished."
        );
        report
    }

    /// Refreshes own slots and returns how many jobs may be submitted right now.
    ///
    /// A failed or timed-out occupancy query yields zero. When the queue is saturated the
    /// controller asks it to release held jobs.
    pub fn free_capacity(&mut self) -> usize {
        self.refresh_slots();
        let own = self.outstanding();
        let user = self.config.user.clone();

        let occupancy = match self.call("query_occupancy", move |q| q.query_occupancy(&user)) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Occupancy query failed; admitting nothing this cycle.");
                return 0;
            }
        };

        let free = self
            .config
            .admission_cap
            .saturating_sub(occupancy.max(own));
        if free == 0 {
            self.release_held();
        }
        debug!(occupancy, own, free, "Admission capacity computed.");
        free
    }

    fn admit(
        &mut self,
        waiting: VecDeque<Waiting>,
        free: &mut usize,
        report: &mut QueueReport,
        reporter: &ProgressReporter,
        on_submit: &mut dyn FnMut(&QueueSlot),
    ) -> VecDeque<Waiting> {
        let mut still_waiting = VecDeque::with_capacity(waiting.len());
        for mut entry in waiting {
            if *free == 0 || entry.retry_after_cycle > self.cycle {
                still_waiting.push_back(entry);
                continue;
            }

            let job = entry.job.job.clone();
            match self.call("submit", move |q| q.submit(&job)) {
                Ok(job_id) => {
                    *free -= 1;
                    debug!(decoy = %entry.job.decoy, job = %job_id, "Job submitted.");
                    let slot = QueueSlot {
                        decoy: entry.job.decoy,
                        job_id,
                        state: QueueSlotState::Submitted,
                    };
                    on_submit(&slot);
                    self.slots.push(slot.clone());
                    report.submitted.push(slot);
                    reporter.report(Progress::TaskIncrement);
                }
                Err(error) => {
                    // Counted against this cycle: a timed-out submit may still have landed.
                    *free -= 1;
                    entry.attempts += 1;
                    if entry.attempts >= self.config.max_submit_attempts {
                        warn!(decoy = %entry.job.decoy, attempts = entry.attempts, %error, "Giving up on job submission.");
                        report.failed.push(SubmissionFailure {
                            decoy: entry.job.decoy,
                            attempts: entry.attempts,
                            error,
                        });
                        reporter.report(Progress::TaskIncrement);
                    } else {
                        let backoff = 1usize << (entry.attempts - 1).min(16);
                        entry.retry_after_cycle = self.cycle + backoff;
                        warn!(decoy = %entry.job.decoy, attempts = entry.attempts, backoff, %error, "Submission failed; will retry.");
                        still_waiting.push_back(entry);
                    }
                }
            }
        }
        still_waiting
    }

    /// Current states of `ids`, fetched in a single timed queue call.
    pub fn job_states(&self, ids: &[JobId]) -> Result<Vec<QueueSlotState>, QueueError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let user = self.config.user.clone();
        let ids = ids.to_vec();
        let expected = ids.len();
        let states = self.call("job_states", move |q| q.job_states(&user, &ids))?;
        if states.len() != expected {
            return Err(QueueError::Unavailable(format!(
                "queue reported {} states for {} jobs",
                states.len(),
                expected
            )));
        }
        Ok(states)
    }

    fn refresh_slots(&mut self) {
        let (indices, ids): (Vec<usize>, Vec<JobId>) = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.state.is_outstanding())
            .map(|(i, slot)| (i, slot.job_id.clone()))
            .unzip();

        match self.job_states(&ids) {
            Ok(states) => {
                for (i, state) in indices.into_iter().zip(states) {
                    self.slots[i].state = state;
                }
            }
            Err(e) => debug!(jobs = ids.len(), error = %e, "Could not refresh job states."),
        }
    }

    fn release_held(&self) {
        let user = self.config.user.clone();
        match self.call("release_held", move |q| q.release_held(&user)) {
            Ok(0) => {}
            Ok(n) => info!(released = n, "Released held jobs."),
            Err(e) => debug!(error = %e, "Releasing held jobs failed."),
        }
    }

    /// Runs a queue call on a helper thread, giving up after the configured timeout.
    fn call<T, F>(&self, operation: &'static str, f: F) -> Result<T, QueueError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn JobQueue) -> Result<T, QueueError> + Send + 'static,
    {
        let queue = Arc::clone(&self.queue);
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name(format!("passo-queue-{}", operation))
            .spawn(move || {
                let _ = tx.send(f(queue.as_ref()));
            })
            .map_err(|e| QueueError::Unavailable(format!("cannot spawn {} call: {}", operation, e)))?;

        match rx.recv_timeout(self.config.call_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(QueueError::Timeout {
                operation,
                after: self.config.call_timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(QueueError::Unavailable(format!(
                "{} call ended without a result",
                operation
            ))),
        }
    }
}
