use passo::core::io::job_script::JobDescription;
use passo::core::models::ids::JobId;
use passo::engine::collaborators::{JobQueue, QueueError, QueueSlotState};
use std::collections::HashMap;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const HELD_REASON: &str = "launch failed requeued held";
const EXIT_POLL: Duration = Duration::from_millis(20);

/// `JobQueue` backed by the SLURM command-line tools.
///
/// Every tool invocation is bounded by `timeout`; a command still running at the deadline
/// is killed so hung scheduler calls do not pile up.
#[derive(Debug, Clone)]
pub struct SlurmQueue {
    sbatch: String,
    squeue: String,
    scontrol: String,
    timeout: Duration,
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

fn wait_until(child: &mut Child, deadline: Instant) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(EXIT_POLL);
    }
}

impl SlurmQueue {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sbatch: "sbatch".to_string(),
            squeue: "squeue".to_string(),
            scontrol: "scontrol".to_string(),
            timeout,
        }
    }

    fn run(&self, operation: &'static str, program: &str, args: &[&str]) -> Result<String, QueueError> {
        debug!(program, ?args, "Calling queue tool.");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| QueueError::Unavailable(format!("cannot run '{}': {}", program, e)))?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match wait_until(&mut child, Instant::now() + self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(program, after = ?self.timeout, "Queue tool timed out; killed it.");
                return Err(QueueError::Timeout {
                    operation,
                    after: self.timeout,
                });
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(QueueError::Unavailable(format!(
                    "waiting for '{}' failed: {}",
                    program, e
                )));
            }
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        if !status.success() {
            return Err(QueueError::Unavailable(format!(
                "'{}' exited with {}: {}",
                program,
                status,
                stderr.trim()
            )));
        }
        Ok(stdout)
    }
}

/// `sbatch --parsable` prints `jobid[;cluster]`.
pub fn parse_submission(stdout: &str) -> Option<JobId> {
    let first = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
    let id = first.split(';').next()?.trim();
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit() || c == '_') {
        return None;
    }
    Some(JobId(id.to_string()))
}

pub fn count_jobs(stdout: &str) -> usize {
    stdout.lines().filter(|l| !l.trim().is_empty()).count()
}

/// Maps a `squeue -o %T` state. An empty answer means the job has left the queue.
pub fn parse_job_state(stdout: &str) -> QueueSlotState {
    match stdout.trim() {
        "" => QueueSlotState::Done,
        "PENDING" | "REQUEUED" | "REQUEUE_HOLD" | "REQUEUE_FED" | "CONFIGURING" => {
            QueueSlotState::Submitted
        }
        "RUNNING" | "COMPLETING" | "SUSPENDED" | "STAGE_OUT" | "SIGNALING" | "RESIZING" => {
            QueueSlotState::Running
        }
        "COMPLETED" | "FAILED" | "CANCELLED" | "TIMEOUT" | "NODE_FAIL" | "PREEMPTED"
        | "OUT_OF_MEMORY" | "BOOT_FAIL" | "DEADLINE" => QueueSlotState::Done,
        _ => QueueSlotState::Unknown,
    }
}

/// States of `ids` from a `squeue -o "%i|%T"` listing. Ids the listing lacks have left the
/// queue.
pub fn states_from_listing(stdout: &str, ids: &[JobId]) -> Vec<QueueSlotState> {
    let listed: HashMap<&str, &str> = stdout
        .lines()
        .filter_map(|line| line.split_once('|'))
        .map(|(id, state)| (id.trim(), state.trim()))
        .collect();
    ids.iter()
        .map(|id| match listed.get(id.0.as_str()) {
            Some(state) => parse_job_state(state),
            None => QueueSlotState::Done,
        })
        .collect()
}

/// Job ids from `squeue -o "%i|%r"` whose pending reason marks a failed, held launch.
pub fn held_jobs(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_once('|'))
        .filter(|(_, reason)| reason.to_ascii_lowercase().contains(HELD_REASON))
        .map(|(id, _)| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

impl JobQueue for SlurmQueue {
    fn submit(&self, job: &JobDescription) -> Result<JobId, QueueError> {
        let script = job.script_path.to_string_lossy();
        let stdout = self.run("submit", &self.sbatch, &["--parsable", script.as_ref()])?;
        parse_submission(&stdout).ok_or_else(|| {
            QueueError::Unavailable(format!(
                "unexpected sbatch output for {}: {:?}",
                job.name,
                stdout.trim()
            ))
        })
    }

    fn query_occupancy(&self, user: &str) -> Result<usize, QueueError> {
        let stdout = self.run("query_occupancy", &self.squeue, &["-h", "-u", user, "-o", "%i"])?;
        Ok(count_jobs(&stdout))
    }

    fn job_state(&self, id: &JobId) -> Result<QueueSlotState, QueueError> {
        match self.run("job_state", &self.squeue, &["-h", "-j", id.0.as_str(), "-o", "%T"]) {
            Ok(stdout) => Ok(parse_job_state(&stdout)),
            // squeue rejects ids it has already purged.
            Err(QueueError::Unavailable(msg)) if msg.contains("Invalid job id") => {
                Ok(QueueSlotState::Done)
            }
            Err(e) => Err(e),
        }
    }

    fn job_states(&self, user: &str, ids: &[JobId]) -> Result<Vec<QueueSlotState>, QueueError> {
        let stdout = self.run("job_states", &self.squeue, &["-h", "-u", user, "-o", "%i|%T"])?;
        Ok(states_from_listing(&stdout, ids))
    }

    fn release_held(&self, user: &str) -> Result<usize, QueueError> {
        let stdout = self.run("release_held", &self.squeue, &["-h", "-u", user, "-o", "%i|%r"])?;
        let mut released = 0;
        for id in held_jobs(&stdout) {
            match self.run("release_held", &self.scontrol, &["release", id.as_str()]) {
                Ok(_) => released += 1,
                Err(e) => warn!(job = %id, error = %e, "Could not release held job."),
            }
        }
        if released > 0 {
            info!(released, "Released jobs held after a failed launch.");
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_ids_are_parsed() {
        assert_eq!(parse_submission("123456\n"), Some(JobId("123456".into())));
        assert_eq!(
            parse_submission("98765;cluster-a\n"),
            Some(JobId("98765".into()))
        );
        assert_eq!(parse_submission(""), None);
        assert_eq!(parse_submission("Submitted batch job\n"), None);
    }

    #[test]
    fn occupancy_counts_non_empty_lines() {
        assert_eq!(count_jobs("101\n102\n\n103\n"), 3);
        assert_eq!(count_jobs(""), 0);
    }

    #[test]
    fn job_states_map_onto_slot_states() {
        assert_eq!(parse_job_state("PENDING\n"), QueueSlotState::Submitted);
        assert_eq!(parse_job_state("RUNNING\n"), QueueSlotState::Running);
        assert_eq!(parse_job_state("COMPLETING"), QueueSlotState::Running);
        assert_eq!(parse_job_state("COMPLETED"), QueueSlotState::Done);
        assert_eq!(parse_job_state("\n"), QueueSlotState::Done);
        assert_eq!(parse_job_state("MYSTERY"), QueueSlotState::Unknown);
    }

    #[test]
    fn only_failed_launches_are_released() {
        let stdout = "\
101|Resources
102|launch failed requeued held
103|Priority
104|Launch Failed Requeued Held
";
        assert_eq!(held_jobs(stdout), vec!["102".to_string(), "104".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn missing_tools_make_the_queue_unavailable() {
        let queue = SlurmQueue {
            sbatch: "passo-no-sbatch".to_string(),
            squeue: "passo-no-squeue".to_string(),
            scontrol: "passo-no-scontrol".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert!(matches!(
            queue.query_occupancy("jdoe"),
            Err(QueueError::Unavailable(_))
        ));
    }

    #[test]
    fn listing_maps_every_requested_job() {
        let stdout = "\
4101|RUNNING
4102|PENDING
4200|RUNNING
";
        let ids = [
            JobId("4102".into()),
            JobId("4101".into()),
            JobId("4099".into()),
        ];
        assert_eq!(
            states_from_listing(stdout, &ids),
            vec![
                QueueSlotState::Submitted,
                QueueSlotState::Running,
                QueueSlotState::Done
            ]
        );
        assert!(states_from_listing("", &[]).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn hung_tool_is_killed_at_the_deadline() {
        let queue = SlurmQueue::new(Duration::from_millis(100));
        let started = Instant::now();

        let result = queue.run("query_occupancy", "sleep", &["30"]);

        assert!(matches!(
            result,
            Err(QueueError::Timeout {
                operation: "query_occupancy",
                ..
            })
        ));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn tool_output_is_returned_on_success() {
        let queue = SlurmQueue::new(Duration::from_secs(10));
        let stdout = queue.run("query_occupancy", "sh", &["-c", "echo 101; echo 102"]).unwrap();
        assert_eq!(count_jobs(&stdout), 2);
    }
}
