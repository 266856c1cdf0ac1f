use super::ids::DecoyId;
use super::pose::Pose;
use super::step::StepRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecoyStatus {
    Queued,
    Running,
    Finished,
    Failed,
}

impl DecoyStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DecoyStatus::Finished | DecoyStatus::Failed)
    }
}

/// In-memory state of one trajectory while its runner owns it.
#[derive(Debug, Clone)]
pub struct Decoy {
    pub id: DecoyId,
    pub status: DecoyStatus,
    step: usize,
    current: Pose,
    best_energy: f64,
    history: Vec<StepRecord>,
}

impl Decoy {
    pub fn new(id: DecoyId, start: Pose, start_energy: f64) -> Self {
        Self {
            id,
            status: DecoyStatus::Queued,
            step: 0,
            current: start,
            best_energy: start_energy,
            history: Vec::new(),
        }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn current(&self) -> &Pose {
        &self.current
    }

    pub fn best_energy(&self) -> f64 {
        self.best_energy
    }

    pub fn history(&self) -> &[StepRecord] {
        &self.history
    }

    /// Appends an executed step. `candidate` replaces the current pose only when the
    /// record is accepted and strictly lowers the best energy.
    pub fn apply(&mut self, record: StepRecord, candidate: Option<Pose>) {
        self.step = record.step;
        if let (true, Some(after), Some(pose)) = (record.accepted, record.energy_after, candidate) {
            if after < self.best_energy {
                self.best_energy = after;
                self.current = pose;
            }
        }
        self.history.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ids::GridOriginId;
    use crate::core::models::pose::StructureHandle;
    use crate::core::models::step::Perturbation;
    use nalgebra::Point3;

    fn decoy() -> Decoy {
        Decoy::new(
            DecoyId::new(GridOriginId(0), 0),
            Pose::new(Point3::origin(), StructureHandle::new("start")),
            -1.0,
        )
    }

    #[test]
    fn accepted_step_commits_candidate() {
        let mut d = decoy();
        let candidate = Pose::new(Point3::new(0.1, 0.0, 0.0), StructureHandle::new("s1"));
        d.apply(
            StepRecord::designed(1, Perturbation::identity(), -1.0, -2.0),
            Some(candidate.clone()),
        );

        assert_eq!(d.best_energy(), -2.0);
        assert_eq!(d.current(), &candidate);
        assert_eq!(d.step(), 1);
    }

    #[test]
    fn rejected_step_keeps_previous_pose() {
        let mut d = decoy();
        let start = d.current().clone();
        d.apply(
            StepRecord::designed(1, Perturbation::identity(), -1.0, 3.0),
            Some(Pose::new(Point3::new(9.0, 0.0, 0.0), StructureHandle::new("bad"))),
        );

        assert_eq!(d.best_energy(), -1.0);
        assert_eq!(d.current(), &start);
        assert_eq!(d.history().len(), 1);
    }

    #[test]
    fn terminal_statuses() {
        assert!(DecoyStatus::Finished.is_terminal());
        assert!(DecoyStatus::Failed.is_terminal());
        assert!(!DecoyStatus::Running.is_terminal());
        assert!(!DecoyStatus::Queued.is_terminal());
    }
}
