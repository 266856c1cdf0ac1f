use super::ids::GridOriginId;
use super::pose::{Pose, StructureHandle};
use nalgebra::{Point3, Rotation3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridOriginStatus {
    Pending,
    Running,
    Completed,
}

/// One starting position of the movable block in the multi-start grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridOrigin {
    id: GridOriginId,
    coordinate: Point3<f64>,
    frame: Rotation3<f64>,
    pub status: GridOriginStatus,
    decoys_total: usize,
    decoys_completed: usize,
    decoys_failed: usize,
    best_energy: Option<f64>,
}

impl GridOrigin {
    pub fn new(
        id: GridOriginId,
        coordinate: Point3<f64>,
        frame: Rotation3<f64>,
        decoys_total: usize,
    ) -> Self {
        Self {
            id,
            coordinate,
            frame,
            status: GridOriginStatus::Pending,
            decoys_total,
            decoys_completed: 0,
            decoys_failed: 0,
            best_energy: None,
        }
    }

    pub fn id(&self) -> GridOriginId {
        self.id
    }

    pub fn coordinate(&self) -> &Point3<f64> {
        &self.coordinate
    }

    /// Local grid frame: columns are the A→B axis, the in-plane offset of C and their normal.
    pub fn frame(&self) -> &Rotation3<f64> {
        &self.frame
    }

    pub fn decoys_total(&self) -> usize {
        self.decoys_total
    }

    pub fn decoys_completed(&self) -> usize {
        self.decoys_completed
    }

    pub fn decoys_failed(&self) -> usize {
        self.decoys_failed
    }

    pub fn best_energy(&self) -> Option<f64> {
        self.best_energy
    }

    /// Starting pose of the movable block: its input orientation, centered on this origin.
    pub fn start_pose(&self, structure: StructureHandle) -> Pose {
        Pose::new(self.coordinate, structure)
    }

    pub fn mark_running(&mut self) {
        if self.status == GridOriginStatus::Pending {
            self.status = GridOriginStatus::Running;
        }
    }

    /// Records a terminal decoy. Returns `false` once every decoy has been accounted for.
    pub fn record_finished(&mut self, energy: Option<f64>) -> bool {
        if !self.has_capacity() {
            return false;
        }
        self.decoys_completed += 1;
        if let Some(e) = energy {
            self.best_energy = Some(self.best_energy.map_or(e, |best| best.min(e)));
        }
        self.refresh_status();
        true
    }

    pub fn record_failed(&mut self) -> bool {
        if !self.has_capacity() {
            return false;
        }
        self.decoys_failed += 1;
        self.refresh_status();
        true
    }

    pub fn reset_counters(&mut self) {
        self.decoys_completed = 0;
        self.decoys_failed = 0;
        self.best_energy = None;
        self.status = GridOriginStatus::Pending;
    }

    fn has_capacity(&self) -> bool {
        self.decoys_completed + self.decoys_failed < self.decoys_total
    }

    fn refresh_status(&mut self) {
        self.status = if self.has_capacity() {
            GridOriginStatus::Running
        } else {
            GridOriginStatus::Completed
        };
    }
}
