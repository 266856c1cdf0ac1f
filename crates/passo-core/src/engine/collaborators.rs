//! Narrow interfaces to the external systems a PASSO run depends on.
//!
//! The structural-simulation engine, the source of block coordinates and the cluster job
//! queue are all treated as black boxes. The engine only ever talks to them through the
//! traits below, which keeps every algorithm in this crate testable with in-memory fakes.

use crate::core::io::job_script::JobDescription;
use crate::core::models::ids::JobId;
use crate::core::models::pose::{BlockId, Pose, StructureHandle};
use crate::core::utils::geometry::centroid;
use nalgebra::Point3;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Block {block} is absent from the input structure")]
    BlockNotFound { block: BlockId },
    #[error("{0}")]
    Degenerate(String),
}

#[derive(Debug, Error)]
pub enum DesignEngineError {
    #[error("Simulation failed: {0}")]
    Simulation(String),
    #[error("Failed to invoke '{command}': {source}")]
    Invocation {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Unexpected engine output: {0}")]
    MalformedOutput(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueueError {
    #[error("Queue system unavailable: {0}")]
    Unavailable(String),
    #[error("Queue call '{operation}' timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

/// Supplies coordinates of the three structural blocks.
pub trait GeometrySource {
    fn coordinates(&self, block: BlockId) -> Result<Vec<Point3<f64>>, GeometryError>;

    fn centroid(&self, block: BlockId) -> Result<Point3<f64>, GeometryError> {
        let coords = self.coordinates(block)?;
        centroid(&coords).ok_or(GeometryError::BlockNotFound { block })
    }
}

/// In-memory geometry, e.g. extracted once from the input structure.
#[derive(Debug, Clone, Default)]
pub struct StaticGeometry {
    blocks: HashMap<BlockId, Vec<Point3<f64>>>,
}

impl StaticGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block(mut self, block: BlockId, coordinates: Vec<Point3<f64>>) -> Self {
        self.blocks.insert(block, coordinates);
        self
    }
}

impl GeometrySource for StaticGeometry {
    fn coordinates(&self, block: BlockId) -> Result<Vec<Point3<f64>>, GeometryError> {
        let coords = self
            .blocks
            .get(&block)
            .filter(|c| !c.is_empty())
            .ok_or(GeometryError::BlockNotFound { block })?;
        if coords.iter().any(|p| !p.coords.iter().all(|v| v.is_finite())) {
            return Err(GeometryError::Degenerate(format!(
                "block {} contains non-finite coordinates",
                block
            )));
        }
        Ok(coords.clone())
    }
}

/// One design cycle request: repack and minimize around `target_chain`.
#[derive(Debug, Clone)]
pub struct DesignRequest<'a> {
    pub pose: &'a Pose,
    pub target_chain: char,
    pub cutoff: f64,
    pub cycles: usize,
    /// Stable label for naming engine-side artifacts, e.g. `"3_17_step42"`.
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DesignOutcome {
    pub structure: StructureHandle,
    pub total_energy: f64,
}

/// The external structural-simulation engine.
pub trait DesignEngine: Send + Sync {
    /// Total energy of a pose without modifying it.
    fn score(&self, pose: &Pose) -> Result<f64, DesignEngineError>;

    fn design(&self, request: &DesignRequest<'_>) -> Result<DesignOutcome, DesignEngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueSlotState {
    Submitted,
    Running,
    Done,
    Unknown,
}

impl QueueSlotState {
    pub fn is_outstanding(&self) -> bool {
        !matches!(self, QueueSlotState::Done)
    }
}

/// The shared cluster queue.
pub trait JobQueue: Send + Sync {
    fn submit(&self, job: &JobDescription) -> Result<JobId, QueueError>;

    /// Number of jobs the queue currently holds for `user`.
    fn query_occupancy(&self, user: &str) -> Result<usize, QueueError>;

    fn job_state(&self, id: &JobId) -> Result<QueueSlotState, QueueError>;

    /// States of several jobs owned by `user`, in the order of `ids`.
    ///
    /// Queues that can list every job of a user in one call should override this; the
    /// default asks about each id in turn.
    fn job_states(&self, _user: &str, ids: &[JobId]) -> Result<Vec<QueueSlotState>, QueueError> {
        ids.iter().map(|id| self.job_state(id)).collect()
    }

    /// Releases jobs stuck in a held state after a failed launch. Returns how many.
    fn release_held(&self, _user: &str) -> Result<usize, QueueError> {
        Ok(0)
    }
}
