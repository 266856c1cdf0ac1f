//! # PASSO Core Library
//!
//! Orchestration of PASSO (Position And Sequence Simultaneous Optimization) searches:
//! many independent stochastic docking trajectories started from a grid of positions
//! around a binding site, each alternating small rigid-body moves of a movable block with
//! sequence/rotamer design cycles and greedy acceptance.
//!
//! The structural-simulation engine, the source of block coordinates and the cluster queue
//! are external. This crate drives them through the traits in
//! [`engine::collaborators`].
//!
//! ## Architecture
//!
//! - **[`core`]: The Foundation.** Data models (`Pose`, `GridOrigin`, `Decoy`,
//!   `StepRecord`), rigid-body geometry and the durable records a run leaves on disk.
//!
//! - **[`engine`]: The Logic Core.** Grid construction, the pre-filter, the per-decoy
//!   step machine and the occupancy-aware queue controller.
//!
//! - **[`workflows`]: The Public API.** Running a single decoy and driving a complete
//!   multi-start search, locally or on a cluster.

pub mod core;
pub mod engine;
pub mod workflows;
