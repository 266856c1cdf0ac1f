//! # Core Models Module
//!
//! Plain data structures describing a multi-start PASSO search: the blocks of the docking
//! system, rigid-body poses of the movable block, grid origins, decoys and the step
//! records that make up a trajectory.
//!
//! ## Key Components
//!
//! - [`ids`] - Identifier types for grid origins, decoys and external jobs
//! - [`pose`] - Block identifiers, structure handles and rigid-body poses
//! - [`step`] - Perturbations and per-step records
//! - [`grid`] - Grid origins and their completion bookkeeping
//! - [`decoy`] - Decoy status and in-memory trajectory state

pub mod decoy;
pub mod grid;
pub mod ids;
pub mod pose;
pub mod step;
