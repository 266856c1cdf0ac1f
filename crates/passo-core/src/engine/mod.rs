//! # Engine Module
//!
//! The stateful logic of a PASSO search: building the multi-start grid, screening candidate
//! poses, advancing a single decoy step by step and pacing submissions to a shared cluster
//! queue.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Protocol, grid, queue and execution parameters
//! - **Collaborators** ([`collaborators`]) - Traits for the geometry source, the design
//!   engine and the cluster queue
//! - **Grid** ([`grid`]) - Virtual center and grid-origin layout
//! - **Pre-filter** ([`filter`]) - Geometric admissibility of candidate poses
//! - **Step Machine** ([`passo`]) - Perturb, filter, design and greedy acceptance
//! - **Queue Control** ([`queue`]) - Occupancy-aware admission with retry and backoff
//! - **Progress Monitoring** ([`progress`]) - Progress events for front ends
//! - **Error Handling** ([`error`]) - Engine-level error taxonomy
//!
//! None of these components talks to a filesystem format or external process directly;
//! durable records live in [`crate::core::io`] and real collaborators are supplied by the
//! caller.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod filter;
pub mod grid;
pub mod passo;
pub mod progress;
pub mod queue;
pub(crate) mod utils;

#[cfg(test)]
pub(crate) mod fakes;
