//! # Workflows Module
//!
//! High-level entry points that tie the [`crate::engine`] and [`crate::core`] layers into
//! complete procedures.
//!
//! - **Single Decoy** ([`decoy`]) - Runs one trajectory from its grid origin to a terminal
//!   state, skipping decoys whose durable state is already terminal.
//! - **Multi-Start Docking** ([`multi_dock`]) - Expands the grid into decoys, runs them on a
//!   local thread pool or submits them through the queue controller, and aggregates
//!   progress from the files they leave behind.

pub mod decoy;
pub mod multi_dock;
