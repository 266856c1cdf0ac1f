//! # Core Module
//!
//! Stateless building blocks of the PASSO orchestrator: the data model of a multi-start
//! search, rigid-body geometry, and the on-disk formats used to record progress.
//!
//! ## Architecture
//!
//! - **Data Model** ([`models`]) - Poses, grid origins, decoys and step records
//! - **Geometry** ([`utils::geometry`]) - Centroids, rotations and grid-frame math
//! - **Durable Records** ([`io`]) - Run/energy logs, status lines, decoy state files and
//!   batch job scripts

pub mod io;
pub mod models;
pub mod utils;
