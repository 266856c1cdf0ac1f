//! Adapters that connect the library's collaborator traits to the outside world: geometry
//! files, the structural-simulation engine process and the SLURM command-line tools.

pub mod engine;
pub mod geometry;
pub mod slurm;
