//! Utility functions for the engine module.
//!
//! Random sampling of rigid-body moves used by the PASSO step machine.

pub mod sampling;
