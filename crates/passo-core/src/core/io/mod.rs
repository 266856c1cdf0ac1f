//! Durable artifacts written by a PASSO run.
//!
//! Everything here is either append-only (run and energy logs) or replaced atomically
//! through a temporary file (status lines, decoy state, job scripts), so an external
//! monitor never observes a torn write.

pub mod atomic;
pub mod error;
pub mod job_script;
pub mod reporters;
pub mod state;
