//! API endpoint handlers.
//!
//! Handlers are thin: they claim the patient, open a connection and run
//! the blocking orchestrator on the blocking pool.

pub mod health;
pub mod prescribers;
pub mod sync;
