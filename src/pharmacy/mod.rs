//! External pharmacy synchronization.
//!
//! ```text
//! PatientSyncer / MedicationSyncer
//!     → mapper (internal ⇄ wire shapes)
//!     → PharmacyClient (endpoints, retry)
//!     → PharmacyTransport (HTTP, auth headers)
//!     → store (pharmacy_sync rows)
//! ```
//!
//! The orchestrators are blocking; async callers run them on a blocking
//! thread with their own connection.

pub mod client;
pub mod error;
pub mod mapper;
pub mod medication_sync;
pub mod patient_sync;
pub mod retry;
pub mod store;
pub mod transport;

pub use client::{PharmacyClient, Prescriber};
pub use error::PharmacyError;
pub use medication_sync::{MedicationSyncResult, MedicationSyncer};
pub use patient_sync::{PatientSyncer, SyncResult};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, MockTransport, PharmacyTransport};
