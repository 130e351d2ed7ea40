//! Shared application state for the HTTP layer.
//!
//! `CoreState` owns what every request needs: where the database lives,
//! the pharmacy transport, and which patients currently have a sync in
//! flight. Connections are opened per request so the blocking
//! orchestrators never share one across threads.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::config::PharmacyConfig;
use crate::db;
use crate::pharmacy::{HttpTransport, PharmacyClient, PharmacyError, PharmacyTransport, RetryPolicy};

pub struct CoreState {
    pub db_path: PathBuf,
    transport: Arc<dyn PharmacyTransport>,
    retry: RetryPolicy,
    group_id: Option<String>,
    default_prescriber_id: Option<String>,
    /// Patients with a sync running right now.
    in_flight: Mutex<HashSet<Uuid>>,
}

impl CoreState {
    /// Build state with an HTTP transport. Must be called outside an async
    /// context: the blocking HTTP client owns its own runtime.
    pub fn new(db_path: PathBuf, config: &PharmacyConfig) -> Result<Self, PharmacyError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(db_path, Arc::new(transport), RetryPolicy::from_config(config))
            .with_tenant(config.group_id.clone(), config.default_prescriber_id.clone()))
    }

    pub fn with_transport(
        db_path: PathBuf,
        transport: Arc<dyn PharmacyTransport>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            db_path,
            transport,
            retry,
            group_id: None,
            default_prescriber_id: None,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_tenant(mut self, group_id: Option<String>, default_prescriber_id: Option<String>) -> Self {
        self.group_id = group_id;
        self.default_prescriber_id = default_prescriber_id;
        self
    }

    /// Open a database connection (migrations included).
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    /// A client over the shared transport.
    pub fn pharmacy_client(&self) -> PharmacyClient {
        PharmacyClient::new(Box::new(self.transport.clone()), self.retry.clone())
            .with_group_id(self.group_id.clone())
            .with_default_prescriber(self.default_prescriber_id.clone())
    }

    /// Claim `patient_id` for a sync. `Ok(None)` if one is already running.
    /// The claim is released when the guard drops.
    pub fn try_begin_sync(self: &Arc<Self>, patient_id: Uuid) -> Result<Option<SyncGuard>, CoreError> {
        let mut in_flight = self.in_flight.lock().map_err(|_| CoreError::LockPoisoned)?;
        if !in_flight.insert(patient_id) {
            return Ok(None);
        }
        Ok(Some(SyncGuard {
            core: Arc::clone(self),
            patient_id,
        }))
    }

    #[cfg(test)]
    pub(crate) fn is_syncing(&self, patient_id: &Uuid) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(patient_id))
            .unwrap_or(false)
    }
}

/// Held for the duration of one patient's sync.
pub struct SyncGuard {
    core: Arc<CoreState>,
    patient_id: Uuid,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.core.in_flight.lock() {
            in_flight.remove(&self.patient_id);
        }
    }
}

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}
