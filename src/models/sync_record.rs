use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::SyncStatus;

/// Per-patient synchronization state with the pharmacy platform.
///
/// A `Failed` record may still carry an external patient id left over
/// from an earlier successful create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub patient_id: Uuid,
    pub external_patient_id: Option<String>,
    pub external_group_id: Option<String>,
    pub last_sync_status: SyncStatus,
    pub last_synced_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub last_medication_sync_at: Option<DateTime<Utc>>,
}
