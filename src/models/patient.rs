use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Internal patient as held by the organization's data store.
///
/// Demographic fields are optional because records are often created
/// incrementally by staff; the sync orchestrator enforces what the
/// pharmacy platform requires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Raw date of birth as entered, expected `YYYY-MM-DD`.
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    /// Mobile number, sent as a `cell` phone.
    pub phone: Option<String>,
    pub home_phone: Option<String>,
    pub email: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub pharmacy_id: Option<Uuid>,
}

/// Fields recovered from an external patient. Absent fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub home_phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}
