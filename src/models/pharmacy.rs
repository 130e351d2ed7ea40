use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pharmacy {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    /// Eligible for synchronization with the external platform.
    pub is_partner: bool,
}
