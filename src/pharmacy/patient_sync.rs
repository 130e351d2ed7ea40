//! Patient Sync Orchestrator: create the patient on the pharmacy platform
//! and record the outcome.
//!
//! ```text
//! preconditions → map → POST /patients → resolve id (→ GET /patient/getall) → upsert
//! ```
//!
//! Precondition failures return before any network call and leave the
//! sync record untouched. Everything after them is recorded, success or
//! failure, and no error escapes as anything but a `SyncResult`.

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::client::{extract_patient_id, PharmacyClient};
use super::error::PharmacyError;
use super::mapper::{self, ExternalPatientPayload};
use super::store;
use crate::db;
use crate::models::{PatientRecord, SyncRecord, SyncStatus};

pub const PARTNER_PHARMACY_REQUIRED: &str = "Patient must be assigned to partnered pharmacy";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub success: bool,
    pub external_patient_id: Option<String>,
    pub external_group_id: Option<String>,
    pub error: Option<String>,
}

impl SyncResult {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            external_patient_id: None,
            external_group_id: None,
            error: Some(error.into()),
        }
    }
}

/// Ids resolved by a successful create.
struct Resolved {
    external_patient_id: Option<String>,
    external_group_id: Option<String>,
}

pub struct PatientSyncer {
    client: PharmacyClient,
}

impl PatientSyncer {
    pub fn new(client: PharmacyClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &PharmacyClient {
        &self.client
    }

    /// Create or re-create `patient_id` on the pharmacy platform.
    ///
    /// Always issues a fresh create, even for a patient that already has an
    /// external id.
    pub fn sync_patient(
        &self,
        conn: &Connection,
        patient_id: &Uuid,
        pharmacy_id: Option<&Uuid>,
    ) -> SyncResult {
        let patient = match check_preconditions(conn, patient_id, pharmacy_id) {
            Ok(patient) => patient,
            Err(e) => {
                tracing::warn!(patient_id = %patient_id, error = %e, "Pharmacy sync rejected");
                return SyncResult::failure(e.to_string());
            }
        };

        let previous = match store::get_sync_record(conn, patient_id) {
            Ok(previous) => previous,
            Err(e) => {
                tracing::warn!(patient_id = %patient_id, error = %e, "Cannot read previous sync record");
                None
            }
        };
        if let Some(existing) = previous.as_ref().and_then(|r| r.external_patient_id.as_deref()) {
            tracing::warn!(
                patient_id = %patient_id,
                previous_external_id = existing,
                "Patient already has an external id; issuing a new create"
            );
        }

        match self.push_patient(conn, &patient, previous.as_ref()) {
            Ok(resolved) => self.record_success(conn, patient_id, previous.as_ref(), resolved),
            Err(e) => record_failure(conn, patient_id, previous.as_ref(), e),
        }
    }

    fn push_patient(
        &self,
        conn: &Connection,
        patient: &PatientRecord,
        previous: Option<&SyncRecord>,
    ) -> Result<Resolved, PharmacyError> {
        store::upsert_sync_record(conn, &carry_forward(patient.id, previous, SyncStatus::Pending, None))?;

        let payload = mapper::patient_to_external(patient);
        let response = self.client.create_patient(&payload)?;

        let external_patient_id = match extract_patient_id(&response) {
            Some(id) => Some(id),
            None => self.find_created_patient(&payload, &patient.id),
        };

        Ok(Resolved {
            external_patient_id,
            external_group_id: self.client.resolve_group_id(&response),
        })
    }

    /// Look the patient up by name and phone after a create response that
    /// carried no id. Failures here are reconciliation misses, not errors.
    fn find_created_patient(&self, payload: &ExternalPatientPayload, patient_id: &Uuid) -> Option<String> {
        let found = self
            .client
            .list_patients()
            .map(|entries| find_matching_patient(&entries, payload));

        match found {
            Ok(Some(id)) => {
                tracing::info!(patient_id = %patient_id, external_patient_id = %id, "Resolved external id by lookup");
                Some(id)
            }
            Ok(None) => {
                tracing::warn!(patient_id = %patient_id, "Patient created but no external id could be resolved");
                None
            }
            Err(e) => {
                tracing::warn!(
                    patient_id = %patient_id,
                    error = %e,
                    "Patient created but external id lookup failed"
                );
                None
            }
        }
    }

    fn record_success(
        &self,
        conn: &Connection,
        patient_id: &Uuid,
        previous: Option<&SyncRecord>,
        resolved: Resolved,
    ) -> SyncResult {
        let record = SyncRecord {
            patient_id: *patient_id,
            external_patient_id: resolved.external_patient_id.clone(),
            external_group_id: resolved.external_group_id.clone(),
            last_sync_status: SyncStatus::Success,
            last_synced_at: Utc::now(),
            last_error: None,
            last_medication_sync_at: previous.and_then(|r| r.last_medication_sync_at),
        };
        if let Err(e) = store::upsert_sync_record(conn, &record) {
            tracing::error!(patient_id = %patient_id, error = %e, "Cannot record pharmacy sync success");
            return SyncResult::failure(PharmacyError::from(e).to_string());
        }

        tracing::info!(
            patient_id = %patient_id,
            external_patient_id = ?resolved.external_patient_id,
            "Patient synced to pharmacy platform"
        );
        SyncResult {
            success: true,
            external_patient_id: resolved.external_patient_id,
            external_group_id: resolved.external_group_id,
            error: None,
        }
    }
}

fn record_failure(
    conn: &Connection,
    patient_id: &Uuid,
    previous: Option<&SyncRecord>,
    error: PharmacyError,
) -> SyncResult {
    let message = error.to_string();
    tracing::warn!(patient_id = %patient_id, error = %message, "Pharmacy sync failed");

    let record = carry_forward(*patient_id, previous, SyncStatus::Failed, Some(message.clone()));
    if let Err(e) = store::upsert_sync_record(conn, &record) {
        tracing::error!(patient_id = %patient_id, error = %e, "Cannot record pharmacy sync failure");
    }

    SyncResult::failure(message)
}

/// New status on top of whatever ids the patient already had.
fn carry_forward(
    patient_id: Uuid,
    previous: Option<&SyncRecord>,
    status: SyncStatus,
    error: Option<String>,
) -> SyncRecord {
    SyncRecord {
        patient_id,
        external_patient_id: previous.and_then(|r| r.external_patient_id.clone()),
        external_group_id: previous.and_then(|r| r.external_group_id.clone()),
        last_sync_status: status,
        last_synced_at: Utc::now(),
        last_error: error,
        last_medication_sync_at: previous.and_then(|r| r.last_medication_sync_at),
    }
}

fn check_preconditions(
    conn: &Connection,
    patient_id: &Uuid,
    pharmacy_id: Option<&Uuid>,
) -> Result<PatientRecord, PharmacyError> {
    let patient = db::get_patient(conn, patient_id)?
        .ok_or_else(|| PharmacyError::Validation(format!("Patient {patient_id} not found")))?;

    if let Some(pharmacy_id) = pharmacy_id {
        let eligible = db::get_pharmacy(conn, pharmacy_id)?
            .is_some_and(|p| p.is_partner && p.organization_id == patient.organization_id);
        if !eligible {
            return Err(PharmacyError::Validation(PARTNER_PHARMACY_REQUIRED.into()));
        }
    }

    let missing: Vec<&str> = [
        ("first_name", &patient.first_name),
        ("last_name", &patient.last_name),
        ("date_of_birth", &patient.date_of_birth),
    ]
    .into_iter()
    .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
    .map(|(field, _)| field)
    .collect();
    if !missing.is_empty() {
        return Err(PharmacyError::Validation(format!(
            "Patient is missing required fields: {}",
            missing.join(", ")
        )));
    }

    if patient.date_of_birth.as_deref().and_then(mapper::parse_date).is_none() {
        return Err(PharmacyError::Validation(
            "Date of birth is not a valid YYYY-MM-DD date".into(),
        ));
    }

    Ok(patient)
}

/// Linear search of the platform's patient list: names must match, and
/// the phone too when one was sent.
fn find_matching_patient(entries: &[Value], sent: &ExternalPatientPayload) -> Option<String> {
    let same = |a: &str, b: &str| a.trim().eq_ignore_ascii_case(b.trim());
    let sent_phones: Vec<&str> = sent.phone_numbers.iter().map(|p| p.number.as_str()).collect();

    entries.iter().find_map(|entry| {
        let candidate = mapper::read_patient_entry(entry)?;
        if !same(&candidate.patient.first_name, &sent.patient.first_name)
            || !same(&candidate.patient.last_name, &sent.patient.last_name)
        {
            return None;
        }
        if !sent_phones.is_empty() {
            let phone_match = candidate
                .phone_numbers
                .iter()
                .any(|p| sent_phones.contains(&mapper::digits_only(&p.number).as_str()));
            if !phone_match {
                return None;
            }
        }
        extract_patient_id(entry)
    })
}
