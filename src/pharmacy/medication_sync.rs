//! Medication Sync Orchestrator: pull a synced patient's medications from
//! the pharmacy platform and merge them into the internal list.
//!
//! Matching is by drug code first, then by name + strength. The fallback
//! is heuristic: two formulations can share a name and strength, so
//! ambiguous keys are logged and the first internal record wins.

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::client::PharmacyClient;
use super::error::PharmacyError;
use super::mapper::{self, ExternalMedicationPayload};
use super::store;
use crate::db;
use crate::models::{MedicationRecord, MedicationUpdate};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MedicationSyncResult {
    pub success: bool,
    pub created: u32,
    pub updated: u32,
    pub errors: Vec<String>,
}

impl MedicationSyncResult {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
            ..Self::default()
        }
    }
}

pub struct MedicationSyncer {
    client: PharmacyClient,
}

impl MedicationSyncer {
    pub fn new(client: PharmacyClient) -> Self {
        Self { client }
    }

    /// Fetch the platform's list for `patient_id` and create or update
    /// internal records. One bad item never aborts the batch.
    pub fn sync_medications_from_external(
        &self,
        conn: &Connection,
        patient_id: &Uuid,
    ) -> MedicationSyncResult {
        let external_id = match synced_external_id(conn, patient_id) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(patient_id = %patient_id, error = %e, "Medication sync rejected");
                return MedicationSyncResult::failure(e.to_string());
            }
        };

        let items = match self.client.list_medications(&external_id) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(patient_id = %patient_id, error = %e, "Cannot fetch pharmacy medications");
                return MedicationSyncResult::failure(e.to_string());
            }
        };

        let mut lookup = match db::list_active_medications(conn, patient_id) {
            Ok(active) => MedicationLookup::new(active),
            Err(e) => {
                tracing::error!(patient_id = %patient_id, error = %e, "Cannot load internal medications");
                return MedicationSyncResult::failure(PharmacyError::from(e).to_string());
            }
        };

        let mut result = MedicationSyncResult::default();
        for (index, item) in items.iter().enumerate() {
            match merge_item(conn, &mut lookup, item, patient_id) {
                Ok(Merge::Created) => result.created += 1,
                Ok(Merge::Updated) => result.updated += 1,
                Err(e) => {
                    tracing::warn!(patient_id = %patient_id, item = index, error = %e, "Medication item failed");
                    result.errors.push(format!("item {index}: {e}"));
                }
            }
        }
        result.success = result.errors.is_empty();

        if let Err(e) = store::touch_medication_sync(conn, patient_id, Utc::now()) {
            tracing::warn!(patient_id = %patient_id, error = %e, "Cannot stamp medication sync time");
        }

        tracing::info!(
            patient_id = %patient_id,
            fetched = items.len(),
            created = result.created,
            updated = result.updated,
            failed = result.errors.len(),
            "Medication sync finished"
        );
        result
    }
}

fn synced_external_id(conn: &Connection, patient_id: &Uuid) -> Result<String, PharmacyError> {
    store::get_sync_record(conn, patient_id)?
        .and_then(|record| record.external_patient_id)
        .filter(|id| !id.trim().is_empty())
        .ok_or(PharmacyError::NotSynced(*patient_id))
}

enum Merge {
    Created,
    Updated,
}

fn merge_item(
    conn: &Connection,
    lookup: &mut MedicationLookup,
    item: &Value,
    patient_id: &Uuid,
) -> Result<Merge, PharmacyError> {
    let payload: ExternalMedicationPayload = serde_json::from_value(item.clone())
        .map_err(|e| PharmacyError::ResponseParsing(format!("bad medication entry: {e}")))?;
    let update = mapper::external_to_medication(&payload, *patient_id)?;
    let now = Utc::now();

    match lookup.find(&update) {
        Some(index) => {
            let record = update.apply_to(lookup.get(index), now);
            db::update_medication(conn, &record.id, &record)?;
            lookup.replace(index, record);
            Ok(Merge::Updated)
        }
        None => {
            let record = update.into_record(Uuid::new_v4(), now);
            db::insert_medication(conn, &record)?;
            lookup.push(record);
            Ok(Merge::Created)
        }
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn code_key(code: Option<&str>) -> Option<String> {
    code.map(normalize).filter(|c| !c.is_empty())
}

fn name_key(name: &str, strength: Option<&str>) -> String {
    format!("{}|{}", normalize(name), normalize(strength.unwrap_or_default()))
}

/// Internal medications indexed by drug code and by name + strength.
struct MedicationLookup {
    records: Vec<MedicationRecord>,
    by_code: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl MedicationLookup {
    fn new(records: Vec<MedicationRecord>) -> Self {
        let mut lookup = Self {
            records: Vec::with_capacity(records.len()),
            by_code: HashMap::new(),
            by_name: HashMap::new(),
        };
        for record in records {
            lookup.push(record);
        }
        lookup
    }

    fn push(&mut self, record: MedicationRecord) {
        let index = self.records.len();
        if let Some(code) = code_key(record.drug_code.as_deref()) {
            if self.by_code.contains_key(&code) {
                tracing::warn!(medication_id = %record.id, "Duplicate drug code among active medications");
            } else {
                self.by_code.insert(code, index);
            }
        }
        let key = name_key(&record.name, record.strength.as_deref());
        if self.by_name.contains_key(&key) {
            tracing::warn!(medication_id = %record.id, "Ambiguous name and strength among active medications");
        } else {
            self.by_name.insert(key, index);
        }
        self.records.push(record);
    }

    fn get(&self, index: usize) -> &MedicationRecord {
        &self.records[index]
    }

    /// Swap in an updated record and index any drug code or name it just
    /// gained. Old keys stay so earlier spellings still resolve.
    fn replace(&mut self, index: usize, record: MedicationRecord) {
        if let Some(code) = code_key(record.drug_code.as_deref()) {
            self.by_code.entry(code).or_insert(index);
        }
        self.by_name
            .entry(name_key(&record.name, record.strength.as_deref()))
            .or_insert(index);
        self.records[index] = record;
    }

    /// Drug code first. The name + strength fallback skips records whose
    /// own code contradicts the incoming one.
    fn find(&self, update: &MedicationUpdate) -> Option<usize> {
        let incoming = code_key(update.drug_code.as_deref());
        if let Some(index) = incoming.as_ref().and_then(|code| self.by_code.get(code)) {
            return Some(*index);
        }

        let index = *self
            .by_name
            .get(&name_key(&update.name, update.strength.as_deref()))?;
        match (incoming, code_key(self.records[index].drug_code.as_deref())) {
            (Some(a), Some(b)) if a != b => None,
            _ => Some(index),
        }
    }
}
