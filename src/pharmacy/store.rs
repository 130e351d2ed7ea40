//! Sync State Store — one `pharmacy_sync` row per patient.
//!
//! Writes are keyed upserts on `patient_id`; concurrent syncs of the same
//! patient resolve as last-write-wins. Rows are never deleted here.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{SyncRecord, SyncStatus};

pub fn upsert_sync_record(conn: &Connection, record: &SyncRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO pharmacy_sync (patient_id, external_patient_id, external_group_id,
         last_sync_status, last_synced_at, last_error, last_medication_sync_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(patient_id) DO UPDATE SET
            external_patient_id = excluded.external_patient_id,
            external_group_id = excluded.external_group_id,
            last_sync_status = excluded.last_sync_status,
            last_synced_at = excluded.last_synced_at,
            last_error = excluded.last_error,
            last_medication_sync_at = excluded.last_medication_sync_at",
        params![
            record.patient_id.to_string(),
            record.external_patient_id,
            record.external_group_id,
            record.last_sync_status.as_str(),
            record.last_synced_at.to_rfc3339(),
            record.last_error,
            record.last_medication_sync_at.map(|t| t.to_rfc3339()),
        ],
    )?;
    Ok(())
}

pub fn get_sync_record(conn: &Connection, patient_id: &Uuid) -> Result<Option<SyncRecord>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT external_patient_id, external_group_id, last_sync_status, last_synced_at,
             last_error, last_medication_sync_at
             FROM pharmacy_sync WHERE patient_id = ?1",
            params![patient_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((external_patient_id, external_group_id, status, synced_at, last_error, med_sync_at)) = row
    else {
        return Ok(None);
    };

    Ok(Some(SyncRecord {
        patient_id: *patient_id,
        external_patient_id,
        external_group_id,
        last_sync_status: SyncStatus::from_str(&status)?,
        last_synced_at: parse_timestamp(&synced_at)?,
        last_error,
        last_medication_sync_at: med_sync_at.as_deref().map(parse_timestamp).transpose()?,
    }))
}

/// Stamp the last medication sync without touching the patient sync fields.
pub fn touch_medication_sync(
    conn: &Connection,
    patient_id: &Uuid,
    at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE pharmacy_sync SET last_medication_sync_at = ?2 WHERE patient_id = ?1",
        params![patient_id.to_string(), at.to_rfc3339()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "SyncRecord".into(),
            id: patient_id.to_string(),
        });
    }
    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad timestamp {raw}: {e}")))
}
