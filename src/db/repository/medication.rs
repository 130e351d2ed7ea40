use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::patient::parse_uuid;
use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_medication(conn: &Connection, med: &MedicationRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medications (id, patient_id, name, strength, dosage_form, quantity,
         frequency_per_day, rx_number, fill_date, refills, status, drug_code, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            med.id.to_string(),
            med.patient_id.to_string(),
            med.name,
            med.strength,
            med.dosage_form,
            med.quantity,
            med.frequency_per_day,
            med.rx_number,
            med.fill_date.map(|d| d.to_string()),
            med.refills,
            med.status.as_str(),
            med.drug_code,
            med.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn update_medication(
    conn: &Connection,
    id: &Uuid,
    med: &MedicationRecord,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE medications SET name = ?2, strength = ?3, dosage_form = ?4, quantity = ?5,
         frequency_per_day = ?6, rx_number = ?7, fill_date = ?8, refills = ?9, status = ?10,
         drug_code = ?11, updated_at = ?12
         WHERE id = ?1",
        params![
            id.to_string(),
            med.name,
            med.strength,
            med.dosage_form,
            med.quantity,
            med.frequency_per_day,
            med.rx_number,
            med.fill_date.map(|d| d.to_string()),
            med.refills,
            med.status.as_str(),
            med.drug_code,
            med.updated_at.to_rfc3339(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Medication".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn list_active_medications(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<MedicationRecord>, DatabaseError> {
    list_medications_where(conn, patient_id, "AND status = 'active'")
}

/// All medications for a patient regardless of status.
pub fn list_medications(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<MedicationRecord>, DatabaseError> {
    list_medications_where(conn, patient_id, "")
}

fn list_medications_where(
    conn: &Connection,
    patient_id: &Uuid,
    status_clause: &str,
) -> Result<Vec<MedicationRecord>, DatabaseError> {
    let sql = format!(
        "SELECT id, patient_id, name, strength, dosage_form, quantity, frequency_per_day,
         rx_number, fill_date, refills, status, drug_code, updated_at
         FROM medications WHERE patient_id = ?1 {status_clause} ORDER BY name, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient_id.to_string()], medication_row_from_rusqlite)?;

    let mut meds = Vec::new();
    for row in rows {
        meds.push(medication_from_row(row?)?);
    }
    Ok(meds)
}

// Internal row type for MedicationRecord mapping
struct MedicationRow {
    id: String,
    patient_id: String,
    name: String,
    strength: Option<String>,
    dosage_form: Option<String>,
    quantity: i64,
    frequency_per_day: i64,
    rx_number: Option<String>,
    fill_date: Option<String>,
    refills: Option<i64>,
    status: String,
    drug_code: Option<String>,
    updated_at: String,
}

fn medication_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<MedicationRow, rusqlite::Error> {
    Ok(MedicationRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        name: row.get(2)?,
        strength: row.get(3)?,
        dosage_form: row.get(4)?,
        quantity: row.get(5)?,
        frequency_per_day: row.get(6)?,
        rx_number: row.get(7)?,
        fill_date: row.get(8)?,
        refills: row.get(9)?,
        status: row.get(10)?,
        drug_code: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn medication_from_row(row: MedicationRow) -> Result<MedicationRecord, DatabaseError> {
    Ok(MedicationRecord {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        name: row.name,
        strength: row.strength,
        dosage_form: row.dosage_form,
        quantity: row.quantity,
        frequency_per_day: row.frequency_per_day,
        rx_number: row.rx_number,
        fill_date: row.fill_date.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        refills: row.refills,
        status: MedicationStatus::from_str(&row.status)?,
        drug_code: row.drug_code,
        updated_at: DateTime::parse_from_rfc3339(&row.updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
    })
}
