use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::PatientRecord;

pub fn insert_patient(conn: &Connection, patient: &PatientRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, organization_id, first_name, last_name, date_of_birth, gender,
         phone, home_phone, email, street, city, state, postal_code, pharmacy_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            patient.id.to_string(),
            patient.organization_id.to_string(),
            patient.first_name,
            patient.last_name,
            patient.date_of_birth,
            patient.gender,
            patient.phone,
            patient.home_phone,
            patient.email,
            patient.street,
            patient.city,
            patient.state,
            patient.postal_code,
            patient.pharmacy_id.map(|id| id.to_string()),
        ],
    )?;
    Ok(())
}

/// Read-only lookup used by the pharmacy sync.
pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<PatientRecord>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, organization_id, first_name, last_name, date_of_birth, gender,
             phone, home_phone, email, street, city, state, postal_code, pharmacy_id
             FROM patients WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    PatientRecord {
                        first_name: row.get(2)?,
                        last_name: row.get(3)?,
                        date_of_birth: row.get(4)?,
                        gender: row.get(5)?,
                        phone: row.get(6)?,
                        home_phone: row.get(7)?,
                        email: row.get(8)?,
                        street: row.get(9)?,
                        city: row.get(10)?,
                        state: row.get(11)?,
                        postal_code: row.get(12)?,
                        ..PatientRecord::default()
                    },
                    row.get::<_, Option<String>>(13)?,
                ))
            },
        )
        .optional()?;

    let Some((id, organization_id, mut patient, pharmacy_id)) = row else {
        return Ok(None);
    };
    patient.id = parse_uuid(&id)?;
    patient.organization_id = parse_uuid(&organization_id)?;
    patient.pharmacy_id = pharmacy_id.and_then(|s| Uuid::parse_str(&s).ok());
    Ok(Some(patient))
}

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}
