use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::patient::parse_uuid;
use crate::db::DatabaseError;
use crate::models::Pharmacy;

pub fn insert_pharmacy(conn: &Connection, pharmacy: &Pharmacy) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO pharmacies (id, organization_id, name, is_partner) VALUES (?1, ?2, ?3, ?4)",
        params![
            pharmacy.id.to_string(),
            pharmacy.organization_id.to_string(),
            pharmacy.name,
            pharmacy.is_partner as i32,
        ],
    )?;
    Ok(())
}

pub fn get_pharmacy(conn: &Connection, id: &Uuid) -> Result<Option<Pharmacy>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, organization_id, name, is_partner FROM pharmacies WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, organization_id, name, is_partner)| {
        Ok(Pharmacy {
            id: parse_uuid(&id)?,
            organization_id: parse_uuid(&organization_id)?,
            name,
            is_partner: is_partner != 0,
        })
    })
    .transpose()
}
