//! Repository layer — entity-scoped database operations.
//!
//! Patients and pharmacies are read-only to the pharmacy sync; the
//! insert functions exist for seeding and tests. Medications are
//! created and updated by the medication sync.

mod medication;
mod patient;
mod pharmacy;

pub use medication::*;
pub use patient::*;
pub use pharmacy::*;

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::db::DatabaseError;
    use crate::models::*;

    fn seed_patient(conn: &rusqlite::Connection) -> PatientRecord {
        let patient = PatientRecord {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            first_name: Some("Ada".into()),
            last_name: Some("Okafor".into()),
            date_of_birth: Some("1956-04-02".into()),
            gender: Some("F".into()),
            phone: Some("(555) 010-2000".into()),
            city: Some("Austin".into()),
            ..PatientRecord::default()
        };
        insert_patient(conn, &patient).unwrap();
        patient
    }

    fn medication(patient_id: Uuid, name: &str, status: MedicationStatus) -> MedicationRecord {
        MedicationRecord {
            id: Uuid::new_v4(),
            patient_id,
            name: name.into(),
            strength: Some("10 mg".into()),
            dosage_form: Some("tablet".into()),
            quantity: 30,
            frequency_per_day: 1,
            rx_number: Some("RX-100".into()),
            fill_date: NaiveDate::from_ymd_opt(2026, 9, 1),
            refills: Some(2),
            status,
            drug_code: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn patient_round_trip() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let loaded = get_patient(&conn, &patient.id).unwrap().unwrap();
        assert_eq!(loaded, patient);
    }

    #[test]
    fn missing_patient_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_patient(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn pharmacy_round_trip() {
        let conn = open_memory_database().unwrap();
        let pharmacy = Pharmacy {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "Main Street Rx".into(),
            is_partner: true,
        };
        insert_pharmacy(&conn, &pharmacy).unwrap();
        assert_eq!(get_pharmacy(&conn, &pharmacy.id).unwrap(), Some(pharmacy));
    }

    #[test]
    fn list_active_excludes_discontinued() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        insert_medication(&conn, &medication(patient.id, "Lisinopril", MedicationStatus::Active)).unwrap();
        insert_medication(&conn, &medication(patient.id, "Warfarin", MedicationStatus::Discontinued)).unwrap();

        let active = list_active_medications(&conn, &patient.id).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Lisinopril");
        assert_eq!(list_medications(&conn, &patient.id).unwrap().len(), 2);
    }

    #[test]
    fn update_medication_changes_status() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let mut med = medication(patient.id, "Lisinopril", MedicationStatus::Active);
        insert_medication(&conn, &med).unwrap();

        med.status = MedicationStatus::Discontinued;
        update_medication(&conn, &med.id, &med).unwrap();

        let all = list_medications(&conn, &patient.id).unwrap();
        assert_eq!(all[0].status, MedicationStatus::Discontinued);
        assert_eq!(all[0].fill_date, NaiveDate::from_ymd_opt(2026, 9, 1));
    }

    #[test]
    fn update_unknown_medication_is_not_found() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let med = medication(patient.id, "Lisinopril", MedicationStatus::Active);
        let err = update_medication(&conn, &med.id, &med).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
