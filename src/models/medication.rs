use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::MedicationStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub name: String,
    pub strength: Option<String>,
    pub dosage_form: Option<String>,
    pub quantity: i64,
    pub frequency_per_day: i64,
    pub rx_number: Option<String>,
    pub fill_date: Option<NaiveDate>,
    pub refills: Option<i64>,
    pub status: MedicationStatus,
    /// Stable product identifier on the pharmacy platform.
    pub drug_code: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Medication fields mapped from the pharmacy platform, ready to be
/// inserted as a new record or applied to an existing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationUpdate {
    pub patient_id: Uuid,
    pub name: String,
    pub strength: Option<String>,
    pub dosage_form: Option<String>,
    pub quantity: i64,
    pub frequency_per_day: i64,
    pub rx_number: Option<String>,
    pub fill_date: Option<NaiveDate>,
    pub refills: Option<i64>,
    pub status: MedicationStatus,
    pub drug_code: Option<String>,
}

impl MedicationUpdate {
    /// Materialize as a new internal record.
    pub fn into_record(self, id: Uuid, now: DateTime<Utc>) -> MedicationRecord {
        MedicationRecord {
            id,
            patient_id: self.patient_id,
            name: self.name,
            strength: self.strength,
            dosage_form: self.dosage_form,
            quantity: self.quantity,
            frequency_per_day: self.frequency_per_day,
            rx_number: self.rx_number,
            fill_date: self.fill_date,
            refills: self.refills,
            status: self.status,
            drug_code: self.drug_code,
            updated_at: now,
        }
    }

    /// Overlay onto an existing record. Internal values survive where the
    /// platform sent nothing.
    pub fn apply_to(self, existing: &MedicationRecord, now: DateTime<Utc>) -> MedicationRecord {
        MedicationRecord {
            id: existing.id,
            patient_id: existing.patient_id,
            name: self.name,
            strength: self.strength.or_else(|| existing.strength.clone()),
            dosage_form: self.dosage_form.or_else(|| existing.dosage_form.clone()),
            quantity: self.quantity,
            frequency_per_day: self.frequency_per_day,
            rx_number: self.rx_number.or_else(|| existing.rx_number.clone()),
            fill_date: self.fill_date.or(existing.fill_date),
            refills: self.refills.or(existing.refills),
            status: self.status,
            drug_code: self.drug_code.or_else(|| existing.drug_code.clone()),
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update() -> MedicationUpdate {
        MedicationUpdate {
            patient_id: Uuid::new_v4(),
            name: "Metformin".into(),
            strength: None,
            dosage_form: Some("tablet".into()),
            quantity: 60,
            frequency_per_day: 2,
            rx_number: None,
            fill_date: None,
            refills: Some(3),
            status: MedicationStatus::Active,
            drug_code: Some("00093-1048".into()),
        }
    }

    #[test]
    fn apply_to_keeps_internal_values_when_platform_sent_none() {
        let now = Utc::now();
        let existing = MedicationRecord {
            strength: Some("500 mg".into()),
            rx_number: Some("RX-1".into()),
            ..update().into_record(Uuid::new_v4(), now)
        };

        let merged = update().apply_to(&existing, now);
        assert_eq!(merged.id, existing.id);
        assert_eq!(merged.patient_id, existing.patient_id);
        assert_eq!(merged.strength.as_deref(), Some("500 mg"));
        assert_eq!(merged.rx_number.as_deref(), Some("RX-1"));
        assert_eq!(merged.quantity, 60);
        assert_eq!(merged.refills, Some(3));
    }
}
