//! Schema mapping between internal records and the pharmacy platform's
//! wire format. Everything here is pure: no I/O, no clock, no logging.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::error::PharmacyError;
use crate::models::{MedicationStatus, MedicationUpdate, PatientRecord, PatientUpdate};

pub const DELIVERY_METHOD: &str = "pickup";
pub const NOTIFY_METHOD: &str = "text";
pub const RACE_UNSPECIFIED: &str = "unknown";
pub const ADDRESS_TYPE: &str = "home";
pub const DEFAULT_GENDER: &str = "M";
pub const DEFAULT_QUANTITY: i64 = 30;
pub const DEFAULT_FREQUENCY: i64 = 1;

// ═══════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════

/// Body of `POST /patients`; also how patient entries are read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalPatientPayload {
    pub patient: ExternalPatient,
    #[serde(default)]
    pub phone_numbers: Vec<ExternalPhone>,
    #[serde(default)]
    pub addresses: Vec<ExternalAddress>,
    #[serde(default)]
    pub allergies: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalPatient {
    #[serde(default, deserialize_with = "lenient_string_required", alias = "firstName")]
    pub first_name: String,
    #[serde(default, deserialize_with = "lenient_string_required", alias = "lastName")]
    pub last_name: String,
    #[serde(default, deserialize_with = "lenient_string_required", alias = "date_of_birth", alias = "dateOfBirth")]
    pub dob: String,
    #[serde(default, deserialize_with = "lenient_string_required")]
    pub gender: String,
    #[serde(default, deserialize_with = "lenient_string_required")]
    pub delivery_method: String,
    #[serde(default, deserialize_with = "lenient_string_required")]
    pub notify_method: String,
    #[serde(default, deserialize_with = "lenient_string_required")]
    pub race: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhoneType {
    Cell,
    Home,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPhone {
    pub phone_type: PhoneType,
    #[serde(deserialize_with = "lenient_string_required")]
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    #[serde(deserialize_with = "lenient_string_required")]
    pub zip: String,
    #[serde(rename = "type_", default)]
    pub address_type: String,
}

/// One medication as listed by the platform for a patient.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExternalMedicationPayload {
    #[serde(default, alias = "patientId", deserialize_with = "lenient_string")]
    pub patient_id: Option<String>,
    #[serde(default, alias = "drug_name", alias = "drugName", alias = "medication_name")]
    pub name: String,
    #[serde(default, alias = "drugCode", alias = "ndc", deserialize_with = "lenient_string")]
    pub drug_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub strength: Option<String>,
    #[serde(default, alias = "dosage_form", alias = "form")]
    pub format: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub quantity: Option<i64>,
    #[serde(default, alias = "frequency_per_day", deserialize_with = "lenient_i64")]
    pub frequency: Option<i64>,
    #[serde(default, alias = "rxNumber", alias = "prescription_number", deserialize_with = "lenient_string")]
    pub rx_number: Option<String>,
    #[serde(default, alias = "fillDate", alias = "last_fill_date")]
    pub fill_date: Option<String>,
    #[serde(default, alias = "refills_remaining", deserialize_with = "lenient_i64")]
    pub refills: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Accept strings or numbers; blank strings become `None`.
fn lenient_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(de)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_string_required<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(lenient_string(de)?.unwrap_or_default())
}

/// Accept integers, floats or numeric strings.
fn lenient_i64<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
    Ok(match Option::<Value>::deserialize(de)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    })
}

// ═══════════════════════════════════════════════════════════
// Field helpers
// ═══════════════════════════════════════════════════════════

/// Parse a date of birth or fill date. Accepts `YYYY-MM-DD` and
/// timestamps that start with one.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// `M` or `F`; anything else (or nothing) becomes the default.
pub fn normalize_gender(raw: Option<&str>) -> &'static str {
    match raw.map(|g| g.trim().to_ascii_uppercase()).as_deref() {
        Some("F") => "F",
        Some("M") => "M",
        _ => DEFAULT_GENDER,
    }
}

pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ═══════════════════════════════════════════════════════════
// Mappings
// ═══════════════════════════════════════════════════════════

pub fn patient_to_external(patient: &PatientRecord) -> ExternalPatientPayload {
    let dob = match present(&patient.date_of_birth) {
        Some(raw) => parse_date(raw)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| raw.to_string()),
        None => String::new(),
    };

    let phone_numbers = [
        (PhoneType::Cell, &patient.phone),
        (PhoneType::Home, &patient.home_phone),
    ]
    .into_iter()
    .filter_map(|(phone_type, raw)| {
        let number = digits_only(raw.as_deref()?);
        (!number.is_empty()).then_some(ExternalPhone { phone_type, number })
    })
    .collect();

    let address = (|| {
        Some(ExternalAddress {
            street: present(&patient.street)?.to_string(),
            city: present(&patient.city)?.to_string(),
            state: present(&patient.state)?.to_string(),
            zip: present(&patient.postal_code)?.to_string(),
            address_type: ADDRESS_TYPE.to_string(),
        })
    })();

    ExternalPatientPayload {
        patient: ExternalPatient {
            first_name: present(&patient.first_name).unwrap_or_default().to_string(),
            last_name: present(&patient.last_name).unwrap_or_default().to_string(),
            dob,
            gender: normalize_gender(patient.gender.as_deref()).to_string(),
            delivery_method: DELIVERY_METHOD.to_string(),
            notify_method: NOTIFY_METHOD.to_string(),
            race: RACE_UNSPECIFIED.to_string(),
        },
        phone_numbers,
        addresses: address.into_iter().collect(),
        allergies: Vec::new(),
    }
}

/// Recover the internal fields an external patient carries. Lossy.
pub fn external_to_patient(external: &ExternalPatientPayload) -> PatientUpdate {
    let first_phone = |wanted: PhoneType| {
        external
            .phone_numbers
            .iter()
            .find(|p| p.phone_type == wanted)
            .and_then(|p| non_empty(&digits_only(&p.number)))
    };
    let address = external.addresses.first();

    let gender = match external.patient.gender.trim().to_ascii_uppercase().as_str() {
        g @ ("M" | "F") => Some(g.to_string()),
        _ => None,
    };

    PatientUpdate {
        first_name: non_empty(&external.patient.first_name),
        last_name: non_empty(&external.patient.last_name),
        date_of_birth: parse_date(&external.patient.dob).map(|d| d.format("%Y-%m-%d").to_string()),
        gender,
        phone: first_phone(PhoneType::Cell),
        home_phone: first_phone(PhoneType::Home),
        street: address.and_then(|a| non_empty(&a.street)),
        city: address.and_then(|a| non_empty(&a.city)),
        state: address.and_then(|a| non_empty(&a.state)),
        postal_code: address.and_then(|a| non_empty(&a.zip)),
    }
}

/// Read one entry of `GET /patient/getall`. Entries come either in the
/// create shape (`{patient: {...}, phone_numbers: [...]}`) or flat with a
/// single phone field.
pub fn read_patient_entry(entry: &Value) -> Option<ExternalPatientPayload> {
    if entry.get("patient").is_some_and(Value::is_object) {
        return serde_json::from_value(entry.clone()).ok();
    }

    let patient: ExternalPatient = serde_json::from_value(entry.clone()).ok()?;
    let phone_numbers = match entry.get("phone_numbers") {
        Some(list) => serde_json::from_value(list.clone()).unwrap_or_default(),
        None => ["phone", "phone_number", "cell_phone"]
            .iter()
            .find_map(|key| match entry.get(*key) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .map(|number| ExternalPhone {
                phone_type: PhoneType::Cell,
                number,
            })
            .into_iter()
            .collect(),
    };

    Some(ExternalPatientPayload {
        patient,
        phone_numbers,
        addresses: Vec::new(),
        allergies: Vec::new(),
    })
}

/// `active` and `filled` stay active; anything else, a missing status
/// included, is discontinued.
pub fn map_medication_status(raw: Option<&str>) -> MedicationStatus {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("active" | "filled") => MedicationStatus::Active,
        _ => MedicationStatus::Discontinued,
    }
}

pub fn external_to_medication(
    external: &ExternalMedicationPayload,
    patient_id: Uuid,
) -> Result<MedicationUpdate, PharmacyError> {
    let name = non_empty(&external.name)
        .ok_or_else(|| PharmacyError::Validation("medication has no name".into()))?;

    Ok(MedicationUpdate {
        patient_id,
        name,
        strength: external.strength.clone(),
        dosage_form: external.format.as_deref().and_then(non_empty),
        quantity: external.quantity.filter(|q| *q > 0).unwrap_or(DEFAULT_QUANTITY),
        frequency_per_day: external.frequency.filter(|f| *f > 0).unwrap_or(DEFAULT_FREQUENCY),
        rx_number: external.rx_number.clone(),
        fill_date: external.fill_date.as_deref().and_then(parse_date),
        refills: external.refills,
        status: map_medication_status(external.status.as_deref()),
        drug_code: external.drug_code.clone(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn full_patient() -> PatientRecord {
        PatientRecord {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            first_name: Some("Ada".into()),
            last_name: Some("Okafor".into()),
            date_of_birth: Some("1956-04-02".into()),
            gender: Some("f".into()),
            phone: Some("(555) 010-2000".into()),
            home_phone: Some("555.010.3000".into()),
            email: Some("ada@example.org".into()),
            street: Some("12 Elm St".into()),
            city: Some("Austin".into()),
            state: Some("TX".into()),
            postal_code: Some("78701".into()),
            pharmacy_id: None,
        }
    }

    #[test]
    fn patient_maps_to_wire_shape() {
        let payload = patient_to_external(&full_patient());
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["patient"]["first_name"], "Ada");
        assert_eq!(json["patient"]["dob"], "1956-04-02");
        assert_eq!(json["patient"]["gender"], "F");
        assert_eq!(json["patient"]["delivery_method"], DELIVERY_METHOD);
        assert_eq!(json["phone_numbers"][0], json!({"phone_type": "cell", "number": "5550102000"}));
        assert_eq!(json["phone_numbers"][1], json!({"phone_type": "home", "number": "5550103000"}));
        assert_eq!(json["addresses"][0]["type_"], "home");
        assert_eq!(json["addresses"][0]["zip"], "78701");
        assert_eq!(json["allergies"], json!([]));
    }

    #[test]
    fn phone_without_digits_is_omitted() {
        let patient = PatientRecord {
            phone: Some("n/a".into()),
            home_phone: Some("   ".into()),
            ..full_patient()
        };
        assert!(patient_to_external(&patient).phone_numbers.is_empty());
    }

    #[test]
    fn address_requires_all_four_fields() {
        for strip in 0..4 {
            let mut patient = full_patient();
            match strip {
                0 => patient.street = None,
                1 => patient.city = Some("  ".into()),
                2 => patient.state = None,
                _ => patient.postal_code = None,
            }
            assert!(patient_to_external(&patient).addresses.is_empty(), "case {strip}");
        }
    }

    #[test]
    fn gender_defaults_to_m() {
        for raw in [None, Some(""), Some("X"), Some("male"), Some("female"), Some("unknown")] {
            assert_eq!(normalize_gender(raw), "M", "{raw:?}");
        }
        assert_eq!(normalize_gender(Some("F")), "F");
        assert_eq!(normalize_gender(Some("f")), "F");
        assert_eq!(normalize_gender(Some("m")), "M");
    }

    #[test]
    fn dob_timestamp_is_truncated_to_date() {
        let patient = PatientRecord {
            date_of_birth: Some("1956-04-02T00:00:00Z".into()),
            ..full_patient()
        };
        assert_eq!(patient_to_external(&patient).patient.dob, "1956-04-02");
    }

    #[test]
    fn parse_date_rejects_impossible_dates() {
        assert!(parse_date("1990-02-30").is_none());
        assert!(parse_date("04/02/1956").is_none());
        assert!(parse_date("").is_none());
        assert_eq!(parse_date("2001-12-31"), NaiveDate::from_ymd_opt(2001, 12, 31));
    }

    #[test]
    fn external_patient_maps_back() {
        let payload = patient_to_external(&full_patient());
        let update = external_to_patient(&payload);
        assert_eq!(update.first_name.as_deref(), Some("Ada"));
        assert_eq!(update.gender.as_deref(), Some("F"));
        assert_eq!(update.phone.as_deref(), Some("5550102000"));
        assert_eq!(update.home_phone.as_deref(), Some("5550103000"));
        assert_eq!(update.postal_code.as_deref(), Some("78701"));
    }

    #[test]
    fn external_patient_reads_camel_case_and_numeric_phone() {
        let payload: ExternalPatientPayload = serde_json::from_value(json!({
            "patient": {"firstName": "Ada", "lastName": "Okafor", "dateOfBirth": "1956-04-02", "gender": "x"},
            "phone_numbers": [{"phone_type": "mobile", "number": 5550102000u64}]
        }))
        .unwrap();
        let update = external_to_patient(&payload);
        assert_eq!(update.last_name.as_deref(), Some("Okafor"));
        assert!(update.gender.is_none());
        assert!(update.phone.is_none(), "unknown phone type is not a cell");
        assert_eq!(payload.phone_numbers[0].phone_type, PhoneType::Other);
        assert_eq!(payload.phone_numbers[0].number, "5550102000");
    }

    #[test]
    fn patient_entry_nested_and_flat() {
        let nested = read_patient_entry(&json!({
            "id": 1,
            "patient": {"first_name": "Ada", "last_name": "Okafor"},
            "phone_numbers": [{"phone_type": "cell", "number": "5550102000"}]
        }))
        .unwrap();
        assert_eq!(nested.patient.first_name, "Ada");
        assert_eq!(nested.phone_numbers.len(), 1);

        let flat = read_patient_entry(&json!({
            "id": 2, "firstName": "Ada", "lastName": "Okafor", "phone": "555-010-2000"
        }))
        .unwrap();
        assert_eq!(flat.patient.last_name, "Okafor");
        assert_eq!(external_to_patient(&flat).phone.as_deref(), Some("5550102000"));

        let with_nulls = read_patient_entry(&json!({
            "id": 3, "first_name": "Ada", "last_name": "Okafor", "gender": null, "dob": null
        }))
        .unwrap();
        assert_eq!(with_nulls.patient.gender, "");

        assert!(read_patient_entry(&json!("not a record")).is_none());
    }

    #[test]
    fn medication_defaults_quantity_and_frequency() {
        let external: ExternalMedicationPayload =
            serde_json::from_value(json!({"name": "Atorvastatin", "strength": "20 mg"})).unwrap();
        let patient_id = Uuid::new_v4();
        let med = external_to_medication(&external, patient_id).unwrap();
        assert_eq!(med.patient_id, patient_id);
        assert_eq!(med.quantity, 30);
        assert_eq!(med.frequency_per_day, 1);
        assert_eq!(med.status, MedicationStatus::Discontinued);
    }

    #[test]
    fn medication_status_mapping() {
        assert_eq!(map_medication_status(Some("filled")), MedicationStatus::Active);
        assert_eq!(map_medication_status(Some("Active")), MedicationStatus::Active);
        for other in ["cancelled", "on_hold", "", "expired"] {
            assert_eq!(map_medication_status(Some(other)), MedicationStatus::Discontinued);
        }
        assert_eq!(map_medication_status(None), MedicationStatus::Discontinued);
    }

    #[test]
    fn medication_accepts_aliases_and_string_numbers() {
        let external: ExternalMedicationPayload = serde_json::from_value(json!({
            "drugName": "Metformin",
            "ndc": 93104801,
            "quantity": "60",
            "frequency_per_day": 2,
            "rxNumber": 778812,
            "fillDate": "2026-09-14T10:00:00",
            "status": "filled"
        }))
        .unwrap();
        let med = external_to_medication(&external, Uuid::new_v4()).unwrap();
        assert_eq!(med.name, "Metformin");
        assert_eq!(med.drug_code.as_deref(), Some("93104801"));
        assert_eq!(med.quantity, 60);
        assert_eq!(med.frequency_per_day, 2);
        assert_eq!(med.rx_number.as_deref(), Some("778812"));
        assert_eq!(med.fill_date, NaiveDate::from_ymd_opt(2026, 9, 14));
    }

    #[test]
    fn medication_without_name_is_rejected() {
        let external = ExternalMedicationPayload::default();
        let err = external_to_medication(&external, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, PharmacyError::Validation(_)));
    }
}
