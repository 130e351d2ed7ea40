//! Typed endpoints of the pharmacy platform.
//!
//! The platform is inconsistent about where it puts identifiers and
//! whether lists come bare or wrapped, so both are resolved through
//! ordered lookup tables rather than per-endpoint branching.

use serde::Serialize;
use serde_json::Value;

use super::error::PharmacyError;
use super::mapper::ExternalPatientPayload;
use super::retry::RetryPolicy;
use super::transport::{HttpTransport, Method, PharmacyTransport};
use crate::config::PharmacyConfig;

pub const PATH_CREATE_PATIENT: &str = "patients";
pub const PATH_LIST_PATIENTS: &str = "patient/getall";
pub const PATH_LIST_PRESCRIBERS: &str = "doctor/GetAll";
pub const PATH_LIST_PRESCRIPTIONS: &str = "prescription/getall";

/// Where a created patient's id may appear, tried in order.
pub const PATIENT_ID_PATHS: &[&[&str]] = &[
    &["id"],
    &["patient_id"],
    &["patientId"],
    &["data", "id"],
];

/// Where a group/tenant id may appear, tried in order.
pub const GROUP_ID_PATHS: &[&[&str]] = &[
    &["group_id"],
    &["groupId"],
    &["data", "group_id"],
];

/// Keys under which list endpoints may wrap their array.
const LIST_WRAPPER_KEYS: &[&str] = &["results", "data"];

/// Read a string-or-number at `path`. Blank strings count as absent.
pub fn value_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    match current {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First hit across `paths`, in order.
pub fn extract_first(value: &Value, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| value_at(value, path))
}

pub fn extract_patient_id(response: &Value) -> Option<String> {
    extract_first(response, PATIENT_ID_PATHS)
}

/// Accept a bare array, an object wrapping one, or nothing at all.
pub fn unwrap_list(value: Value) -> Result<Vec<Value>, PharmacyError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        Value::Object(mut map) => LIST_WRAPPER_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| PharmacyError::ResponseParsing("expected a list of records".into())),
        other => Err(PharmacyError::ResponseParsing(format!(
            "expected a list of records, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prescriber {
    pub id: String,
    pub name: String,
}

impl Prescriber {
    fn from_value(value: &Value) -> Option<Self> {
        let id = extract_first(value, &[&["id"], &["doctor_id"], &["doctorId"]])?;
        let name = match value_at(value, &["name"]) {
            Some(name) => name,
            None => [
                value_at(value, &["first_name"]),
                value_at(value, &["last_name"]),
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" "),
        };
        Some(Self { id, name })
    }
}

/// Pharmacy platform client: transport + retry policy + tenant defaults.
pub struct PharmacyClient {
    transport: Box<dyn PharmacyTransport>,
    retry: RetryPolicy,
    group_id: Option<String>,
    default_prescriber_id: Option<String>,
}

impl PharmacyClient {
    pub fn new(transport: Box<dyn PharmacyTransport>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            retry,
            group_id: None,
            default_prescriber_id: None,
        }
    }

    /// HTTP client configured from settings.
    pub fn from_config(config: &PharmacyConfig) -> Result<Self, PharmacyError> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(Box::new(transport), RetryPolicy::from_config(config))
            .with_group_id(config.group_id.clone())
            .with_default_prescriber(config.default_prescriber_id.clone()))
    }

    pub fn with_group_id(mut self, group_id: Option<String>) -> Self {
        self.group_id = group_id;
        self
    }

    pub fn with_default_prescriber(mut self, prescriber_id: Option<String>) -> Self {
        self.default_prescriber_id = prescriber_id;
        self
    }

    fn call(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value, PharmacyError> {
        self.retry
            .run(operation, || self.transport.send(method, path, query, body))
    }

    /// `POST /patients`. Returns the raw response body for id resolution.
    pub fn create_patient(&self, payload: &ExternalPatientPayload) -> Result<Value, PharmacyError> {
        let body = serde_json::to_value(payload)
            .map_err(|e| PharmacyError::Validation(format!("Cannot encode patient payload: {e}")))?;
        self.call("create_patient", Method::Post, PATH_CREATE_PATIENT, &[], Some(&body))
    }

    /// `GET /patient/getall`.
    pub fn list_patients(&self) -> Result<Vec<Value>, PharmacyError> {
        unwrap_list(self.call("list_patients", Method::Get, PATH_LIST_PATIENTS, &[], None)?)
    }

    /// `GET /doctor/GetAll`. Entries without an id are dropped.
    pub fn list_prescribers(&self) -> Result<Vec<Prescriber>, PharmacyError> {
        let items = unwrap_list(self.call(
            "list_prescribers",
            Method::Get,
            PATH_LIST_PRESCRIBERS,
            &[],
            None,
        )?)?;
        Ok(items.iter().filter_map(Prescriber::from_value).collect())
    }

    /// Configured prescriber, else the first one in `listed`.
    pub fn default_prescriber_id(&self, listed: &[Prescriber]) -> Option<String> {
        self.default_prescriber_id
            .clone()
            .or_else(|| listed.first().map(|p| p.id.clone()))
    }

    /// `GET /prescription/getall?patientId=<id>`. Items are returned raw so
    /// a single malformed entry can be reported without failing the list.
    pub fn list_medications(&self, external_patient_id: &str) -> Result<Vec<Value>, PharmacyError> {
        unwrap_list(self.call(
            "list_medications",
            Method::Get,
            PATH_LIST_PRESCRIPTIONS,
            &[("patientId", external_patient_id)],
            None,
        )?)
    }

    /// Group id from a create response, else the configured one.
    pub fn resolve_group_id(&self, response: &Value) -> Option<String> {
        extract_first(response, GROUP_ID_PATHS).or_else(|| self.group_id.clone())
    }
}
