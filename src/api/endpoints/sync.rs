//! Pharmacy sync endpoints.
//!
//! - `POST /api/patients/:id/pharmacy-sync` — push the patient
//! - `POST /api/patients/:id/pharmacy-sync/medications` — pull medications
//! - `GET  /api/patients/:id/pharmacy-sync` — current sync record
//!
//! Sync outcomes, failures included, come back as 200 with a `success`
//! flag; the sync record is the durable account of what happened. Only
//! bad input, a concurrent sync and internal faults map to error statuses.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{parse_id, ApiContext};
use crate::models::SyncRecord;
use crate::pharmacy::{store, MedicationSyncResult, MedicationSyncer, PatientSyncer, SyncResult};

#[derive(Debug, Default, Deserialize)]
pub struct SyncPatientRequest {
    pub pharmacy_id: Option<Uuid>,
}

impl SyncPatientRequest {
    /// An empty body means no pharmacy id. Anything else must be JSON
    /// that decodes cleanly, so a bad `pharmacy_id` is never dropped.
    fn from_body(headers: &HeaderMap, body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let is_json = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"));
        if !is_json {
            return Err(ApiError::BadRequest(
                "Request body must be sent as application/json".into(),
            ));
        }

        let Json(request) = Json::<Self>::from_bytes(body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid sync request: {e}")))?;
        Ok(request)
    }
}

/// `POST /api/patients/:id/pharmacy-sync`
pub async fn sync_patient(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SyncResult>, ApiError> {
    let patient_id = parse_id(&patient_id, "patient")?;
    let pharmacy_id = SyncPatientRequest::from_body(&headers, &body)?.pharmacy_id;
    let guard = ctx
        .core
        .try_begin_sync(patient_id)?
        .ok_or(ApiError::SyncInProgress)?;

    let core = ctx.core.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        let conn = core.open_db()?;
        let syncer = PatientSyncer::new(core.pharmacy_client());
        Ok::<_, ApiError>(syncer.sync_patient(&conn, &patient_id, pharmacy_id.as_ref()))
    })
    .await??;

    Ok(Json(result))
}

/// `POST /api/patients/:id/pharmacy-sync/medications`
pub async fn sync_medications(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<MedicationSyncResult>, ApiError> {
    let patient_id = parse_id(&patient_id, "patient")?;
    let guard = ctx
        .core
        .try_begin_sync(patient_id)?
        .ok_or(ApiError::SyncInProgress)?;

    let core = ctx.core.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        let conn = core.open_db()?;
        let syncer = MedicationSyncer::new(core.pharmacy_client());
        Ok::<_, ApiError>(syncer.sync_medications_from_external(&conn, &patient_id))
    })
    .await??;

    Ok(Json(result))
}

/// `GET /api/patients/:id/pharmacy-sync`
pub async fn status(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<String>,
) -> Result<Json<SyncRecord>, ApiError> {
    let patient_id = parse_id(&patient_id, "patient")?;
    let core = ctx.core.clone();
    let record = tokio::task::spawn_blocking(move || {
        let conn = core.open_db()?;
        Ok::<_, ApiError>(store::get_sync_record(&conn, &patient_id)?)
    })
    .await??;

    record
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Patient has no pharmacy sync record".into()))
}
