//! `GET /api/pharmacy/prescribers` — prescribers known to the platform.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pharmacy::Prescriber;

#[derive(Serialize)]
pub struct PrescribersResponse {
    pub prescribers: Vec<Prescriber>,
    pub default_prescriber_id: Option<String>,
}

pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<PrescribersResponse>, ApiError> {
    let core = ctx.core.clone();
    let response = tokio::task::spawn_blocking(move || {
        let client = core.pharmacy_client();
        let prescribers = client.list_prescribers()?;
        Ok::<_, ApiError>(PrescribersResponse {
            default_prescriber_id: client.default_prescriber_id(&prescribers),
            prescribers,
        })
    })
    .await??;

    Ok(Json(response))
}
