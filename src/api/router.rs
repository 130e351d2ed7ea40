//! API router. Routes are nested under `/api/`.
//!
//! NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

pub fn api_router(core: Arc<CoreState>) -> Router {
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route(
            "/patients/:id/pharmacy-sync",
            post(endpoints::sync::sync_patient).get(endpoints::sync::status),
        )
        .route(
            "/patients/:id/pharmacy-sync/medications",
            post(endpoints::sync::sync_medications),
        )
        .route("/pharmacy/prescribers", get(endpoints::prescribers::list))
        .with_state(ApiContext::new(core));

    Router::new().nest("/api", routes)
}
