//! HTTP API over the pharmacy sync.
//!
//! The router is composable: `api_router()` returns a `Router` that can
//! be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{serve_until_interrupted, start_api_server, ApiServer};
pub use types::ApiContext;
