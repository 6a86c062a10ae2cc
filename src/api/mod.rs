pub mod debug;
pub mod error;
pub mod failures;
pub mod intent;
pub mod inverter;
pub mod response;
pub mod schedule;
pub mod snapshot;

use crate::control_loop::ControlLoop;
use axum::{routing::get, Router};
use std::sync::{Arc, Mutex};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared handle to the single control loop instance (spec §5: one `ControlLoop`, shared
/// read-only with the HTTP layer behind a mutex).
pub type AppState = Arc<Mutex<ControlLoop>>;

/// Thin read-only API (spec §6). No business logic lives here; every handler forwards straight
/// into a `ControlLoop` read accessor.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/daily-view", get(schedule::daily_view))
        .route("/api/v1/tou", get(schedule::current_tou))
        .route("/api/v1/inverter/status", get(inverter::status))
        .route("/api/v1/intents", get(intent::strategic_intent_summary))
        .route("/api/v1/snapshot/comparison", get(snapshot::comparison))
        .route("/api/v1/failures", get(failures::list))
        .route("/api/v1/debug", get(debug::dump))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
