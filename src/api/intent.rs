use crate::api::response::ApiResponse;
use crate::api::AppState;
use crate::domain::decision::StrategicIntent;
use axum::extract::State;

pub async fn strategic_intent_summary(
    State(state): State<AppState>,
) -> ApiResponse<Vec<(u32, StrategicIntent)>> {
    let summary = state
        .lock()
        .expect("control loop mutex poisoned")
        .strategic_intent_summary();
    ApiResponse::success(summary)
}
