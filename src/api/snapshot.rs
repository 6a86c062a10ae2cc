use crate::api::response::ApiResponse;
use crate::api::AppState;
use crate::store::DeviationReport;
use axum::extract::State;

pub async fn comparison(State(state): State<AppState>) -> ApiResponse<Option<DeviationReport>> {
    let report = state
        .lock()
        .expect("control loop mutex poisoned")
        .snapshot_comparison();
    ApiResponse::success(report)
}
