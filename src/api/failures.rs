use crate::api::response::ApiResponse;
use crate::api::AppState;
use crate::failure_tracker::FailureEntry;
use axum::extract::State;

pub async fn list(State(state): State<AppState>) -> ApiResponse<Vec<FailureEntry>> {
    let failures = state.lock().expect("control loop mutex poisoned").failures();
    ApiResponse::success(failures.list())
}
