use crate::api::response::ApiResponse;
use crate::api::AppState;
use crate::control_loop::DebugDump;
use axum::extract::State;

pub async fn dump(State(state): State<AppState>) -> ApiResponse<DebugDump> {
    let dump = state.lock().expect("control loop mutex poisoned").debug_dump();
    ApiResponse::success(dump)
}
