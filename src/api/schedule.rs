use crate::api::response::ApiResponse;
use crate::api::AppState;
use axum::extract::State;

pub async fn daily_view(State(state): State<AppState>) -> ApiResponse<crate::daily_view::DailyView> {
    let view = state.lock().expect("control loop mutex poisoned").daily_view();
    ApiResponse::success(view)
}

pub async fn current_tou(
    State(state): State<AppState>,
) -> ApiResponse<Vec<crate::tou::TouSegment>> {
    let tou = state
        .lock()
        .expect("control loop mutex poisoned")
        .current_tou()
        .to_vec();
    ApiResponse::success(tou)
}
