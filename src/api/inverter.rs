use crate::api::error::ApiError;
use crate::api::response::ApiResponse;
use crate::api::AppState;
use crate::ports::{InverterController, PowerReadings};
use axum::extract::State;

pub async fn status(State(state): State<AppState>) -> Result<ApiResponse<PowerReadings>, ApiError> {
    let inverter = state.lock().expect("control loop mutex poisoned").inverter_handle();
    let readings = inverter.read_power_readings().await.map_err(ApiError::from)?;
    Ok(ApiResponse::success(readings))
}
