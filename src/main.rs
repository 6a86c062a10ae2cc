use anyhow::Result;
use axum::Router;
use bess_scheduler::control_loop::{ControlLoop, HomeFallback};
use bess_scheduler::failure_tracker::FailureTracker;
use bess_scheduler::ports::testing::{
    NullHistoricalQuery, SimulatedInverterController, SimulatedPriceSource, SimulatedSensorSource,
};
use bess_scheduler::time_grid::TimeGrid;
use bess_scheduler::{api, config, telemetry};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use telemetry::init_tracing;
use tracing::{error, info};

/// Reference composition root. Real deployments swap the simulated port adapters below for
/// concrete `InverterController`/`SensorSource`/`HistoricalReadingQuery`/`PriceSource`
/// implementations talking to actual hardware and a day-ahead price feed; the control loop
/// itself is adapter-agnostic.
#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let settings = config::Settings::load()?;
    let tz = settings.battery.timezone()?;
    let time_grid = TimeGrid::new(tz);
    let battery = settings.battery.battery_settings();
    let price_model = settings.prices.price_model();
    let home_fallback = HomeFallback {
        hourly_consumption_kwh: settings.home.sensor_fallback.hourly_consumption_kwh,
    };

    let inverter = Arc::new(SimulatedInverterController::new(
        battery.soe_kwh_to_soc(battery.min_soe_kwh()),
    ));
    let sensors = Arc::new(SimulatedSensorSource::new());
    let price_source = Arc::new(SimulatedPriceSource::new());
    let failures = Arc::new(FailureTracker::new());

    let today = Utc::now().with_timezone(&tz).date_naive();

    let control_loop = Arc::new(Mutex::new(ControlLoop::new(
        time_grid,
        battery,
        price_model,
        home_fallback,
        inverter,
        sensors,
        Arc::new(NullHistoricalQuery),
        price_source.clone(),
        failures,
        today,
    )));

    control_loop
        .lock()
        .expect("control loop mutex poisoned")
        .start()
        .await?;

    let app: Router = api::router(control_loop.clone());

    let addr: std::net::SocketAddr = "0.0.0.0:8080".parse()?;
    info!(%addr, "starting BESS optimizer");

    spawn_tick_task(control_loop);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    Ok(())
}

/// Drives `ControlLoop::tick` once per quarter-hour (spec §4.11, §5: single-threaded, one tick
/// at a time).
fn spawn_tick_task(control_loop: Arc<Mutex<ControlLoop>>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(15 * 60));
        let mut period: u32 = 0;
        loop {
            interval.tick().await;
            let periods_today = {
                let guard = control_loop.lock().expect("control loop mutex poisoned");
                guard.debug_dump().periods_today
            };
            let prepare_next_day = period >= periods_today;
            if prepare_next_day {
                period = 0;
            }
            let result = {
                let mut guard = control_loop.lock().expect("control loop mutex poisoned");
                guard.tick(period, prepare_next_day).await
            };
            match result {
                Ok(true) => period = period.wrapping_add(1),
                Ok(false) => {}
                Err(e) => error!(error = %e, "tick failed"),
            }
        }
    });
}
