#![allow(dead_code)]
//! The top-level per-period state machine (spec §4.11).

use crate::daily_view::{build_daily_view, DailyView};
use crate::domain::battery_settings::BatterySettings;
use crate::domain::decision::{DataSource, DecisionRecord, PeriodData, StrategicIntent};
use crate::domain::economic::EconomicRecord;
use crate::domain::energy::EnergyRecord;
use crate::domain::price::PriceModel;
use crate::error::{CoreError, CoreResult};
use crate::failure_tracker::FailureTracker;
use crate::intent;
use crate::optimizer::{self, DpInput};
use crate::ports::{HistoricalReadingQuery, InverterController, PowerReadings, PriceSource, SensorChannel, SensorSource};
use crate::store::historical::HistoricalReadingStore;
use crate::store::schedule_store::{Scenario, ScheduleEntry, ScheduleStore};
use crate::store::snapshot_store::{analyze_deviation, DeviationReport, PredictionSnapshot, SnapshotStore};
use crate::time_grid::TimeGrid;
use crate::tou::{compile_tou, control_knobs_for_period, diff_schedule, TouSegment};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlLoopState {
    Uninitialized,
    Starting,
    Running,
    Degraded,
}

/// Fallback per-period consumption profile used only when the Sensor Source cannot supply a
/// forecast value for a future period.
#[derive(Debug, Clone)]
pub struct HomeFallback {
    pub hourly_consumption_kwh: [f64; 24],
}

pub struct ControlLoop {
    state: ControlLoopState,
    time_grid: TimeGrid,
    battery: BatterySettings,
    price_model: PriceModel,
    home_fallback: HomeFallback,

    inverter: Arc<dyn InverterController>,
    sensors: Arc<dyn SensorSource>,
    historical_query: Arc<dyn HistoricalReadingQuery>,
    price_source: Arc<dyn PriceSource>,

    historical: HistoricalReadingStore,
    schedule: ScheduleStore,
    snapshots: SnapshotStore,
    current_tou: Vec<TouSegment>,

    failures: Arc<FailureTracker>,
    corruption_detected: bool,
    degraded_components: Vec<String>,
    today: NaiveDate,
    periods_today: u32,
    first_run: bool,
    /// SoE at the end of the last period an actual `EnergyRecord` was built for (backfill or
    /// live), carried forward as the next one's `battery_soe_start`. Seeded from the inverter's
    /// reported SoC in `start()`.
    last_actual_soe: f64,
}

impl ControlLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        time_grid: TimeGrid,
        battery: BatterySettings,
        price_model: PriceModel,
        home_fallback: HomeFallback,
        inverter: Arc<dyn InverterController>,
        sensors: Arc<dyn SensorSource>,
        historical_query: Arc<dyn HistoricalReadingQuery>,
        price_source: Arc<dyn PriceSource>,
        failures: Arc<FailureTracker>,
        today: NaiveDate,
    ) -> Self {
        let periods_today = time_grid.periods_in_day(today);
        let last_actual_soe = battery.min_soe_kwh();
        Self {
            state: ControlLoopState::Uninitialized,
            time_grid,
            battery,
            price_model,
            home_fallback,
            inverter,
            sensors,
            historical_query,
            price_source,
            historical: HistoricalReadingStore::new(periods_today as usize),
            schedule: ScheduleStore::new(),
            snapshots: SnapshotStore::new(),
            current_tou: Vec::new(),
            failures,
            corruption_detected: false,
            degraded_components: Vec::new(),
            today,
            periods_today,
            first_run: true,
            last_actual_soe,
        }
    }

    pub fn state(&self) -> ControlLoopState {
        self.state
    }

    /// `Uninitialized -> Starting -> {Running, Degraded}` (spec §4.11).
    pub async fn start(&mut self) -> CoreResult<()> {
        self.state = ControlLoopState::Starting;
        self.degraded_components.clear();

        match self.inverter.get_battery_soc().await {
            Ok(soc) => self.last_actual_soe = self.battery.soc_to_soe_kwh(soc),
            Err(e) => {
                self.degraded_components.push("inverter".to_string());
                warn!(error = %e, "inverter health check failed at startup");
            }
        }

        // Config is the source of truth for min/max SoC; mismatches are logged, not fatal.
        if let Ok(current_charge_stop) = self.inverter.get_charge_stop_soc().await {
            if (current_charge_stop - self.battery.max_soe_percent).abs() > 0.5 {
                warn!(
                    inverter_value = current_charge_stop,
                    config_value = self.battery.max_soe_percent,
                    "inverter charge-stop SoC does not match configuration"
                );
            }
        }
        let _ = self.inverter.set_charge_stop_soc(self.battery.max_soe_percent).await;
        let _ = self
            .inverter
            .set_discharge_stop_soc(self.battery.min_soe_percent)
            .await;

        match self.inverter.read_inverter_time_segments().await {
            Ok(segments) => {
                if let Err(e) = crate::tou::validate_segments(&segments) {
                    self.corruption_detected = true;
                    warn!(error = %e, "inverter-reported TOU segments failed validation");
                }
                self.current_tou = segments;
            }
            Err(e) => {
                self.degraded_components.push("inverter_tou".to_string());
                warn!(error = %e, "could not read current TOU segments at startup");
            }
        }

        self.backfill_historical().await;

        self.state = if self.degraded_components.is_empty() {
            ControlLoopState::Running
        } else {
            ControlLoopState::Degraded
        };
        info!(state = ?self.state, "control loop started");
        Ok(())
    }

    async fn backfill_historical(&mut self) {
        let current_period = self
            .time_grid
            .timestamp_to_period(chrono_now_in(self.time_grid.timezone()), self.today)
            .unwrap_or(0);

        for p in 0..current_period.min(self.periods_today) {
            let channels = [
                SensorChannel::SolarProduction,
                SensorChannel::HomeConsumption,
                SensorChannel::GridImport,
                SensorChannel::GridExport,
                SensorChannel::BatteryCharge,
                SensorChannel::BatteryDischarge,
            ];
            let mut values = Vec::with_capacity(channels.len());
            let mut ok = true;
            for channel in channels {
                match self
                    .historical_query
                    .query_period_end(channel, self.today, p)
                    .await
                {
                    Ok(Some(v)) => values.push(v),
                    _ => {
                        ok = false;
                        break;
                    }
                }
            }
            if !ok {
                continue;
            }
            let (solar, load, grid_import, grid_export, charged, discharged) =
                (values[0], values[1], values[2], values[3], values[4], values[5]);
            let soe_start = self.last_actual_soe;
            let soe_end = (soe_start + charged * self.battery.efficiency_charge
                - discharged / self.battery.efficiency_discharge)
                .clamp(0.0, self.battery.capacity_kwh);
            self.last_actual_soe = soe_end;
            if let Ok(record) = EnergyRecord::new(
                solar,
                load,
                charged,
                discharged,
                grid_import,
                grid_export,
                soe_start,
                soe_end,
                self.battery.capacity_kwh,
                self.battery.efficiency_charge,
                self.battery.efficiency_discharge,
            ) {
                let _ = self.historical.record(p as usize, record);
            }
        }
    }

    /// Runs one quarter-hour tick (spec §4.11 steps 1-13). Returns `Ok(true)` if the tick
    /// completed normally, `Ok(false)` if it aborted early on missing data (not an error), and
    /// `Err` for invalid input.
    pub async fn tick(&mut self, p: u32, prepare_next_day: bool) -> CoreResult<bool> {
        if p as i64 >= self.periods_today as i64 + 1000 {
            return Err(CoreError::InvalidInput(format!("period {p} is absurdly large")));
        }

        // Step 2: midnight handling.
        if p == 0 && !prepare_next_day {
            info!(period = p, "recording today's starting SoE");
        }
        if prepare_next_day {
            self.historical.clear();
            self.schedule.clear();
            self.snapshots.clear();
            self.today = self.today.succ_opt().ok_or_else(|| {
                CoreError::InvalidInput("date overflow computing tomorrow".into())
            })?;
            self.periods_today = self.time_grid.periods_in_day(self.today);
            self.historical.resize(self.periods_today as usize);
        }

        // Step 3: fetch prices.
        let target_date = self.today;
        let prices = match self.price_source.get_prices_for_date(target_date).await {
            Ok(prices) if !prices.is_empty() => prices,
            Ok(_) => {
                warn!(period = p, "price source returned an empty list, aborting tick");
                return Ok(false);
            }
            Err(e) => {
                self.failures.record(now(&self.time_grid), "get_prices_for_date", &e);
                warn!(period = p, error = %e, "price fetch failed, aborting tick");
                return Ok(false);
            }
        };
        if prices.len() != self.periods_today as usize {
            warn!(
                expected = self.periods_today,
                got = prices.len(),
                "price list length does not match periods_in_day"
            );
        }

        // Step 4: collect actuals for the just-completed period p-1.
        if p > 0 && !self.first_run && !prepare_next_day {
            self.record_actual_period(p - 1).await;
        }

        // Step 5: read current battery SoC.
        let soc = match self.inverter.get_battery_soc().await {
            Ok(soc) => soc,
            Err(e) => {
                self.failures.record(now(&self.time_grid), "get_battery_soc", &e);
                warn!(period = p, error = %e, "could not read battery SoC, aborting tick");
                return Ok(false);
            }
        };
        let initial_soe = self.battery.soc_to_soe_kwh(soc);

        // Step 6: assemble remaining horizon.
        let start = if prepare_next_day { 0 } else { p };
        let remaining_today = self.periods_today.saturating_sub(start);
        let remaining_prices = (prices.len() as u32).saturating_sub(start);
        let horizon_len = remaining_today.min(remaining_prices);
        if horizon_len == 0 {
            warn!(period = p, "no remaining horizon to optimize, aborting tick");
            return Ok(false);
        }
        let home_consumption = self.assemble_consumption_horizon(start, horizon_len);
        let solar_production = self.assemble_solar_horizon(start, horizon_len);
        let (buy_price, sell_price) = self.price_model.derive(&prices[start as usize..(start + horizon_len) as usize]);

        // Step 7: cost basis.
        let initial_cost_basis = if prepare_next_day {
            self.battery.cycle_cost_per_kwh
        } else {
            self.recompute_cost_basis_from_actuals()
        };

        // Step 8: run the DP optimizer.
        let anchor_timestamp = self
            .time_grid
            .period_to_timestamp(start, self.today)
            .map(|dt| dt.fixed_offset())
            .unwrap_or_else(|_| now(&self.time_grid));
        let dp_input = DpInput {
            buy_price,
            sell_price,
            home_consumption,
            solar_production,
            initial_soe,
            initial_cost_basis,
            battery: self.battery,
            start_period: start,
            anchor_timestamp,
        };
        let result = optimizer::optimize(&dp_input)?;

        // Step 9: compile TOU for the full day. A day with no planned battery activity at all
        // needs no inverter schedule; compiling it would still emit a single whole-day segment,
        // which would never clear a stale/corrupt schedule already on the inverter.
        let full_day_intents = self.full_day_intents(start, &result.periods);
        let new_tou = if full_day_intents.iter().all(|i| *i == StrategicIntent::Idle) {
            Vec::new()
        } else {
            compile_tou(&full_day_intents)?
        };

        // Step 10: diff and apply if needed.
        let effective_hour = (start / 4) as u8;
        let needs_apply = self.first_run || prepare_next_day || new_tou != self.current_tou;
        if needs_apply {
            let diff = diff_schedule(&self.current_tou, &new_tou, effective_hour);
            let mut any_failure = false;
            for segment in diff.to_disable.iter().chain(diff.to_update.iter()) {
                let mut disabled = *segment;
                if diff.to_disable.contains(segment) && !diff.to_update.contains(segment) {
                    disabled.enabled = false;
                }
                if let Err(e) = self.inverter.set_inverter_time_segment(disabled).await {
                    any_failure = true;
                    self.failures.record(now(&self.time_grid), "set_inverter_time_segment", &e);
                }
            }
            if !any_failure {
                self.current_tou = new_tou.clone();
                self.corruption_detected = false;
            }
        }

        // Step 11: store the Optimization Result; persist planned intents.
        self.schedule.store(ScheduleEntry {
            timestamp: now(&self.time_grid),
            optimization_period: start,
            result: result.clone(),
            scenario: if prepare_next_day {
                Scenario::Tomorrow
            } else if self.first_run {
                Scenario::Restart
            } else {
                Scenario::Hourly
            },
        });

        // Step 12: capture a Prediction Snapshot (unless preparing next day).
        if !prepare_next_day {
            let view = build_daily_view(&self.historical, &self.schedule, start, self.periods_today);
            self.snapshots.capture(PredictionSnapshot {
                snapshot_timestamp: now(&self.time_grid),
                optimization_period: start,
                daily_view: view,
                applied_schedule: self.current_tou.clone(),
                predicted_daily_savings: result.summary.savings_vs_grid_only,
            });
        }

        // Step 13: per-period control knobs for p.
        if let Some(current_period_data) = result.periods.first() {
            let knobs = control_knobs_for_period(
                current_period_data.decision.strategic_intent,
                current_period_data.decision.battery_action / 0.25,
                self.battery.max_discharge_power_kw,
            );
            if let Err(e) = self.inverter.set_grid_charge(knobs.grid_charge_enabled).await {
                self.failures.record(now(&self.time_grid), "set_grid_charge", &e);
            }
            if let Err(e) = self
                .inverter
                .set_discharging_power_rate(knobs.discharge_power_rate)
                .await
            {
                self.failures.record(now(&self.time_grid), "set_discharging_power_rate", &e);
            }
            if let Err(e) = self
                .inverter
                .set_charging_power_rate(knobs.charge_power_rate)
                .await
            {
                self.failures.record(now(&self.time_grid), "set_charging_power_rate", &e);
            }
        }

        self.first_run = false;
        Ok(true)
    }

    async fn record_actual_period(&mut self, prev_period: u32) {
        let solar = self.sensors.read_live(SensorChannel::SolarProduction).await;
        let load = self.sensors.read_live(SensorChannel::HomeConsumption).await;
        let grid_import = self.sensors.read_live(SensorChannel::GridImport).await;
        let grid_export = self.sensors.read_live(SensorChannel::GridExport).await;
        let charged = self.sensors.read_live(SensorChannel::BatteryCharge).await;
        let discharged = self.sensors.read_live(SensorChannel::BatteryDischarge).await;

        let flows = (|| -> CoreResult<(f64, f64, f64, f64, f64, f64)> {
            Ok((solar?, load?, grid_import?, grid_export?, charged?, discharged?))
        })();

        match flows {
            Ok((solar, load, grid_import, grid_export, charged, discharged)) => {
                let soe_start = self.last_actual_soe;
                let soe_end = (soe_start + charged * self.battery.efficiency_charge
                    - discharged / self.battery.efficiency_discharge)
                    .clamp(0.0, self.battery.capacity_kwh);
                self.last_actual_soe = soe_end;
                match EnergyRecord::new(
                    solar,
                    load,
                    charged,
                    discharged,
                    grid_import,
                    grid_export,
                    soe_start,
                    soe_end,
                    self.battery.capacity_kwh,
                    self.battery.efficiency_charge,
                    self.battery.efficiency_discharge,
                ) {
                    Ok(energy) => {
                        let planned_intent = self
                            .schedule
                            .persisted_intent(prev_period)
                            .unwrap_or(StrategicIntent::Idle);
                        let observed_intent =
                            intent::classify(&energy, charged - discharged);
                        let (buy, sell) = self.prices_for_period(prev_period);
                        let economic = EconomicRecord::new(solar, load, grid_import, grid_export, buy, sell);
                        let decision = DecisionRecord {
                            strategic_intent: planned_intent,
                            battery_action: charged - discharged,
                            observed_intent: Some(observed_intent),
                        };
                        let _ = self.historical.record(prev_period as usize, energy);
                        self.schedule.store(ScheduleEntry {
                            timestamp: now(&self.time_grid),
                            optimization_period: prev_period,
                            result: crate::domain::decision::OptimizationResult {
                                periods: vec![PeriodData {
                                    period: prev_period,
                                    energy,
                                    economic,
                                    decision,
                                    timestamp: now(&self.time_grid),
                                    data_source: DataSource::Actual,
                                }],
                                summary: crate::domain::economic::EconomicSummary::from_records(
                                    &[economic],
                                    charged,
                                    discharged,
                                ),
                            },
                            scenario: Scenario::Hourly,
                        });
                    }
                    Err(e) => warn!(period = prev_period, %e, "actual energy record failed construction"),
                }
            }
            Err(e) => {
                self.failures.record(now(&self.time_grid), "record_actual_period", &e);
                warn!(period = prev_period, error = %e, "failed to collect actuals");
            }
        }
    }

    fn recompute_cost_basis_from_actuals(&self) -> f64 {
        let mut e = 0.0_f64;
        let mut c = 0.0_f64;
        for record in self.historical.get_today().iter().flatten() {
            let grid_in = record.grid_to_battery;
            let solar_in = record.solar_to_battery;
            let gross_charge = grid_in + solar_in;
            if gross_charge > 1e-9 {
                c += grid_in * 0.0 + gross_charge * self.battery.cycle_cost_per_kwh;
                e += gross_charge;
            }
            if record.battery_discharged > 1e-9 && e > 1e-9 {
                let avg = c / e.max(1e-9);
                c = (c - record.battery_discharged * avg).max(0.0);
                e = (e - record.battery_discharged).max(0.0);
                if e <= 0.1 {
                    c = 0.0;
                }
            }
        }
        if e <= 1e-9 {
            self.battery.cycle_cost_per_kwh
        } else {
            c / e
        }
    }

    fn assemble_consumption_horizon(&self, start: u32, len: u32) -> Vec<f64> {
        (start..start + len)
            .map(|p| {
                self.historical
                    .get(p as usize)
                    .map(|r| r.home_consumption)
                    .unwrap_or_else(|| {
                        let hour = ((p / 4) % 24) as usize;
                        self.home_fallback.hourly_consumption_kwh[hour] / 4.0
                    })
            })
            .collect()
    }

    fn assemble_solar_horizon(&self, start: u32, len: u32) -> Vec<f64> {
        (start..start + len)
            .map(|p| {
                self.historical
                    .get(p as usize)
                    .map(|r| r.solar_production)
                    .unwrap_or(0.0)
            })
            .collect()
    }

    fn full_day_intents(&self, start: u32, new_periods: &[PeriodData]) -> Vec<StrategicIntent> {
        let mut intents = Vec::with_capacity(self.periods_today as usize);
        for p in 0..self.periods_today {
            if p < start {
                let intent = self
                    .historical
                    .get(p as usize)
                    .and(self.schedule.persisted_intent(p))
                    .unwrap_or(StrategicIntent::Idle);
                intents.push(intent);
            } else {
                let offset = (p - start) as usize;
                let intent = new_periods
                    .get(offset)
                    .map(|pd| pd.decision.strategic_intent)
                    .unwrap_or(StrategicIntent::Idle);
                intents.push(intent);
            }
        }
        intents
    }

    // ---- read accessors (backing the thin HTTP API, §6) ----

    pub fn daily_view(&self) -> DailyView {
        let current_period = self
            .time_grid
            .timestamp_to_period(chrono_now_in(self.time_grid.timezone()), self.today)
            .unwrap_or(0);
        build_daily_view(&self.historical, &self.schedule, current_period, self.periods_today)
    }

    /// Looks up the buy/sell prices a previous optimizer run assigned to `period`, for building
    /// the actual `EconomicRecord` with the same prices the plan used. Falls back to the price
    /// model evaluated at zero spot if no prior run covered this period.
    fn prices_for_period(&self, period: u32) -> (f64, f64) {
        for entry in self.schedule.all_today().iter().rev() {
            if let Some(pd) = entry.result.periods.iter().find(|pd| pd.period == period) {
                return (pd.economic.buy_price, pd.economic.sell_price);
            }
        }
        (self.price_model.buy_price(0.0), self.price_model.sell_price(0.0))
    }

    pub fn current_tou(&self) -> &[TouSegment] {
        &self.current_tou
    }

    pub async fn inverter_status(&self) -> CoreResult<PowerReadings> {
        self.inverter.read_power_readings().await
    }

    /// Clone of the inverter handle, for callers (the HTTP API) that need to `.await` a port
    /// call without holding the control loop's lock across the await point.
    pub fn inverter_handle(&self) -> Arc<dyn InverterController> {
        self.inverter.clone()
    }

    pub fn strategic_intent_summary(&self) -> Vec<(u32, StrategicIntent)> {
        self.schedule
            .persisted_intents()
            .iter()
            .map(|(p, i)| (*p, *i))
            .collect()
    }

    pub fn snapshot_comparison(&self) -> Option<DeviationReport> {
        let snapshot = self.snapshots.latest()?;
        Some(analyze_deviation(snapshot, &self.daily_view()))
    }

    pub fn failures(&self) -> Arc<FailureTracker> {
        self.failures.clone()
    }

    pub fn corruption_detected(&self) -> bool {
        self.corruption_detected
    }

    pub fn degraded_components(&self) -> &[String] {
        &self.degraded_components
    }

    pub fn debug_dump(&self) -> DebugDump {
        DebugDump {
            state: self.state,
            today: self.today,
            periods_today: self.periods_today,
            current_tou: self.current_tou.clone(),
            corruption_detected: self.corruption_detected,
            degraded_components: self.degraded_components.clone(),
            failure_count: self.failures.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugDump {
    pub state: ControlLoopState,
    pub today: NaiveDate,
    pub periods_today: u32,
    pub current_tou: Vec<TouSegment>,
    pub corruption_detected: bool,
    pub degraded_components: Vec<String>,
    pub failure_count: usize,
}

fn now(time_grid: &TimeGrid) -> DateTime<FixedOffset> {
    chrono_now_in(time_grid.timezone()).fixed_offset()
}

fn chrono_now_in(tz: chrono_tz::Tz) -> DateTime<chrono_tz::Tz> {
    chrono::Utc::now().with_timezone(&tz)
}
