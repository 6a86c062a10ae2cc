#![allow(dead_code)]
//! External collaborator contracts (spec §6): the inverter, sensor, and price feed adapters
//! the control loop depends on but does not implement.

use crate::error::{CoreError, CoreResult};
use crate::tou::segment::TouSegment;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Real-time power readings in watts, for display only (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerReadings {
    pub pv_w: f64,
    pub local_load_w: f64,
    pub grid_import_w: f64,
    pub grid_export_w: f64,
    pub battery_charge_w: f64,
    pub battery_discharge_w: f64,
    pub net_battery_w: f64,
    pub net_grid_w: f64,
    pub self_consumption_w: f64,
}

/// The narrow control surface an inverter exposes (spec §6). Each method fails with
/// [`CoreError::Io`] or [`CoreError::Timeout`]; the core does not retry above this layer.
#[async_trait]
pub trait InverterController: Send + Sync {
    async fn get_battery_soc(&self) -> CoreResult<f64>;
    async fn get_charge_stop_soc(&self) -> CoreResult<f64>;
    async fn set_charge_stop_soc(&self, percent: f64) -> CoreResult<()>;
    async fn get_discharge_stop_soc(&self) -> CoreResult<f64>;
    async fn set_discharge_stop_soc(&self, percent: f64) -> CoreResult<()>;
    async fn grid_charge_enabled(&self) -> CoreResult<bool>;
    async fn set_grid_charge(&self, enabled: bool) -> CoreResult<()>;
    async fn get_discharging_power_rate(&self) -> CoreResult<f64>;
    async fn set_discharging_power_rate(&self, percent: f64) -> CoreResult<()>;
    async fn set_charging_power_rate(&self, percent: f64) -> CoreResult<()>;
    async fn read_inverter_time_segments(&self) -> CoreResult<Vec<TouSegment>>;
    async fn set_inverter_time_segment(&self, segment: TouSegment) -> CoreResult<()>;
    async fn read_power_readings(&self) -> CoreResult<PowerReadings>;
}

/// Per-period cumulative meter snapshots; the core computes per-period deltas itself.
#[async_trait]
pub trait SensorSource: Send + Sync {
    /// Cumulative energy meter reading (kWh) as of `now`, for the named channel.
    async fn read_live(&self, channel: SensorChannel) -> CoreResult<f64>;
}

/// The narrow historical-query surface the control loop uses to backfill at startup
/// (spec §4.11 "Starting").
#[async_trait]
pub trait HistoricalReadingQuery: Send + Sync {
    /// Cumulative meter value for `channel` at the end of period `p` on `date`.
    async fn query_period_end(
        &self,
        channel: SensorChannel,
        date: NaiveDate,
        period: u32,
    ) -> CoreResult<Option<f64>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorChannel {
    SolarProduction,
    HomeConsumption,
    GridImport,
    GridExport,
    BatteryCharge,
    BatteryDischarge,
}

/// `get_prices_for_date(date) -> Vec<raw_spot>` with length equal to `periods_in_day(date)`.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn get_prices_for_date(&self, date: NaiveDate) -> CoreResult<Vec<f64>>;
}

/// In-memory, deterministic test/demo adapters, grounded on the teacher's `SimulatedBattery`
/// and `SimulatedInverter`. No wall-clock RNG: every value is either fixed or driven by the
/// caller, since determinism is a tested property of the system (spec §8).
pub mod testing {
    use super::*;
    use parking_lot::RwLock;
    use std::collections::HashMap;

    pub struct SimulatedInverterController {
        soc: RwLock<f64>,
        charge_stop: RwLock<f64>,
        discharge_stop: RwLock<f64>,
        grid_charge: RwLock<bool>,
        discharge_rate: RwLock<f64>,
        charge_rate: RwLock<f64>,
        segments: RwLock<Vec<TouSegment>>,
        readings: RwLock<PowerReadings>,
    }

    impl SimulatedInverterController {
        pub fn new(initial_soc: f64) -> Self {
            Self {
                soc: RwLock::new(initial_soc),
                charge_stop: RwLock::new(100.0),
                discharge_stop: RwLock::new(0.0),
                grid_charge: RwLock::new(false),
                discharge_rate: RwLock::new(0.0),
                charge_rate: RwLock::new(0.0),
                segments: RwLock::new(Vec::new()),
                readings: RwLock::new(PowerReadings {
                    pv_w: 0.0,
                    local_load_w: 0.0,
                    grid_import_w: 0.0,
                    grid_export_w: 0.0,
                    battery_charge_w: 0.0,
                    battery_discharge_w: 0.0,
                    net_battery_w: 0.0,
                    net_grid_w: 0.0,
                    self_consumption_w: 0.0,
                }),
            }
        }

        pub fn set_soc(&self, soc: f64) {
            *self.soc.write() = soc;
        }

        pub fn seed_segments(&self, segments: Vec<TouSegment>) {
            *self.segments.write() = segments;
        }
    }

    #[async_trait]
    impl InverterController for SimulatedInverterController {
        async fn get_battery_soc(&self) -> CoreResult<f64> {
            Ok(*self.soc.read())
        }

        async fn get_charge_stop_soc(&self) -> CoreResult<f64> {
            Ok(*self.charge_stop.read())
        }

        async fn set_charge_stop_soc(&self, percent: f64) -> CoreResult<()> {
            *self.charge_stop.write() = percent;
            Ok(())
        }

        async fn get_discharge_stop_soc(&self) -> CoreResult<f64> {
            Ok(*self.discharge_stop.read())
        }

        async fn set_discharge_stop_soc(&self, percent: f64) -> CoreResult<()> {
            *self.discharge_stop.write() = percent;
            Ok(())
        }

        async fn grid_charge_enabled(&self) -> CoreResult<bool> {
            Ok(*self.grid_charge.read())
        }

        async fn set_grid_charge(&self, enabled: bool) -> CoreResult<()> {
            *self.grid_charge.write() = enabled;
            Ok(())
        }

        async fn get_discharging_power_rate(&self) -> CoreResult<f64> {
            Ok(*self.discharge_rate.read())
        }

        async fn set_discharging_power_rate(&self, percent: f64) -> CoreResult<()> {
            *self.discharge_rate.write() = percent;
            Ok(())
        }

        async fn set_charging_power_rate(&self, percent: f64) -> CoreResult<()> {
            *self.charge_rate.write() = percent;
            Ok(())
        }

        async fn read_inverter_time_segments(&self) -> CoreResult<Vec<TouSegment>> {
            Ok(self.segments.read().clone())
        }

        async fn set_inverter_time_segment(&self, segment: TouSegment) -> CoreResult<()> {
            let mut segments = self.segments.write();
            if let Some(existing) = segments
                .iter_mut()
                .find(|s| s.segment_id == segment.segment_id)
            {
                *existing = segment;
            } else {
                segments.push(segment);
            }
            Ok(())
        }

        async fn read_power_readings(&self) -> CoreResult<PowerReadings> {
            Ok(*self.readings.read())
        }
    }

    #[derive(Default)]
    pub struct SimulatedSensorSource {
        live: RwLock<HashMap<SensorChannel, f64>>,
    }

    impl SimulatedSensorSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_live(&self, channel: SensorChannel, value: f64) {
            self.live.write().insert(channel, value);
        }
    }

    #[async_trait]
    impl SensorSource for SimulatedSensorSource {
        async fn read_live(&self, channel: SensorChannel) -> CoreResult<f64> {
            self.live
                .read()
                .get(&channel)
                .copied()
                .ok_or_else(|| CoreError::MissingData(format!("no live reading for {channel:?}")))
        }
    }

    pub struct SimulatedPriceSource {
        prices: RwLock<HashMap<NaiveDate, Vec<f64>>>,
    }

    impl SimulatedPriceSource {
        pub fn new() -> Self {
            Self {
                prices: RwLock::new(HashMap::new()),
            }
        }

        pub fn seed(&self, date: NaiveDate, prices: Vec<f64>) {
            self.prices.write().insert(date, prices);
        }
    }

    impl Default for SimulatedPriceSource {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl PriceSource for SimulatedPriceSource {
        async fn get_prices_for_date(&self, date: NaiveDate) -> CoreResult<Vec<f64>> {
            self.prices
                .read()
                .get(&date)
                .cloned()
                .ok_or_else(|| CoreError::MissingData(format!("no prices seeded for {date}")))
        }
    }

    /// A historical-query adapter that never has anything to report. Suitable for a fresh
    /// deployment with no prior meter history to backfill at startup.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NullHistoricalQuery;

    #[async_trait]
    impl HistoricalReadingQuery for NullHistoricalQuery {
        async fn query_period_end(
            &self,
            _channel: SensorChannel,
            _date: NaiveDate,
            _period: u32,
        ) -> CoreResult<Option<f64>> {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn simulated_inverter_round_trips_soc() {
        let inv = SimulatedInverterController::new(55.0);
        assert_eq!(inv.get_battery_soc().await.unwrap(), 55.0);
        inv.set_charge_stop_soc(90.0).await.unwrap();
        assert_eq!(inv.get_charge_stop_soc().await.unwrap(), 90.0);
    }

    #[tokio::test]
    async fn simulated_sensor_source_reports_missing_data_for_unseeded_channel() {
        let sensor = SimulatedSensorSource::new();
        let err = sensor.read_live(SensorChannel::SolarProduction).await;
        assert!(matches!(err, Err(CoreError::MissingData(_))));
    }
}
