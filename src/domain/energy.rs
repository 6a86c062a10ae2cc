#![allow(dead_code)]
//! Per-period energy flows and their derived detailed breakdown.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error, PartialEq)]
pub enum EnergyRecordError {
    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("battery_soe_start {soe_start} or battery_soe_end {soe_end} outside [0, {capacity}]")]
    SoeOutOfBounds {
        soe_start: f64,
        soe_end: f64,
        capacity: f64,
    },
}

/// A single period's raw energy totals (kWh) plus the detailed flow breakdown derived from
/// them. Immutable after construction: any change to the raw totals requires building a new
/// record via [`EnergyRecord::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyRecord {
    pub solar_production: f64,
    pub home_consumption: f64,
    pub battery_charged: f64,
    pub battery_discharged: f64,
    pub grid_imported: f64,
    pub grid_exported: f64,
    pub battery_soe_start: f64,
    pub battery_soe_end: f64,
    pub efficiency_charge: f64,
    pub efficiency_discharge: f64,

    pub solar_to_home: f64,
    pub solar_to_battery: f64,
    pub solar_to_grid: f64,
    pub grid_to_home: f64,
    pub grid_to_battery: f64,
    pub battery_to_home: f64,
    pub battery_to_grid: f64,
}

impl EnergyRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        solar_production: f64,
        home_consumption: f64,
        battery_charged: f64,
        battery_discharged: f64,
        grid_imported: f64,
        grid_exported: f64,
        battery_soe_start: f64,
        battery_soe_end: f64,
        battery_capacity: f64,
        efficiency_charge: f64,
        efficiency_discharge: f64,
    ) -> Result<Self, EnergyRecordError> {
        for (field, value) in [
            ("solar_production", solar_production),
            ("home_consumption", home_consumption),
            ("battery_charged", battery_charged),
            ("battery_discharged", battery_discharged),
            ("grid_imported", grid_imported),
            ("grid_exported", grid_exported),
        ] {
            if value < -TOLERANCE {
                return Err(EnergyRecordError::Negative { field, value });
            }
        }
        if battery_soe_start < -TOLERANCE
            || battery_soe_start > battery_capacity + TOLERANCE
            || battery_soe_end < -TOLERANCE
            || battery_soe_end > battery_capacity + TOLERANCE
        {
            return Err(EnergyRecordError::SoeOutOfBounds {
                soe_start: battery_soe_start,
                soe_end: battery_soe_end,
                capacity: battery_capacity,
            });
        }

        let solar_to_home = solar_production.min(home_consumption).max(0.0);
        let solar_to_battery = battery_charged
            .min((solar_production - solar_to_home).max(0.0))
            .max(0.0);
        let solar_to_grid = (solar_production - solar_to_home - solar_to_battery).max(0.0);

        let battery_to_home = battery_discharged
            .min((home_consumption - solar_to_home).max(0.0))
            .max(0.0);
        let battery_to_grid = (battery_discharged - battery_to_home).max(0.0);
        let grid_to_home = (home_consumption - solar_to_home - battery_to_home).max(0.0);
        let grid_to_battery = (battery_charged - solar_to_battery).max(0.0);

        Ok(Self {
            solar_production,
            home_consumption,
            battery_charged,
            battery_discharged,
            grid_imported,
            grid_exported,
            battery_soe_start,
            battery_soe_end,
            efficiency_charge,
            efficiency_discharge,
            solar_to_home,
            solar_to_battery,
            solar_to_grid,
            grid_to_home,
            grid_to_battery,
            battery_to_home,
            battery_to_grid,
        })
    }

    /// `true` iff all four universal conservation invariants (spec §8, invariants 1-3 plus the
    /// SoE balance) hold within `TOLERANCE`.
    ///
    /// `battery_charged`/`battery_discharged` are metered AC-side (gross) quantities, used as-is
    /// by i1-i3 for grid/solar utilization accounting. The SoE itself moves on the DC side, so i4
    /// converts gross to net via the battery's round-trip efficiencies before comparing against
    /// the recorded start/end SoE.
    pub fn invariants_hold(&self) -> bool {
        let i1 = (self.solar_to_home + self.solar_to_battery + self.solar_to_grid
            - self.solar_production)
            .abs()
            <= TOLERANCE;
        let i2 = (self.grid_to_home + self.grid_to_battery - self.grid_imported).abs()
            <= TOLERANCE;
        let i3 = (self.battery_to_home + self.battery_to_grid - self.battery_discharged).abs()
            <= TOLERANCE;
        let net_charged = self.battery_charged * self.efficiency_charge;
        let net_discharged = if self.efficiency_discharge > TOLERANCE {
            self.battery_discharged / self.efficiency_discharge
        } else {
            self.battery_discharged
        };
        let i4 = (self.battery_soe_start + net_charged - net_discharged - self.battery_soe_end)
            .abs()
            <= TOLERANCE;
        i1 && i2 && i3 && i4
    }
}
