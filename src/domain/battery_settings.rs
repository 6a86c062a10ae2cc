#![allow(dead_code)]
//! Battery physical/economic parameters shared by the optimizer, the TOU compiler, and config.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Battery physical limits and economics. Loaded at startup from [`crate::config::Settings`]
/// and passed by value into the DP optimizer and TOU compiler — both are pure functions of
/// their inputs and never read global configuration themselves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct BatterySettings {
    #[validate(range(min = 0.1))]
    pub capacity_kwh: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub min_soe_percent: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub max_soe_percent: f64,
    #[validate(range(min = 0.0))]
    pub max_charge_power_kw: f64,
    #[validate(range(min = 0.0))]
    pub max_discharge_power_kw: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub efficiency_charge: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub efficiency_discharge: f64,
    #[validate(range(min = 0.0))]
    pub cycle_cost_per_kwh: f64,
}

impl BatterySettings {
    pub fn min_soe_kwh(&self) -> f64 {
        self.capacity_kwh * self.min_soe_percent / 100.0
    }

    pub fn max_soe_kwh(&self) -> f64 {
        self.capacity_kwh * self.max_soe_percent / 100.0
    }

    pub fn soc_to_soe_kwh(&self, soc_percent: f64) -> f64 {
        self.capacity_kwh * soc_percent / 100.0
    }

    pub fn soe_kwh_to_soc(&self, soe_kwh: f64) -> f64 {
        if self.capacity_kwh <= 0.0 {
            0.0
        } else {
            soe_kwh / self.capacity_kwh * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BatterySettings {
        BatterySettings {
            capacity_kwh: 30.0,
            min_soe_percent: 10.0,
            max_soe_percent: 100.0,
            max_charge_power_kw: 15.0,
            max_discharge_power_kw: 15.0,
            efficiency_charge: 0.9,
            efficiency_discharge: 0.9,
            cycle_cost_per_kwh: 0.40,
        }
    }

    #[test]
    fn soe_bounds_derive_from_percent() {
        let s = settings();
        assert!((s.min_soe_kwh() - 3.0).abs() < 1e-9);
        assert!((s.max_soe_kwh() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn soc_soe_round_trip() {
        let s = settings();
        let soe = s.soc_to_soe_kwh(50.0);
        assert!((s.soe_kwh_to_soc(soe) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let mut s = settings();
        s.capacity_kwh = 0.0;
        assert!(s.validate().is_err());
    }
}
