#![allow(dead_code)]
//! Settings: three validated sections loaded via `figment` (spec §4.2, §6 "Configuration").

use anyhow::{Context, Result};
use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::{BatterySettings, PriceModel};

/// Top-level settings loaded at startup.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub battery: BatterySettingsConfig,

    #[validate(nested)]
    pub home: HomeSettings,

    #[validate(nested)]
    pub prices: PriceSettings,
}

/// Battery section: the physical/economic parameters plus the timezone that anchors the
/// Time Grid, which is not itself part of [`BatterySettings`] (a pure value type shared with
/// the optimizer).
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct BatterySettingsConfig {
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

    /// IANA timezone name, e.g. `"Europe/Stockholm"`.
    #[validate(length(min = 1))]
    pub timezone: String,
}

impl BatterySettingsConfig {
    pub fn battery_settings(&self) -> BatterySettings {
        BatterySettings {
            capacity_kwh: self.capacity_kwh,
            min_soe_percent: self.min_soe_percent,
            max_soe_percent: self.max_soe_percent,
            max_charge_power_kw: self.max_charge_power_kw,
            max_discharge_power_kw: self.max_discharge_power_kw,
            efficiency_charge: self.efficiency_charge,
            efficiency_discharge: self.efficiency_discharge,
            cycle_cost_per_kwh: self.cycle_cost_per_kwh,
        }
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid timezone '{}': {e}", self.timezone))
    }
}

/// Household section: label plus the fallback consumption profile used only when the Sensor
/// Source reports no historical data for a future period (the DP needs *some* consumption
/// vector to optimize against).
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct HomeSettings {
    #[validate(length(min = 1))]
    pub label: String,

    #[serde(default)]
    #[validate(nested)]
    pub sensor_fallback: SensorFallbackSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SensorFallbackSettings {
    /// Fallback hourly consumption (kWh/h), one entry per hour of day.
    #[serde(default = "default_hourly_consumption_kwh")]
    pub hourly_consumption_kwh: [f64; 24],
}

impl Default for SensorFallbackSettings {
    fn default() -> Self {
        Self {
            hourly_consumption_kwh: default_hourly_consumption_kwh(),
        }
    }
}

fn default_hourly_consumption_kwh() -> [f64; 24] {
    [1.0; 24]
}

/// Price section: the §4.2 buy/sell derivation parameters plus area and the actual-vs-forecast
/// price switch.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct PriceSettings {
    #[validate(length(min = 1))]
    pub area: String,

    pub markup_rate: f64,
    #[validate(range(min = 0.0))]
    pub vat_multiplier: f64,
    pub additional_costs: f64,
    pub tax_reduction: f64,

    /// If true, actuals (once known) replace forecast spot prices when recomputing history;
    /// otherwise the forecast used at optimization time is kept for bookkeeping.
    #[serde(default)]
    pub use_actual_price: bool,
}

impl PriceSettings {
    pub fn price_model(&self) -> PriceModel {
        PriceModel {
            markup_rate: self.markup_rate,
            vat_multiplier: self.vat_multiplier,
            additional_costs: self.additional_costs,
            tax_reduction: self.tax_reduction,
        }
    }
}

impl Settings {
    /// Load configuration from `config/default.toml`, optionally layered with
    /// `config/<environment>.toml`, then `BESS__`-prefixed environment variables.
    pub fn load() -> Result<Self> {
        Self::load_with_env(None)
    }

    pub fn load_with_env(environment: Option<&str>) -> Result<Self> {
        let mut figment = Figment::new().merge(Toml::file("config/default.toml"));

        if let Some(env) = environment {
            figment = figment.merge(Toml::file(format!("config/{env}.toml")));
        }

        figment = figment.merge(Env::prefixed("BESS__").split("__"));

        let settings: Settings = figment.extract().context("failed to parse configuration")?;
        settings
            .validate()
            .context("configuration validation failed")?;

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn battery_config() -> BatterySettingsConfig {
        BatterySettingsConfig {
            capacity_kwh: 30.0,
            min_soe_percent: 10.0,
            max_soe_percent: 100.0,
            max_charge_power_kw: 15.0,
            max_discharge_power_kw: 15.0,
            efficiency_charge: 0.9,
            efficiency_discharge: 0.9,
            cycle_cost_per_kwh: 0.40,
            timezone: "Europe/Stockholm".to_string(),
        }
    }

    #[test]
    fn battery_config_validates() {
        assert!(battery_config().validate().is_ok());
    }

    #[test]
    fn battery_config_parses_timezone() {
        assert!(battery_config().timezone().is_ok());
    }

    #[test]
    fn battery_config_rejects_unknown_timezone() {
        let mut c = battery_config();
        c.timezone = "Not/A_Zone".to_string();
        assert!(c.timezone().is_err());
    }

    #[test]
    fn sensor_fallback_defaults_to_flat_profile() {
        let fallback = SensorFallbackSettings::default();
        assert_eq!(fallback.hourly_consumption_kwh.len(), 24);
        assert!((fallback.hourly_consumption_kwh[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn price_settings_builds_price_model() {
        let prices = PriceSettings {
            area: "SE3".to_string(),
            markup_rate: 0.05,
            vat_multiplier: 1.25,
            additional_costs: 0.30,
            tax_reduction: 0.60,
            use_actual_price: false,
        };
        let model = prices.price_model();
        assert!((model.buy_price(1.0) - ((1.0 + 0.05) * 1.25 + 0.30)).abs() < 1e-9);
    }
}
