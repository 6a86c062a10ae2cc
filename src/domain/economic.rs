#![allow(dead_code)]
//! Per-period and per-day economic accounting.

use serde::{Deserialize, Serialize};

/// Per-period cost/savings figures, always expressed relative to the three baselines
/// (grid-only, solar-only, battery+solar).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EconomicRecord {
    pub buy_price: f64,
    pub sell_price: f64,
    pub hourly_cost: f64,
    pub hourly_savings: f64,
    pub grid_only_cost: f64,
    pub solar_only_cost: f64,
    pub battery_solar_cost: f64,
}

impl EconomicRecord {
    /// Builds the record for one period given its energy flows and prices.
    ///
    /// `grid_only_cost` assumes no solar and no battery (all consumption bought at `buy_price`);
    /// `solar_only_cost` assumes solar offsets load directly but the battery is absent;
    /// `battery_solar_cost` is the actual realized cost given the period's flows.
    pub fn new(
        solar_production: f64,
        home_consumption: f64,
        grid_imported: f64,
        grid_exported: f64,
        buy_price: f64,
        sell_price: f64,
    ) -> Self {
        let grid_only_cost = home_consumption * buy_price;

        let solar_to_home_baseline = solar_production.min(home_consumption);
        let solar_export_baseline = (solar_production - solar_to_home_baseline).max(0.0);
        let solar_grid_import_baseline = (home_consumption - solar_to_home_baseline).max(0.0);
        let solar_only_cost =
            solar_grid_import_baseline * buy_price - solar_export_baseline * sell_price;

        let battery_solar_cost = grid_imported * buy_price - grid_exported * sell_price;
        let hourly_savings = grid_only_cost - battery_solar_cost;

        Self {
            buy_price,
            sell_price,
            hourly_cost: battery_solar_cost,
            hourly_savings,
            grid_only_cost,
            solar_only_cost,
            battery_solar_cost,
        }
    }
}

/// Aggregate economic figures over a full Optimization Result, including the three pairwise
/// savings and their percentages (supplementary feature from `examples/original_source/`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EconomicSummary {
    pub grid_only_cost: f64,
    pub solar_only_cost: f64,
    pub battery_solar_cost: f64,

    pub savings_vs_grid_only: f64,
    pub savings_vs_grid_only_pct: f64,
    pub savings_vs_solar_only: f64,
    pub savings_vs_solar_only_pct: f64,
    pub battery_vs_solar_savings: f64,
    pub battery_vs_solar_savings_pct: f64,

    pub total_charged: f64,
    pub total_discharged: f64,
}

impl EconomicSummary {
    pub fn from_records(records: &[EconomicRecord], total_charged: f64, total_discharged: f64) -> Self {
        let grid_only_cost: f64 = records.iter().map(|r| r.grid_only_cost).sum();
        let solar_only_cost: f64 = records.iter().map(|r| r.solar_only_cost).sum();
        let battery_solar_cost: f64 = records.iter().map(|r| r.battery_solar_cost).sum();

        let savings_vs_grid_only = grid_only_cost - battery_solar_cost;
        let savings_vs_solar_only = solar_only_cost - battery_solar_cost;
        let battery_vs_solar_savings = grid_only_cost - solar_only_cost;

        let pct = |savings: f64, baseline: f64| -> f64 {
            if baseline.abs() > 1e-9 {
                savings / baseline * 100.0
            } else {
                0.0
            }
        };

        Self {
            grid_only_cost,
            solar_only_cost,
            battery_solar_cost,
            savings_vs_grid_only,
            savings_vs_grid_only_pct: pct(savings_vs_grid_only, grid_only_cost),
            savings_vs_solar_only,
            savings_vs_solar_only_pct: pct(savings_vs_solar_only, solar_only_cost),
            battery_vs_solar_savings,
            battery_vs_solar_savings_pct: pct(battery_vs_solar_savings, grid_only_cost),
            total_charged,
            total_discharged,
        }
    }
}
