#![allow(dead_code)]
//! Decision-level records: strategic intent, per-period data, and the optimizer's output.

use super::economic::{EconomicRecord, EconomicSummary};
use super::energy::EnergyRecord;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One of the five plan-time categorizations of a period's battery action (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategicIntent {
    GridCharging,
    SolarStorage,
    LoadSupport,
    ExportArbitrage,
    Idle,
}

/// Where a [`PeriodData`] record's contents came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Actual,
    Predicted,
}

/// Battery action plus classification for one period. `observed_intent` is only populated for
/// actual (post-hoc) records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub strategic_intent: StrategicIntent,
    /// Net battery energy change for the period (kWh, signed: >0 charge, <0 discharge).
    pub battery_action: f64,
    pub observed_intent: Option<StrategicIntent>,
}

/// `(period, energy, economic, decision, timestamp, data_source)` tuple record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodData {
    pub period: u32,
    pub energy: EnergyRecord,
    pub economic: EconomicRecord,
    pub decision: DecisionRecord,
    pub timestamp: DateTime<FixedOffset>,
    pub data_source: DataSource,
}

/// The complete output of one DP Optimizer run: an ordered sequence of `PeriodData` plus the
/// aggregate economic summary over that sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub periods: Vec<PeriodData>,
    pub summary: EconomicSummary,
}

impl OptimizationResult {
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}
