#![allow(dead_code)]
//! Prediction Snapshot storage and the deviation analyzer (spec §4.9).

use crate::daily_view::DailyView;
use crate::tou::segment::TouSegment;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A frozen record of "what the optimizer thought would happen" at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionSnapshot {
    pub snapshot_timestamp: DateTime<FixedOffset>,
    pub optimization_period: u32,
    pub daily_view: DailyView,
    pub applied_schedule: Vec<TouSegment>,
    pub predicted_daily_savings: f64,
}

#[derive(Default)]
pub struct SnapshotStore {
    snapshots: Vec<PredictionSnapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&mut self, snapshot: PredictionSnapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn latest(&self) -> Option<&PredictionSnapshot> {
        self.snapshots.last()
    }

    pub fn all(&self) -> &[PredictionSnapshot] {
        &self.snapshots
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviationKind {
    ConsumptionHigher,
    ConsumptionLower,
    SolarHigher,
    SolarLower,
    BatteryMismatch,
    Minimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryCause {
    Consumption,
    Solar,
    BatteryControl,
    Multiple,
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PeriodDeviation {
    pub period: u32,
    pub battery_action_delta: f64,
    pub consumption_delta: f64,
    pub solar_delta: f64,
    pub savings_delta: f64,
    pub classification: DeviationKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviationReport {
    pub per_period: Vec<PeriodDeviation>,
    pub primary_cause: PrimaryCause,
}

const DEVIATION_THRESHOLD_KWH: f64 = 0.3;

/// Compares `snapshot` against `current` for every period in
/// `[snapshot.optimization_period, current.actual_count)`.
pub fn analyze_deviation(snapshot: &PredictionSnapshot, current: &DailyView) -> DeviationReport {
    let mut per_period = Vec::new();
    let mut consumption_abs_total = 0.0;
    let mut solar_abs_total = 0.0;
    let mut battery_abs_total = 0.0;

    let start = snapshot.optimization_period as usize;
    let end = current.actual_count as usize;

    for p in start..end {
        let predicted = snapshot
            .daily_view
            .periods
            .iter()
            .find(|pd| pd.period as usize == p);
        let actual = current.periods.iter().find(|pd| pd.period as usize == p);
        let (Some(predicted), Some(actual)) = (predicted, actual) else {
            continue;
        };

        let battery_action_delta = actual.decision.battery_action - predicted.decision.battery_action;
        let consumption_delta = actual.energy.home_consumption - predicted.energy.home_consumption;
        let solar_delta = actual.energy.solar_production - predicted.energy.solar_production;
        let savings_delta = actual.economic.hourly_savings - predicted.economic.hourly_savings;

        consumption_abs_total += consumption_delta.abs();
        solar_abs_total += solar_delta.abs();
        battery_abs_total += battery_action_delta.abs();

        let classification = classify_period_deviation(
            consumption_delta,
            solar_delta,
            battery_action_delta,
        );

        per_period.push(PeriodDeviation {
            period: p as u32,
            battery_action_delta,
            consumption_delta,
            solar_delta,
            savings_delta,
            classification,
        });
    }

    let total_abs = consumption_abs_total + solar_abs_total + battery_abs_total;
    let primary_cause = if total_abs < 1e-9 {
        PrimaryCause::None
    } else {
        let consumption_share = consumption_abs_total / total_abs;
        let solar_share = solar_abs_total / total_abs;
        let battery_share = battery_abs_total / total_abs;
        if consumption_share > 0.5 {
            PrimaryCause::Consumption
        } else if solar_share > 0.5 {
            PrimaryCause::Solar
        } else if battery_share > 0.5 {
            PrimaryCause::BatteryControl
        } else {
            PrimaryCause::Multiple
        }
    };

    DeviationReport {
        per_period,
        primary_cause,
    }
}

fn classify_period_deviation(
    consumption_delta: f64,
    solar_delta: f64,
    battery_action_delta: f64,
) -> DeviationKind {
    let candidates = [
        (consumption_delta.abs(), 0),
        (solar_delta.abs(), 1),
        (battery_action_delta.abs(), 2),
    ];
    let (max_abs, which) = candidates
        .iter()
        .copied()
        .fold((0.0, 3), |acc, c| if c.0 > acc.0 { c } else { acc });

    if max_abs <= DEVIATION_THRESHOLD_KWH {
        return DeviationKind::Minimal;
    }

    match which {
        0 if consumption_delta > 0.0 => DeviationKind::ConsumptionHigher,
        0 => DeviationKind::ConsumptionLower,
        1 if solar_delta > 0.0 => DeviationKind::SolarHigher,
        1 => DeviationKind::SolarLower,
        2 => DeviationKind::BatteryMismatch,
        _ => DeviationKind::Minimal,
    }
}
