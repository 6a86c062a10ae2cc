#![allow(dead_code)]
//! Compiles 96 (or 92/100) quarterly intents into an hour-aligned TOU schedule (spec §4.7).

use super::segment::{BattMode, TouSegment, N_MAX};
use crate::domain::decision::StrategicIntent;
use crate::error::{CoreError, CoreResult};

/// Per-hour aggregation: the dominant `batt_mode` for one hour given its (up to 4) quarterly
/// intents, per the priority order in spec §4.7.
fn hour_mode(intents: &[StrategicIntent]) -> BattMode {
    if intents.iter().any(|i| *i == StrategicIntent::GridCharging) {
        BattMode::BatteryFirst
    } else if intents.iter().any(|i| *i == StrategicIntent::ExportArbitrage) {
        BattMode::GridFirst
    } else if intents.iter().any(|i| *i == StrategicIntent::LoadSupport) {
        BattMode::LoadFirst
    } else {
        // IDLE/SOLAR_STORAGE default to load-first so every hour of the day is covered
        // (Open Question resolution #4).
        BattMode::LoadFirst
    }
}

#[derive(Debug, Clone, Copy)]
struct RawSegment {
    start_hour: u8,
    end_hour: u8,
    mode: BattMode,
    mismatch: u32,
}

/// Per-period control knobs applied independently of the TOU schedule (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlKnobs {
    pub grid_charge_enabled: bool,
    pub discharge_power_rate: f64,
    pub charge_power_rate: f64,
}

pub fn control_knobs_for_period(intent: StrategicIntent, battery_action_kw: f64, max_discharge_power_kw: f64) -> ControlKnobs {
    let grid_charge_enabled = intent == StrategicIntent::GridCharging;

    let discharge_power_rate = match intent {
        StrategicIntent::LoadSupport => 100.0,
        StrategicIntent::ExportArbitrage => {
            if max_discharge_power_kw > 0.0 {
                (100.0 * battery_action_kw.abs() / max_discharge_power_kw).round()
            } else {
                0.0
            }
        }
        _ => 0.0,
    };

    let charge_power_rate = match intent {
        StrategicIntent::GridCharging | StrategicIntent::SolarStorage | StrategicIntent::Idle => {
            100.0
        }
        _ => 0.0,
    };

    ControlKnobs {
        grid_charge_enabled,
        discharge_power_rate,
        charge_power_rate,
    }
}

/// Compiles one day's 4-per-hour intents into at most `N_max` hour-aligned segments.
///
/// `intents_per_quarter` must have a length that is a multiple of 4 (one entry per quarter,
/// 92/96/100 total). Hours with no quarters at all (can only happen on the DST-short day, where
/// the last civil hour has fewer than 4 quarters) are synthesized from whatever quarters they
/// do have.
pub fn compile_tou(intents_per_quarter: &[StrategicIntent]) -> CoreResult<Vec<TouSegment>> {
    if intents_per_quarter.is_empty() {
        return Err(CoreError::InvalidInput(
            "compile_tou requires at least one quarterly intent".into(),
        ));
    }

    let num_hours = intents_per_quarter.len().div_ceil(4);
    let mut hour_modes = Vec::with_capacity(num_hours);
    let mut hour_mismatch = Vec::with_capacity(num_hours);
    for h in 0..num_hours {
        let start = h * 4;
        let end = ((h + 1) * 4).min(intents_per_quarter.len());
        let quarters = &intents_per_quarter[start..end];
        let mode = hour_mode(quarters);
        let mismatch = quarters
            .iter()
            .filter(|i| mode_conflicts(mode, **i))
            .count() as u32;
        hour_modes.push(mode);
        hour_mismatch.push(mismatch);
    }

    // Consolidate consecutive identical hours into raw segments.
    let mut raw: Vec<RawSegment> = Vec::new();
    for (h, &mode) in hour_modes.iter().enumerate() {
        if let Some(last) = raw.last_mut() {
            if last.mode == mode && last.end_hour as usize == h {
                last.end_hour = (h + 1) as u8;
                last.mismatch += hour_mismatch[h];
                continue;
            }
        }
        raw.push(RawSegment {
            start_hour: h as u8,
            end_hour: (h + 1) as u8,
            mode,
            mismatch: hour_mismatch[h],
        });
    }

    // Greedily merge the cheapest adjacent pair until within budget.
    while raw.len() > N_MAX as usize {
        let mut best_idx = 0usize;
        let mut best_cost = u32::MAX;
        for i in 0..raw.len() - 1 {
            let cost = raw[i].mismatch + raw[i + 1].mismatch;
            if cost < best_cost {
                best_cost = cost;
                best_idx = i;
            }
        }
        let merged_end = raw[best_idx + 1].end_hour;
        let merged_mismatch = raw[best_idx].mismatch + raw[best_idx + 1].mismatch;
        // Keep the mode of whichever half covers more hours; ties keep the earlier segment's.
        let left_hours = raw[best_idx].end_hour - raw[best_idx].start_hour;
        let right_hours = raw[best_idx + 1].end_hour - raw[best_idx + 1].start_hour;
        let merged_mode = if right_hours > left_hours {
            raw[best_idx + 1].mode
        } else {
            raw[best_idx].mode
        };
        raw[best_idx] = RawSegment {
            start_hour: raw[best_idx].start_hour,
            end_hour: merged_end,
            mode: merged_mode,
            mismatch: merged_mismatch,
        };
        raw.remove(best_idx + 1);
    }

    let segments = raw
        .into_iter()
        .enumerate()
        .map(|(i, r)| TouSegment {
            segment_id: (i + 1) as u8,
            start_hour: r.start_hour,
            end_hour: r.end_hour,
            batt_mode: r.mode,
            enabled: true,
        })
        .collect();
    Ok(segments)
}

fn mode_conflicts(mode: BattMode, intent: StrategicIntent) -> bool {
    let matches = match intent {
        StrategicIntent::GridCharging => mode == BattMode::BatteryFirst,
        StrategicIntent::ExportArbitrage => mode == BattMode::GridFirst,
        StrategicIntent::LoadSupport => mode == BattMode::LoadFirst,
        StrategicIntent::SolarStorage | StrategicIntent::Idle => true,
    };
    !matches
}
