//! End-to-end scenario and property tests over the public optimizer/TOU/control-loop surface
//! (testable properties and lettered scenarios from the governing specification's §8).

use bess_scheduler::control_loop::{ControlLoop, HomeFallback};
use bess_scheduler::domain::{BatterySettings, StrategicIntent};
use bess_scheduler::failure_tracker::FailureTracker;
use bess_scheduler::optimizer::{optimize, DpInput};
use bess_scheduler::ports::testing::{
    NullHistoricalQuery, SimulatedInverterController, SimulatedPriceSource, SimulatedSensorSource,
};
use bess_scheduler::time_grid::TimeGrid;
use bess_scheduler::tou::{compile_tou, diff_schedule, validate_segments, BattMode, TouSegment};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use chrono_tz::Europe::Stockholm;
use proptest::prelude::*;
use std::sync::Arc;

fn battery() -> BatterySettings {
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

fn anchor() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(3600)
        .unwrap()
        .with_ymd_and_hms(2024, 6, 1, 0, 0, 0)
        .unwrap()
}

fn expand_hourly(hourly: &[f64]) -> Vec<f64> {
    hourly
        .iter()
        .flat_map(|&v| std::iter::repeat(v).take(4))
        .collect()
}

/// Runs the optimizer with the battery's initial cost basis set to the mean buy price over the
/// horizon. For a battery starting above its floor SoC with no specific charging history (as in
/// a standalone scenario test), this is the natural stand-in for the real-system convention of
/// deriving cost basis from a weighted average of actually-paid prices: it represents "this
/// energy was probably acquired at around the going rate", not the theoretical minimum cycle
/// cost. At floor SoC this value is moot (there is no pre-existing energy to price).
fn run(buy: &[f64], sell: &[f64], consumption: &[f64], solar: &[f64], initial_soc: f64) -> bess_scheduler::domain::OptimizationResult {
    let b = battery();
    let initial_cost_basis = buy.iter().sum::<f64>() / buy.len() as f64;
    let input = DpInput {
        buy_price: buy.to_vec(),
        sell_price: sell.to_vec(),
        home_consumption: consumption.to_vec(),
        solar_production: solar.to_vec(),
        initial_soe: b.soc_to_soe_kwh(initial_soc),
        initial_cost_basis,
        battery: b,
        start_period: 0,
        anchor_timestamp: anchor(),
    };
    optimize(&input).unwrap()
}

/// Relative tolerance check: `actual` within `rel_tol` fraction of `expected`.
fn approx(actual: f64, expected: f64, rel_tol: f64) -> bool {
    (actual - expected).abs() <= expected.abs() * rel_tol
}

/// Sum of `home_consumption[t] * buy_price[t]` over the horizon — the closed-form
/// grid-only-cost baseline, computed independently of the optimizer.
fn grid_only_cost(buy: &[f64], consumption: &[f64]) -> f64 {
    buy.iter().zip(consumption).map(|(p, c)| p * c).sum()
}

// ---- universal invariants (spec §8 invariants 1-6) ----

#[test]
fn every_period_satisfies_energy_conservation_and_soe_bounds() {
    let buy = expand_hourly(&[
        0.98, 0.84, 0.03, 0.01, 0.01, 0.91, 1.44, 1.52, 1.40, 1.13, 0.86, 0.65, 0.29, 0.14, 0.13,
        0.62, 0.89, 1.17, 1.52, 2.59, 2.73, 1.93, 1.51, 1.31,
    ]);
    let consumption = vec![1.3; 96];
    let solar = vec![0.0; 96];
    let result = run(&buy, &buy, &consumption, &solar, 50.0);

    let b = battery();
    for pd in &result.periods {
        assert!(pd.energy.invariants_hold(), "period {} violates conservation", pd.period);
        assert!(pd.energy.battery_soe_end >= b.min_soe_kwh() - 1e-6);
        assert!(pd.energy.battery_soe_end <= b.max_soe_kwh() + 1e-6);
        assert!(pd.energy.battery_soe_start >= b.min_soe_kwh() - 1e-6);
        assert!(pd.energy.battery_soe_start <= b.max_soe_kwh() + 1e-6);
    }
}

#[test]
fn doing_nothing_never_costs_more_than_the_grid_only_baseline() {
    // For any price/consumption/solar shape, action=0 is always a candidate, so the optimizer's
    // realized cost can never exceed the grid-only baseline.
    let buy = expand_hourly(&[
        0.36, 0.30, 0.29, 0.35, 0.39, 0.41, 0.41, 0.42, 0.45, 0.61, 0.79, 0.92, 0.83, 0.78, 1.07,
        1.33, 1.49, 1.58, 1.68, 1.61, 1.51, 1.28, 0.83, 0.48,
    ]);
    let consumption = vec![1.1; 96];
    let solar = vec![0.0; 96];
    let result = run(&buy, &buy, &consumption, &solar, 40.0);
    assert!(result.summary.battery_solar_cost <= result.summary.grid_only_cost + 1e-6);
    assert!(result.summary.battery_solar_cost <= result.summary.solar_only_cost + 1e-6);
}

// ---- round-trip / idempotence ----

#[test]
fn time_grid_period_timestamp_round_trip_holds_on_an_arbitrary_day() {
    let grid = TimeGrid::new(Stockholm);
    let today = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
    let periods_today = grid.periods_in_day(today);
    for p in 0..periods_today {
        let ts = grid.period_to_timestamp(p, today).unwrap();
        assert_eq!(grid.timestamp_to_period(ts, today).unwrap(), p);
    }
}

#[test]
fn compiling_the_same_intents_twice_yields_identical_segments() {
    let intents = vec![StrategicIntent::GridCharging; 4 * 3]
        .into_iter()
        .chain(vec![StrategicIntent::Idle; 4 * 10])
        .chain(vec![StrategicIntent::ExportArbitrage; 4 * 11])
        .collect::<Vec<_>>();
    let first = compile_tou(&intents).unwrap();
    let second = compile_tou(&intents).unwrap();
    assert_eq!(first, second);

    // Round-tripping the compiled schedule through a simulated inverter and diffing it against
    // itself produces no writes.
    let diff = diff_schedule(&first, &second, 0);
    assert!(diff.to_disable.is_empty());
    assert!(diff.to_update.is_empty());
}

#[test]
fn running_the_optimizer_twice_on_identical_inputs_is_bitwise_deterministic() {
    let buy = expand_hourly(&[
        0.48, 0.45, 0.45, 0.44, 0.43, 0.42, 0.43, 0.81, 1.18, 0.65, 0.45, 0.44, 0.43, 0.43, 0.41,
        0.40, 0.40, 0.40, 0.38, 0.35, 0.07, 0.02, 0.02, 0.00,
    ]);
    let consumption = vec![1.0; 96];
    let solar = vec![0.0; 96];
    let a = run(&buy, &buy, &consumption, &solar, 60.0);
    let b = run(&buy, &buy, &consumption, &solar, 60.0);
    for (pa, pb) in a.periods.iter().zip(b.periods.iter()) {
        assert_eq!(pa.decision.battery_action, pb.decision.battery_action);
        assert_eq!(pa.energy.battery_charged, pb.energy.battery_charged);
        assert_eq!(pa.energy.battery_discharged, pb.energy.battery_discharged);
    }
    assert_eq!(a.summary.battery_solar_cost, b.summary.battery_solar_cost);
}

// ---- economic properties (proptest) ----

proptest! {
    #[test]
    fn flat_prices_never_produce_battery_activity(price in 0.05f64..3.0, consumption in 0.1f64..4.0) {
        // Starting exactly at the floor SoC removes any pre-existing energy the battery could
        // cash in regardless of price shape; with nothing stored and a flat price, charging can
        // never be recovered at a higher price later, so the optimal policy is to stay put.
        let h = 24;
        let buy = vec![price; h];
        let consumption_v = vec![consumption; h];
        let solar = vec![0.0; h];
        let result = run(&buy, &buy, &consumption_v, &solar, battery().min_soe_percent);
        let total_charge: f64 = result.periods.iter().map(|p| p.energy.battery_charged).sum();
        let total_discharge: f64 = result.periods.iter().map(|p| p.energy.battery_discharged).sum();
        prop_assert!(total_charge < 1e-6);
        prop_assert!(total_discharge < 1e-6);
    }

    #[test]
    fn baseline_costs_are_always_ordered(
        base_price in 0.1f64..2.0,
        spread in 0.0f64..2.0,
        consumption in 0.5f64..5.0,
        solar in 0.0f64..4.0,
    ) {
        let h = 16;
        let buy: Vec<f64> = (0..h)
            .map(|i| base_price + spread * ((i % 2) as f64))
            .collect();
        let consumption_v = vec![consumption; h];
        let solar_v = vec![solar; h];
        let result = run(&buy, &buy, &consumption_v, &solar_v, 50.0);
        prop_assert!(result.summary.battery_solar_cost <= result.summary.solar_only_cost + 1e-6);
        prop_assert!(result.summary.solar_only_cost <= result.summary.grid_only_cost + 1e-6);
    }
}

// ---- schedule-diff properties ----

#[test]
fn empty_new_schedule_disables_every_enabled_current_segment() {
    let current = compile_tou(&vec![StrategicIntent::ExportArbitrage; 96]).unwrap();
    assert!(!current.is_empty());
    let diff = diff_schedule(&current, &[], 0);
    assert_eq!(diff.to_disable.len(), current.iter().filter(|s| s.enabled).count());
    assert!(diff.to_update.is_empty());
}

#[test]
fn identical_compiled_schedules_produce_no_diff() {
    let intents = vec![StrategicIntent::LoadSupport; 96];
    let current = compile_tou(&intents).unwrap();
    let new = compile_tou(&intents).unwrap();
    let diff = diff_schedule(&current, &new, 0);
    assert!(diff.to_disable.is_empty());
    assert!(diff.to_update.is_empty());
}

#[test]
fn to_update_never_leaves_a_still_enabled_overlapping_segment_behind() {
    let current = compile_tou(&vec![StrategicIntent::Idle; 96]).unwrap();
    let new = compile_tou(&vec![StrategicIntent::GridCharging; 4 * 6].into_iter().chain(vec![StrategicIntent::Idle; 4 * 18]).collect::<Vec<_>>()).unwrap();
    let diff = diff_schedule(&current, &new, 0);
    for update in &diff.to_update {
        let still_overlapping_enabled = current.iter().any(|c| {
            c.enabled && c.overlaps(update) && !diff.to_disable.iter().any(|d| d.segment_id == c.segment_id)
        });
        assert!(!still_overlapping_enabled);
    }
}

// ---- lettered scenarios (spec §8) ----

#[test]
fn scenario_a_high_spread_arbitrage_produces_material_savings() {
    let buy = expand_hourly(&[
        0.98, 0.84, 0.03, 0.01, 0.01, 0.91, 1.44, 1.52, 1.40, 1.13, 0.86, 0.65, 0.29, 0.14, 0.13,
        0.62, 0.89, 1.17, 1.52, 2.59, 2.73, 1.93, 1.51, 1.31,
    ]);
    let consumption = vec![1.3; 96];
    let solar = vec![0.0; 96];
    let result = run(&buy, &buy, &consumption, &solar, 50.0);

    let expected_grid_only = grid_only_cost(&buy, &consumption);
    assert!((result.summary.grid_only_cost - expected_grid_only).abs() < 1e-6);
    assert!(
        approx(result.summary.grid_only_cost, 127.95, 0.01),
        "grid_only_cost: expected ~127.95, got {}",
        result.summary.grid_only_cost
    );
    assert!(
        approx(result.summary.battery_solar_cost, 85.44, 0.01),
        "battery_solar_cost: expected ~85.44, got {}",
        result.summary.battery_solar_cost
    );

    let savings = result.summary.grid_only_cost - result.summary.battery_solar_cost;
    assert!(approx(savings, 42.51, 0.01), "savings: expected ~42.51, got {savings}");

    let total_charge: f64 = result.periods.iter().map(|p| p.energy.battery_charged).sum();
    let total_discharge: f64 = result.periods.iter().map(|p| p.energy.battery_discharged).sum();
    assert!(approx(total_charge, 27.0, 0.01), "total_charge: expected ~27, got {total_charge}");
    assert!(
        approx(total_discharge, 27.0, 0.01),
        "total_discharge: expected ~27, got {total_discharge}"
    );
}

#[test]
fn scenario_b_low_spread_prices_never_cost_more_than_grid_only() {
    let buy = expand_hourly(&[
        0.78, 0.79, 0.80, 0.83, 0.95, 0.97, 1.16, 1.17, 1.22, 1.28, 1.21, 1.30, 1.20, 1.13, 0.98,
        0.74, 0.73, 0.95, 0.92, 0.74, 0.53, 0.53, 0.50, 0.40,
    ]);
    let consumption = vec![1.3; 96];
    let solar = vec![0.0; 96];
    let result = run(&buy, &buy, &consumption, &solar, 50.0);

    // The price spread never clears cost_basis (mean buy price) + cycle cost anywhere in the
    // horizon, so no discharge is ever admissible and the optimizer falls back to doing nothing.
    assert!(
        (result.summary.battery_solar_cost - result.summary.grid_only_cost).abs() < 1e-6,
        "expected optimized_cost == grid_only_cost, got {} vs {}",
        result.summary.battery_solar_cost,
        result.summary.grid_only_cost
    );
    let total_charge: f64 = result.periods.iter().map(|p| p.energy.battery_charged).sum();
    let total_discharge: f64 = result.periods.iter().map(|p| p.energy.battery_discharged).sum();
    assert!(total_charge < 1e-6, "expected zero charge, got {total_charge}");
    assert!(total_discharge < 1e-6, "expected zero discharge, got {total_discharge}");
}

#[test]
fn scenario_c_evening_peak_produces_moderate_savings_from_early_charging() {
    let buy = expand_hourly(&[
        0.36, 0.30, 0.29, 0.35, 0.39, 0.41, 0.41, 0.42, 0.45, 0.61, 0.79, 0.92, 0.83, 0.78, 1.07,
        1.33, 1.49, 1.58, 1.68, 1.61, 1.51, 1.28, 0.83, 0.48,
    ]);
    let consumption = vec![1.3; 96];
    let solar = vec![0.0; 96];
    let result = run(&buy, &buy, &consumption, &solar, 50.0);

    let savings = result.summary.grid_only_cost - result.summary.battery_solar_cost;
    assert!(approx(savings, 22.54, 0.1), "savings: expected ~22.54, got {savings}");

    // Charging concentrated in the cheap early/overnight hours.
    let early_charge: f64 = result.periods[0..4 * 9]
        .iter()
        .map(|p| p.energy.battery_charged)
        .sum();
    assert!(early_charge > 0.0);

    // Discharge concentrated in the evening peak, hours 15-19.
    let peak_discharge: f64 = result.periods[4 * 15..4 * 19]
        .iter()
        .map(|p| p.energy.battery_discharged)
        .sum();
    let total_discharge: f64 = result.periods.iter().map(|p| p.energy.battery_discharged).sum();
    assert!(
        peak_discharge >= 0.5 * total_discharge,
        "expected discharge concentrated in hours 15-19, got {peak_discharge} of {total_discharge} total"
    );
}

#[test]
fn scenario_d_shallow_night_dip_produces_small_savings() {
    let buy = expand_hourly(&[
        0.48, 0.45, 0.45, 0.44, 0.43, 0.42, 0.43, 0.81, 1.18, 0.65, 0.45, 0.44, 0.43, 0.43, 0.41,
        0.40, 0.40, 0.40, 0.38, 0.35, 0.07, 0.02, 0.02, 0.00,
    ]);
    let consumption = vec![1.3; 96];
    let solar = vec![0.0; 96];
    let result = run(&buy, &buy, &consumption, &solar, 50.0);

    let savings = result.summary.grid_only_cost - result.summary.battery_solar_cost;
    assert!(approx(savings, 1.20, 0.2), "savings: expected ~1.20 (small window), got {savings}");
}

#[test]
fn scenario_e_spring_forward_day_compiles_a_short_day_into_a_valid_schedule() {
    let grid = TimeGrid::new(Stockholm);
    let date = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
    let periods_today = grid.periods_in_day(date);
    assert_eq!(periods_today, 92);

    let h = periods_today as usize;
    let buy: Vec<f64> = (0..h).map(|i| 0.5 + 0.4 * ((i % 8) as f64 / 8.0)).collect();
    let consumption = vec![1.0; h];
    let solar = vec![0.0; h];

    let anchor_ts = grid.period_to_timestamp(0, date).unwrap().fixed_offset();
    let b = battery();
    let input = DpInput {
        buy_price: buy.clone(),
        sell_price: buy,
        home_consumption: consumption,
        solar_production: solar,
        initial_soe: b.soc_to_soe_kwh(50.0),
        initial_cost_basis: b.cycle_cost_per_kwh,
        battery: b,
        start_period: 0,
        anchor_timestamp: anchor_ts,
    };
    let result = optimize(&input).unwrap();
    assert_eq!(result.periods.len(), 92);

    let intents: Vec<StrategicIntent> = result.periods.iter().map(|p| p.decision.strategic_intent).collect();
    let segments = compile_tou(&intents).unwrap();
    assert!(segments.len() <= 9);
    let total_hours: u8 = segments.iter().map(|s| s.end_hour - s.start_hour).sum();
    assert_eq!(total_hours, 23);
    assert!(validate_segments(&segments).is_ok());
}

#[tokio::test]
async fn scenario_f_stale_inverter_schedule_is_detected_and_cleared_on_an_idle_day() {
    let tz = Stockholm;
    let time_grid = TimeGrid::new(tz);
    let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let b = battery();

    // Nine stale, mutually overlapping enabled segments: a corrupt prior schedule.
    let stale: Vec<TouSegment> = (1..=9u8)
        .map(|id| TouSegment {
            segment_id: id,
            start_hour: 0,
            end_hour: 24,
            batt_mode: BattMode::LoadFirst,
            enabled: true,
        })
        .collect();
    assert!(validate_segments(&stale).is_err());

    let inverter = Arc::new(SimulatedInverterController::new(b.min_soe_percent));
    inverter.seed_segments(stale);
    let sensors = Arc::new(SimulatedSensorSource::new());
    let price_source = Arc::new(SimulatedPriceSource::new());
    price_source.seed(today, vec![0.5; 96]);
    let failures = Arc::new(FailureTracker::new());
    let home_fallback = HomeFallback {
        hourly_consumption_kwh: [0.0; 24],
    };

    let mut control_loop = ControlLoop::new(
        time_grid,
        b,
        bess_scheduler::domain::PriceModel {
            markup_rate: 0.0,
            vat_multiplier: 1.0,
            additional_costs: 0.0,
            tax_reduction: 0.0,
        },
        home_fallback,
        inverter,
        sensors,
        Arc::new(NullHistoricalQuery),
        price_source,
        failures,
        today,
    );

    control_loop.start().await.unwrap();
    assert!(control_loop.corruption_detected());
    assert_eq!(control_loop.current_tou().len(), 9);

    let before = control_loop.current_tou().to_vec();
    let diff = diff_schedule(&before, &[], 0);
    assert_eq!(diff.to_disable.len(), 9);
    assert!(diff.to_update.is_empty());

    control_loop.tick(0, false).await.unwrap();
    assert!(!control_loop.corruption_detected());
    assert!(control_loop.current_tou().is_empty());
}
