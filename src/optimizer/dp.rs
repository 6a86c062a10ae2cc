#![allow(dead_code)]
//! Backward-value-iteration DP optimizer over a 2D `(soe, cost_basis)` state (spec §4.4).

use crate::domain::battery_settings::BatterySettings;
use crate::domain::decision::{DataSource, DecisionRecord, OptimizationResult, PeriodData, StrategicIntent};
use crate::domain::economic::{EconomicRecord, EconomicSummary};
use crate::domain::energy::EnergyRecord;
use crate::error::{CoreError, CoreResult};
use crate::intent;
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset};

const DT_HOURS: f64 = 0.25;
const EPS: f64 = 1e-6;

pub struct DpInput {
    pub buy_price: Vec<f64>,
    pub sell_price: Vec<f64>,
    pub home_consumption: Vec<f64>,
    pub solar_production: Vec<f64>,
    pub initial_soe: f64,
    pub initial_cost_basis: f64,
    pub battery: BatterySettings,
    /// Period index the first element of every array corresponds to. Only used to number the
    /// returned `PeriodData`; the solver itself is index-agnostic (spec §9).
    pub start_period: u32,
    /// Wall-clock time of `start_period`; successive periods are offset by 15 minutes each.
    pub anchor_timestamp: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    battery_charged: f64,
    battery_discharged: f64,
    grid_imported: f64,
    grid_exported: f64,
    new_soe: f64,
    new_cost_basis: f64,
    reward: f64,
}

/// Computes the transition resulting from net battery action `a` (kWh, signed) taken from
/// `(soe, cost_basis)` at period `t`. Does not check admissibility — callers filter the
/// candidate set themselves.
#[allow(clippy::too_many_arguments)]
fn simulate_action(
    a: f64,
    soe: f64,
    cost_basis: f64,
    buy_price: f64,
    sell_price: f64,
    home_consumption: f64,
    solar_production: f64,
    battery: &BatterySettings,
) -> Transition {
    let soe_min = battery.min_soe_kwh();

    let gross_charge = (a.max(0.0) / battery.efficiency_charge).max(0.0);
    let gross_discharge = ((-a).max(0.0) * battery.efficiency_discharge).max(0.0);

    let net_load = home_consumption + gross_charge - solar_production - gross_discharge;
    let (grid_imported, grid_exported) = if net_load >= 0.0 {
        (net_load, 0.0)
    } else {
        (0.0, -net_load)
    };

    let e_t = (soe - soe_min).max(0.0);
    let c_t = e_t * cost_basis;

    let (new_e, new_c) = if a > EPS {
        let e_in_grid = gross_charge.min(grid_imported).max(0.0);
        let e_in_solar = (gross_charge - e_in_grid).max(0.0);
        let new_c = c_t
            + e_in_grid * buy_price
            + (e_in_solar + e_in_grid) * battery.cycle_cost_per_kwh;
        let new_e = e_t + a;
        (new_e, new_c)
    } else if a < -EPS {
        let avg = c_t / e_t.max(EPS);
        let mut new_c = (c_t - a.abs() * avg).max(0.0);
        let mut new_e = (e_t + a).max(0.0);
        if new_e <= 0.1 {
            new_c = 0.0;
            new_e = new_e.max(0.0);
        }
        (new_e, new_c)
    } else {
        (e_t, c_t)
    };

    let new_cost_basis = if new_e <= EPS {
        battery.cycle_cost_per_kwh
    } else {
        new_c / new_e
    };

    let reward = -grid_imported * buy_price + grid_exported * sell_price;

    Transition {
        battery_charged: gross_charge,
        battery_discharged: gross_discharge,
        grid_imported,
        grid_exported,
        new_soe: soe + a,
        new_cost_basis,
        reward,
    }
}

/// Discharge is admissible only if the marginal benefit (sell price when the energy is
/// exported, buy price when it offsets load) strictly exceeds the sum of cost basis and cycle
/// cost — otherwise the battery would be discharging energy worth more than what it earns
/// (spec §8 economic-correctness property, literal inequality).
fn discharge_is_justified(
    transition: &Transition,
    cost_basis: f64,
    cycle_cost_per_kwh: f64,
    buy_price: f64,
    sell_price: f64,
) -> bool {
    let floor = cost_basis + cycle_cost_per_kwh;
    if transition.grid_exported > EPS {
        sell_price > floor
    } else {
        buy_price > floor
    }
}

fn candidate_actions(charge_max: f64, discharge_max: f64, step: f64) -> Vec<f64> {
    let mut actions = vec![0.0];
    if step <= 0.0 {
        return actions;
    }
    let mut a = step;
    while a <= charge_max + EPS {
        actions.push(a.min(charge_max));
        a += step;
    }
    let mut a = step;
    while a <= discharge_max + EPS {
        actions.push(-a.min(discharge_max));
        a += step;
    }
    actions
}

pub fn optimize(input: &DpInput) -> CoreResult<OptimizationResult> {
    let h = input.buy_price.len();
    if h == 0 {
        return Err(CoreError::InvalidInput("horizon H is 0".into()));
    }
    for (name, len) in [
        ("sell_price", input.sell_price.len()),
        ("home_consumption", input.home_consumption.len()),
        ("solar_production", input.solar_production.len()),
    ] {
        if len != h {
            return Err(CoreError::InvalidInput(format!(
                "array length mismatch: {name} has {len}, expected {h}"
            )));
        }
    }

    let battery = input.battery;
    let soe_min = battery.min_soe_kwh();
    let soe_max = battery.max_soe_kwh();
    if input.initial_soe < soe_min - EPS || input.initial_soe > soe_max + EPS {
        return Err(CoreError::InvalidInput(format!(
            "initial_soe {} outside [{soe_min}, {soe_max}]",
            input.initial_soe
        )));
    }

    let delta_soe = 0.1_f64.min(battery.capacity_kwh / 100.0).max(0.01);
    let n_soe = (((soe_max - soe_min) / delta_soe).round() as usize).max(1) + 1;
    let soe_grid: Vec<f64> = (0..n_soe)
        .map(|i| (soe_min + i as f64 * delta_soe).min(soe_max))
        .collect();

    let buy_price_max = input.buy_price.iter().cloned().fold(0.0_f64, f64::max);
    let cb_max = buy_price_max + battery.cycle_cost_per_kwh;
    let delta_cb = 0.01_f64;
    let n_cb = (((cb_max / delta_cb).round() as usize).max(1)) + 1;
    let cb_grid: Vec<f64> = (0..n_cb).map(|j| (j as f64 * delta_cb).min(cb_max)).collect();

    let snap_soe = |soe: f64| -> usize {
        (((soe - soe_min) / delta_soe).round() as isize)
            .clamp(0, n_soe as isize - 1) as usize
    };
    let snap_cb = |cb: f64| -> usize {
        ((cb / delta_cb).round() as isize).clamp(0, n_cb as isize - 1) as usize
    };

    // value[t][soe_idx][cb_idx]
    let mut value: Vec<Vec<Vec<f64>>> = vec![vec![vec![0.0; n_cb]; n_soe]; h + 1];
    // best_action[t][soe_idx][cb_idx]
    let mut best_action: Vec<Vec<Vec<f64>>> = vec![vec![vec![0.0; n_cb]; n_soe]; h];

    for t in (0..h).rev() {
        let buy = input.buy_price[t];
        let sell = input.sell_price[t];
        let load = input.home_consumption[t];
        let solar = input.solar_production[t];

        for si in 0..n_soe {
            let soe = soe_grid[si];
            let charge_max = (battery.max_charge_power_kw * DT_HOURS)
                .min(soe_max - soe)
                .max(0.0);
            let discharge_max = (battery.max_discharge_power_kw * DT_HOURS)
                .min(soe - soe_min)
                .max(0.0);
            let actions = candidate_actions(charge_max, discharge_max, delta_soe);

            for ci in 0..n_cb {
                let cb = cb_grid[ci];

                let mut best_value = f64::NEG_INFINITY;
                let mut best_a = 0.0_f64;
                let mut best_next_soe_idx = si;
                let mut best_cycles = f64::INFINITY;

                for &a in &actions {
                    let transition =
                        simulate_action(a, soe, cb, buy, sell, load, solar, &battery);

                    if a < -EPS
                        && !discharge_is_justified(
                            &transition,
                            cb,
                            battery.cycle_cost_per_kwh,
                            buy,
                            sell,
                        )
                    {
                        continue;
                    }

                    let next_soe_idx = snap_soe(transition.new_soe);
                    let next_cb_idx = snap_cb(transition.new_cost_basis);
                    let candidate_value =
                        transition.reward + value[t + 1][next_soe_idx][next_cb_idx];

                    let cycles = a.abs();
                    let is_better = candidate_value > best_value + 1e-9
                        || (candidate_value > best_value - 1e-9
                            && tie_break_prefers(
                                next_soe_idx,
                                cycles,
                                a,
                                best_next_soe_idx,
                                best_cycles,
                                best_a,
                            ));

                    if is_better {
                        best_value = candidate_value;
                        best_a = a;
                        best_next_soe_idx = next_soe_idx;
                        best_cycles = cycles;
                    }
                }

                value[t][si][ci] = best_value;
                best_action[t][si][ci] = best_a;
            }
        }
    }

    // Forward trace from the actual (continuous) initial state.
    let mut soe = input.initial_soe;
    let mut cost_basis = input.initial_cost_basis;
    let mut periods = Vec::with_capacity(h);
    let mut economic_records = Vec::with_capacity(h);
    let mut total_charged = 0.0;
    let mut total_discharged = 0.0;

    for t in 0..h {
        let si = snap_soe(soe);
        let ci = snap_cb(cost_basis);
        let a = best_action[t][si][ci];

        let buy = input.buy_price[t];
        let sell = input.sell_price[t];
        let load = input.home_consumption[t];
        let solar = input.solar_production[t];

        let transition = simulate_action(a, soe, cost_basis, buy, sell, load, solar, &battery);

        let soe_start = soe;
        let soe_end = transition.new_soe.clamp(soe_min, soe_max);

        let energy = EnergyRecord::new(
            solar,
            load,
            transition.battery_charged,
            transition.battery_discharged,
            transition.grid_imported,
            transition.grid_exported,
            soe_start,
            soe_end,
            battery.capacity_kwh,
            battery.efficiency_charge,
            battery.efficiency_discharge,
        )
        .map_err(|e| CoreError::InvalidInput(format!("period {t}: {e}")))?;

        let economic = EconomicRecord::new(
            solar,
            load,
            transition.grid_imported,
            transition.grid_exported,
            buy,
            sell,
        );

        let strategic_intent = intent::classify(&energy, a);

        let decision = DecisionRecord {
            strategic_intent,
            battery_action: a,
            observed_intent: None,
        };

        let timestamp = input.anchor_timestamp + ChronoDuration::minutes(15 * t as i64);

        total_charged += transition.battery_charged;
        total_discharged += transition.battery_discharged;
        economic_records.push(economic);
        periods.push(PeriodData {
            period: input.start_period + t as u32,
            energy,
            economic,
            decision,
            timestamp,
            data_source: DataSource::Predicted,
        });

        soe = soe_end;
        cost_basis = transition.new_cost_basis;
    }

    let summary = EconomicSummary::from_records(&economic_records, total_charged, total_discharged);

    Ok(OptimizationResult { periods, summary })
}

#[allow(clippy::too_many_arguments)]
fn tie_break_prefers(
    candidate_soe_idx: usize,
    candidate_cycles: f64,
    candidate_a: f64,
    best_soe_idx: usize,
    best_cycles: f64,
    best_a: f64,
) -> bool {
    if candidate_soe_idx != best_soe_idx {
        return candidate_soe_idx > best_soe_idx;
    }
    if (candidate_cycles - best_cycles).abs() > EPS {
        return candidate_cycles < best_cycles;
    }
    candidate_a.abs() < best_a.abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decision::StrategicIntent;
    use chrono::TimeZone;

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

    #[test]
    fn rejects_zero_horizon() {
        let input = DpInput {
            buy_price: vec![],
            sell_price: vec![],
            home_consumption: vec![],
            solar_production: vec![],
            initial_soe: 15.0,
            initial_cost_basis: 0.4,
            battery: battery(),
            start_period: 0,
            anchor_timestamp: anchor(),
        };
        assert!(matches!(optimize(&input), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn rejects_mismatched_array_lengths() {
        let input = DpInput {
            buy_price: vec![1.0, 1.0],
            sell_price: vec![1.0],
            home_consumption: vec![1.0, 1.0],
            solar_production: vec![0.0, 0.0],
            initial_soe: 15.0,
            initial_cost_basis: 0.4,
            battery: battery(),
            start_period: 0,
            anchor_timestamp: anchor(),
        };
        assert!(matches!(optimize(&input), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn rejects_out_of_range_initial_soe() {
        let input = DpInput {
            buy_price: vec![1.0, 1.0],
            sell_price: vec![1.0, 1.0],
            home_consumption: vec![1.0, 1.0],
            solar_production: vec![0.0, 0.0],
            initial_soe: 99999.0,
            initial_cost_basis: 0.4,
            battery: battery(),
            start_period: 0,
            anchor_timestamp: anchor(),
        };
        assert!(matches!(optimize(&input), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn flat_prices_yield_zero_charge_and_discharge() {
        let h = 8;
        let input = DpInput {
            buy_price: vec![1.0; h],
            sell_price: vec![1.0; h],
            home_consumption: vec![1.0; h],
            solar_production: vec![0.0; h],
            initial_soe: battery().min_soe_kwh(),
            initial_cost_basis: 0.4,
            battery: battery(),
            start_period: 0,
            anchor_timestamp: anchor(),
        };
        let result = optimize(&input).unwrap();
        let total_charge: f64 = result.periods.iter().map(|p| p.energy.battery_charged).sum();
        let total_discharge: f64 = result
            .periods
            .iter()
            .map(|p| p.energy.battery_discharged)
            .sum();
        assert!(total_charge < 1e-6);
        assert!(total_discharge < 1e-6);
    }

    #[test]
    fn high_spread_prices_produce_charge_low_and_discharge_high() {
        let buy = vec![0.1, 0.1, 0.1, 2.0, 2.0, 2.0, 2.0, 2.0];
        let h = buy.len();
        let input = DpInput {
            buy_price: buy.clone(),
            sell_price: buy,
            home_consumption: vec![2.0; h],
            solar_production: vec![0.0; h],
            initial_soe: 3.0,
            initial_cost_basis: 0.0,
            battery: battery(),
            start_period: 0,
            anchor_timestamp: anchor(),
        };
        let result = optimize(&input).unwrap();
        let total_charge: f64 = result.periods.iter().map(|p| p.energy.battery_charged).sum();
        let total_discharge: f64 = result
            .periods
            .iter()
            .map(|p| p.energy.battery_discharged)
            .sum();
        assert!(total_charge > 0.0);
        assert!(total_discharge > 0.0);
        assert!(result.summary.battery_solar_cost <= result.summary.grid_only_cost + 1e-6);
    }

    #[test]
    fn battery_solar_cost_never_exceeds_baselines() {
        let buy = vec![0.3, 1.5, 0.2, 1.8, 0.25, 1.2, 0.4, 0.9];
        let h = buy.len();
        let input = DpInput {
            buy_price: buy.clone(),
            sell_price: buy,
            home_consumption: vec![3.0; h],
            solar_production: vec![1.0; h],
            initial_soe: 10.0,
            initial_cost_basis: 0.3,
            battery: battery(),
            start_period: 0,
            anchor_timestamp: anchor(),
        };
        let result = optimize(&input).unwrap();
        assert!(result.summary.battery_solar_cost <= result.summary.solar_only_cost + 1e-6);
        assert!(result.summary.solar_only_cost <= result.summary.grid_only_cost + 1e-6);
    }

    #[test]
    fn running_optimizer_twice_is_deterministic() {
        let buy = vec![0.3, 1.5, 0.2, 1.8, 0.25, 1.2, 0.4, 0.9];
        let h = buy.len();
        let make_input = || DpInput {
            buy_price: buy.clone(),
            sell_price: buy.clone(),
            home_consumption: vec![3.0; h],
            solar_production: vec![1.0; h],
            initial_soe: 10.0,
            initial_cost_basis: 0.3,
            battery: battery(),
            start_period: 0,
            anchor_timestamp: anchor(),
        };
        let a = optimize(&make_input()).unwrap();
        let b = optimize(&make_input()).unwrap();
        for (pa, pb) in a.periods.iter().zip(b.periods.iter()) {
            assert_eq!(pa.decision.battery_action, pb.decision.battery_action);
            assert_eq!(pa.energy.battery_charged, pb.energy.battery_charged);
        }
    }

    #[test]
    fn never_discharges_purely_below_cost_basis_floor() {
        // Cost basis starts high; buy/sell prices stay below it throughout. No discharge
        // should ever be chosen since it would never clear the guard.
        let h = 6;
        let input = DpInput {
            buy_price: vec![0.1; h],
            sell_price: vec![0.1; h],
            home_consumption: vec![2.0; h],
            solar_production: vec![0.0; h],
            initial_soe: 20.0,
            initial_cost_basis: 5.0,
            battery: battery(),
            start_period: 0,
            anchor_timestamp: anchor(),
        };
        let result = optimize(&input).unwrap();
        let total_discharge: f64 = result
            .periods
            .iter()
            .map(|p| p.energy.battery_discharged)
            .sum();
        assert!(total_discharge < 1e-6);
    }

    #[test]
    fn idle_periods_classify_as_idle_intent() {
        let h = 4;
        let input = DpInput {
            buy_price: vec![1.0; h],
            sell_price: vec![1.0; h],
            home_consumption: vec![1.0; h],
            solar_production: vec![0.0; h],
            initial_soe: battery().min_soe_kwh(),
            initial_cost_basis: 0.4,
            battery: battery(),
            start_period: 0,
            anchor_timestamp: anchor(),
        };
        let result = optimize(&input).unwrap();
        assert!(result
            .periods
            .iter()
            .all(|p| p.decision.strategic_intent == StrategicIntent::Idle));
    }
}
