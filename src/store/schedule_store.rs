#![allow(dead_code)]
//! Stores each Optimization Result with metadata; persists planned intents across restarts
//! (spec §4.6).

use crate::domain::decision::{OptimizationResult, StrategicIntent};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Tomorrow,
    Hourly,
    Restart,
}

pub struct ScheduleEntry {
    pub timestamp: DateTime<FixedOffset>,
    pub optimization_period: u32,
    pub result: OptimizationResult,
    pub scenario: Scenario,
}

#[derive(Default)]
pub struct ScheduleStore {
    entries: Vec<ScheduleEntry>,
    /// Period -> planned intent, persisted across restarts. Cleared at day rollover.
    persisted_intents: BTreeMap<u32, StrategicIntent>,
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&mut self, entry: ScheduleEntry) {
        for period_data in &entry.result.periods {
            self.persisted_intents
                .insert(period_data.period, period_data.decision.strategic_intent);
        }
        self.entries.push(entry);
    }

    pub fn latest(&self) -> Option<&ScheduleEntry> {
        self.entries.last()
    }

    /// Most recent entry whose timestamp is `<= t`.
    pub fn at_time(&self, t: DateTime<FixedOffset>) -> Option<&ScheduleEntry> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.timestamp <= t)
    }

    pub fn all_today(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn by_scenario(&self, scenario: Scenario) -> Vec<&ScheduleEntry> {
        self.entries
            .iter()
            .filter(|e| e.scenario == scenario)
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.persisted_intents.clear();
    }

    /// Recovers a planned intent for `period` from the persisted map, used when the in-memory
    /// store is empty after a restart.
    pub fn persisted_intent(&self, period: u32) -> Option<StrategicIntent> {
        self.persisted_intents.get(&period).copied()
    }

    pub fn persisted_intents(&self) -> &BTreeMap<u32, StrategicIntent> {
        &self.persisted_intents
    }
}
