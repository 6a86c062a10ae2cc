#![allow(dead_code)]
//! Dense per-period store of completed-period Energy Records (spec §4.3).

use crate::domain::energy::EnergyRecord;
use crate::error::{CoreError, CoreResult};

/// Keyed by period index within the current day; `None` for unfilled slots. Cleared by the
/// control loop at day rollover.
#[derive(Debug, Default)]
pub struct HistoricalReadingStore {
    records: Vec<Option<EnergyRecord>>,
}

impl HistoricalReadingStore {
    pub fn new(periods_today: usize) -> Self {
        Self {
            records: vec![None; periods_today],
        }
    }

    /// Resizes the store for a new day's period count. Used by the control loop at midnight
    /// rollover, after `clear()`.
    pub fn resize(&mut self, periods_today: usize) {
        self.records = vec![None; periods_today];
    }

    /// Idempotent-replace: re-recording an already-filled period overwrites it.
    pub fn record(&mut self, p: usize, record: EnergyRecord) -> CoreResult<()> {
        if p >= self.records.len() {
            return Err(CoreError::InvalidInput(format!(
                "period {p} is beyond today's {} periods",
                self.records.len()
            )));
        }
        self.records[p] = Some(record);
        Ok(())
    }

    pub fn get(&self, p: usize) -> Option<&EnergyRecord> {
        self.records.get(p).and_then(|r| r.as_ref())
    }

    pub fn get_today(&self) -> &[Option<EnergyRecord>] {
        &self.records
    }

    pub fn clear(&mut self) {
        for r in &mut self.records {
            *r = None;
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec() -> EnergyRecord {
        EnergyRecord::new(1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 10.0, 10.0, 30.0, 1.0, 1.0).unwrap()
    }

    #[test]
    fn record_then_get_round_trips() {
        let mut store = HistoricalReadingStore::new(96);
        store.record(5, rec()).unwrap();
        assert!(store.get(5).is_some());
        assert!(store.get(6).is_none());
    }

    #[test]
    fn rejects_writes_for_future_periods() {
        let mut store = HistoricalReadingStore::new(96);
        assert!(store.record(96, rec()).is_err());
    }

    #[test]
    fn record_is_idempotent_replace() {
        let mut store = HistoricalReadingStore::new(96);
        store.record(0, rec()).unwrap();
        let rec2 = EnergyRecord::new(2.0, 2.0, 0.0, 0.0, 0.0, 0.0, 10.0, 10.0, 30.0, 1.0, 1.0).unwrap();
        store.record(0, rec2).unwrap();
        assert_eq!(store.get(0).unwrap().solar_production, 2.0);
    }

    #[test]
    fn clear_empties_all_slots() {
        let mut store = HistoricalReadingStore::new(4);
        store.record(0, rec()).unwrap();
        store.clear();
        assert!(store.get_today().iter().all(|r| r.is_none()));
    }
}
