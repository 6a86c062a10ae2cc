#![allow(dead_code)]
//! Runtime failure tracker: a mutex-guarded, capped ring buffer of recent operation failures
//! (spec §4.15, §5, §7). The one piece of control-loop state read concurrently by the HTTP API.

use crate::error::CoreError;
use chrono::{DateTime, FixedOffset};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

const CAPACITY: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct FailureEntry {
    pub timestamp: DateTime<FixedOffset>,
    pub operation: String,
    pub message: String,
    pub dismissed: bool,
}

#[derive(Default)]
pub struct FailureTracker {
    inner: Mutex<Vec<FailureEntry>>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, timestamp: DateTime<FixedOffset>, operation: impl Into<String>, error: &CoreError) {
        let mut entries = self.inner.lock();
        if entries.len() >= CAPACITY {
            evict_one(&mut entries);
        }
        entries.push(FailureEntry {
            timestamp,
            operation: operation.into(),
            message: error.to_string(),
            dismissed: false,
        });
    }

    pub fn dismiss(&self, index: usize) {
        let mut entries = self.inner.lock();
        if let Some(entry) = entries.get_mut(index) {
            entry.dismissed = true;
        }
    }

    pub fn list(&self) -> Vec<FailureEntry> {
        self.inner.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// FIFO eviction of dismissed entries first; if none are dismissed, evicts the oldest entry.
fn evict_one(entries: &mut Vec<FailureEntry>) {
    if let Some(pos) = entries.iter().position(|e| e.dismissed) {
        entries.remove(pos);
    } else if !entries.is_empty() {
        entries.remove(0);
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DismissRequest {
    pub index: usize,
}
