#![allow(dead_code)]
//! TOU segment type and validation (spec §3 "TOU Segment", §6 "TOU wire format").

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const N_MAX: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BattMode {
    /// Grid-charging is permitted in this segment.
    BatteryFirst,
    /// Discharge to loads is permitted.
    LoadFirst,
    /// Export-oriented discharge is permitted.
    GridFirst,
}

/// An hour-aligned inverter control record. `start_time`/`end_time` are hour-of-day (0..24),
/// `HH:00` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouSegment {
    pub segment_id: u8,
    pub start_hour: u8,
    pub end_hour: u8,
    pub batt_mode: BattMode,
    pub enabled: bool,
}

impl TouSegment {
    pub fn hour_range(&self) -> std::ops::Range<u8> {
        self.start_hour..self.end_hour
    }

    pub fn overlaps(&self, other: &TouSegment) -> bool {
        self.start_hour < other.end_hour && other.start_hour < self.end_hour
    }

    /// Equality on the fields the diff algorithm (spec §4.8) compares: not `segment_id`.
    pub fn matches_content(&self, other: &TouSegment) -> bool {
        self.start_hour == other.start_hour
            && self.end_hour == other.end_hour
            && self.batt_mode == other.batt_mode
            && self.enabled == other.enabled
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TouValidationError {
    #[error("segment_id {0} out of range [1,{N_MAX}]")]
    SegmentIdOutOfRange(u8),
    #[error("segment {segment_id} has start_hour {start} >= end_hour {end}")]
    InvalidWindow {
        segment_id: u8,
        start: u8,
        end: u8,
    },
    #[error("segment {segment_id} hour range extends beyond the day (end_hour {end} > 24)")]
    EndBeyondDay { segment_id: u8, end: u8 },
    #[error("segments {a} and {b} overlap on enabled hours")]
    Overlap { a: u8, b: u8 },
}

/// Validates that the enabled segments among `segments` are pairwise disjoint and within
/// bounds. Disabled segments are exempt from the overlap check (spec §3: "disabled segments
/// are retained to enable safe replacement").
pub fn validate_segments(segments: &[TouSegment]) -> Result<(), TouValidationError> {
    for s in segments {
        if s.segment_id < 1 || s.segment_id > N_MAX {
            return Err(TouValidationError::SegmentIdOutOfRange(s.segment_id));
        }
        if s.start_hour >= s.end_hour {
            return Err(TouValidationError::InvalidWindow {
                segment_id: s.segment_id,
                start: s.start_hour,
                end: s.end_hour,
            });
        }
        if s.end_hour > 24 {
            return Err(TouValidationError::EndBeyondDay {
                segment_id: s.segment_id,
                end: s.end_hour,
            });
        }
    }

    let enabled: Vec<&TouSegment> = segments.iter().filter(|s| s.enabled).collect();
    for i in 0..enabled.len() {
        for j in (i + 1)..enabled.len() {
            if enabled[i].overlaps(enabled[j]) {
                return Err(TouValidationError::Overlap {
                    a: enabled[i].segment_id,
                    b: enabled[j].segment_id,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(id: u8, start: u8, end: u8, mode: BattMode, enabled: bool) -> TouSegment {
        TouSegment {
            segment_id: id,
            start_hour: start,
            end_hour: end,
            batt_mode: mode,
            enabled,
        }
    }

    #[test]
    fn accepts_disjoint_enabled_segments() {
        let segments = vec![
            seg(1, 0, 6, BattMode::BatteryFirst, true),
            seg(2, 6, 24, BattMode::LoadFirst, true),
        ];
        assert!(validate_segments(&segments).is_ok());
    }

    #[test]
    fn rejects_overlapping_enabled_segments() {
        let segments = vec![
            seg(1, 0, 10, BattMode::BatteryFirst, true),
            seg(2, 5, 15, BattMode::LoadFirst, true),
        ];
        assert!(matches!(
            validate_segments(&segments),
            Err(TouValidationError::Overlap { .. })
        ));
    }

    #[test]
    fn disabled_segments_may_overlap_enabled_ones() {
        let segments = vec![
            seg(1, 0, 10, BattMode::BatteryFirst, true),
            seg(2, 5, 15, BattMode::LoadFirst, false),
        ];
        assert!(validate_segments(&segments).is_ok());
    }

    #[test]
    fn rejects_segment_id_out_of_range() {
        let segments = vec![seg(10, 0, 6, BattMode::BatteryFirst, true)];
        assert!(matches!(
            validate_segments(&segments),
            Err(TouValidationError::SegmentIdOutOfRange(10))
        ));
    }

    #[test]
    fn matches_content_ignores_segment_id() {
        let a = seg(1, 0, 6, BattMode::BatteryFirst, true);
        let b = seg(2, 0, 6, BattMode::BatteryFirst, true);
        assert!(a.matches_content(&b));
    }
}
