#![allow(dead_code)]
//! Computes the minimal set of inverter writes to move from the schedule currently believed
//! to be on the inverter to a newly compiled one (spec §4.8).

use super::segment::TouSegment;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleDiff {
    pub to_disable: Vec<TouSegment>,
    pub to_update: Vec<TouSegment>,
}

/// `current`/`new` are the full segment lists (enabled and disabled); `effective_hour` is the
/// current period's hour — segments entirely before it are left untouched.
pub fn diff_schedule(current: &[TouSegment], new: &[TouSegment], effective_hour: u8) -> ScheduleDiff {
    // Rule 1: full clear.
    if new.is_empty() && !current.is_empty() {
        let to_disable = current.iter().filter(|s| s.enabled).copied().collect();
        return ScheduleDiff {
            to_disable,
            to_update: Vec::new(),
        };
    }

    let touches_horizon = |s: &TouSegment| s.end_hour > effective_hour;

    // Rule 2: disable current segments in the horizon with no content match in `new`.
    let mut to_disable: Vec<TouSegment> = current
        .iter()
        .filter(|s| touches_horizon(s))
        .filter(|s| !new.iter().any(|n| n.matches_content(s)))
        .copied()
        .collect();

    // Rule 3: update new segments in the horizon with no content match in `current`.
    let to_update: Vec<TouSegment> = new
        .iter()
        .filter(|s| touches_horizon(s))
        .filter(|s| !current.iter().any(|c| c.matches_content(s)))
        .copied()
        .collect();

    // Rule 4: overlap resolution — any still-enabled current segment overlapping a pending
    // update that isn't already slated for disable gets added to `to_disable`.
    for update in &to_update {
        for cur in current {
            if cur.enabled
                && cur.overlaps(update)
                && !to_disable.iter().any(|d| d.segment_id == cur.segment_id)
            {
                to_disable.push(*cur);
            }
        }
    }

    ScheduleDiff {
        to_disable,
        to_update,
    }
}
