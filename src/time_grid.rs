#![allow(dead_code)]
//! Period index <-> wall-clock time, DST-aware.
//!
//! A period is a continuous integer `p >= 0`; `p = 0` is today 00:00 local time in a fixed
//! IANA timezone. A day contains 92, 96, or 100 periods depending on whether it is a
//! spring-forward, ordinary, or fall-back day.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone};
use chrono_tz::Tz;

const PERIOD_MINUTES: i64 = 15;

#[derive(Debug, Clone)]
pub struct TimeGrid {
    tz: Tz,
}

impl TimeGrid {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Number of quarter-hour periods in `date`'s civil day in this timezone.
    /// 92 on spring-forward days, 100 on fall-back days, 96 otherwise.
    pub fn periods_in_day(&self, date: NaiveDate) -> u32 {
        let midnight_today = local_midnight(self.tz, date);
        let midnight_tomorrow = local_midnight(self.tz, date.succ_opt().expect("date overflow"));
        let civil_hours = (midnight_tomorrow - midnight_today).num_minutes() as f64 / 60.0;
        (civil_hours * 4.0).round() as u32
    }

    /// Convert a timezone-aware instant to a period index relative to today 00:00 local.
    /// Rejects anything earlier than today or later than end-of-tomorrow.
    pub fn timestamp_to_period(&self, dt: DateTime<Tz>, today: NaiveDate) -> CoreResult<u32> {
        let midnight_today = local_midnight(self.tz, today);
        if dt < midnight_today {
            return Err(CoreError::InvalidInput(format!(
                "timestamp {dt} is earlier than today {today} 00:00"
            )));
        }
        let periods_today = self.periods_in_day(today);
        let tomorrow = today.succ_opt().expect("date overflow");
        let periods_tomorrow = self.periods_in_day(tomorrow);
        let end_of_tomorrow = local_midnight(self.tz, tomorrow.succ_opt().expect("date overflow"));
        if dt >= end_of_tomorrow {
            return Err(CoreError::InvalidInput(format!(
                "timestamp {dt} is at or after end of tomorrow {end_of_tomorrow}"
            )));
        }

        // Walk forward quarter by quarter rather than dividing raw minutes, so that a DST
        // transition inside the elapsed span doesn't throw off the count: every period
        // boundary is itself re-derived from the timezone, not from a fixed-length offset.
        let mut period = 0u32;
        let mut cursor = midnight_today;
        let max_periods = periods_today + periods_tomorrow;
        while period < max_periods {
            let next = cursor + ChronoDuration::minutes(PERIOD_MINUTES);
            if dt < next {
                return Ok(period);
            }
            cursor = next;
            period += 1;
        }
        Err(CoreError::InvalidInput(format!(
            "timestamp {dt} falls outside the two-day grid"
        )))
    }

    /// Inverse of `timestamp_to_period`. Errors for negative `p` (impossible, `p: u32`) or `p`
    /// beyond `periods_in_today + periods_in_tomorrow - 1`.
    pub fn period_to_timestamp(&self, p: u32, today: NaiveDate) -> CoreResult<DateTime<Tz>> {
        let periods_today = self.periods_in_day(today);
        let tomorrow = today.succ_opt().expect("date overflow");
        let periods_tomorrow = self.periods_in_day(tomorrow);
        let max_periods = periods_today + periods_tomorrow;
        if p >= max_periods {
            return Err(CoreError::InvalidInput(format!(
                "period {p} is beyond the two-day grid (max {})",
                max_periods - 1
            )));
        }

        let midnight_today = local_midnight(self.tz, today);
        let mut cursor = midnight_today;
        for _ in 0..p {
            cursor += ChronoDuration::minutes(PERIOD_MINUTES);
        }
        Ok(cursor)
    }

    /// `true` iff period `p` falls within today (as opposed to tomorrow), given today's
    /// period count.
    pub fn is_today(&self, p: u32, periods_today: u32) -> bool {
        p < periods_today
    }
}

fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Tz> {
    match tz.from_local_datetime(&date.and_hms_opt(0, 0, 0).expect("valid time")) {
        chrono::LocalResult::Single(dt) => dt,
        // Midnight almost never falls inside a DST gap/overlap, but handle it defensively:
        // prefer the earliest valid representation.
        chrono::LocalResult::Ambiguous(a, _) => a,
        chrono::LocalResult::None => {
            // Search forward in small steps for the first valid local instant.
            let mut probe = date.and_hms_opt(0, 0, 0).expect("valid time");
            for _ in 0..8 {
                probe += chrono::Duration::minutes(15);
                if let chrono::LocalResult::Single(dt) = tz.from_local_datetime(&probe) {
                    return dt;
                }
            }
            panic!("could not resolve local midnight for {date} in {tz}");
        }
    }
}
