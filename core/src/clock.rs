//! Wall clock used by the survey — injectable so tests control time.

use crate::types::UnixMillis;
use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};
use std::cell::Cell;

pub trait SurveyClock {
    fn now_ms(&self) -> UnixMillis;
}

/// The real clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SurveyClock for SystemClock {
    fn now_ms(&self) -> UnixMillis {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<UnixMillis>,
}

impl ManualClock {
    pub fn new(start: UnixMillis) -> Self {
        Self { now: Cell::new(start) }
    }

    pub fn advance(&self, ms: i64) {
        self.now.set(self.now.get() + ms);
    }
}

impl SurveyClock for ManualClock {
    fn now_ms(&self) -> UnixMillis {
        self.now.get()
    }
}

impl<C: SurveyClock + ?Sized> SurveyClock for std::rc::Rc<C> {
    fn now_ms(&self) -> UnixMillis {
        (**self).now_ms()
    }
}

/// RFC 3339 in UTC with millisecond precision, e.g. `2025-03-01T09:30:00.000Z`.
pub fn iso_timestamp(ms: UnixMillis) -> String {
    utc(ms).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// German locale rendering in local time, e.g. `1.3.2025, 10:30:00`.
pub fn german_local_time(ms: UnixMillis) -> String {
    utc(ms)
        .with_timezone(&Local)
        .format("%-d.%-m.%Y, %H:%M:%S")
        .to_string()
}

/// Whole seconds, rounded half up.
pub fn whole_seconds(ms: i64) -> i64 {
    (ms as f64 / 1000.0).round() as i64
}

fn utc(ms: UnixMillis) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_advanced() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        clock.advance(250);
        assert_eq!(clock.now_ms(), 1_250);
    }

    #[test]
    fn iso_timestamp_keeps_millis() {
        assert_eq!(iso_timestamp(1_700_000_000_123), "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn german_local_time_does_not_pad_day_or_month() {
        let ms = Local
            .with_ymd_and_hms(2025, 3, 1, 9, 5, 7)
            .single()
            .expect("unambiguous local time")
            .timestamp_millis();
        assert_eq!(german_local_time(ms), "1.3.2025, 09:05:07");
    }

    #[test]
    fn whole_seconds_rounds_half_up() {
        assert_eq!(whole_seconds(1_499), 1);
        assert_eq!(whole_seconds(1_500), 2);
        assert_eq!(whole_seconds(0), 0);
    }
}
