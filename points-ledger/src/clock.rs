//! Injected clock and timezone policy
//!
//! The daily-reset rule depends on "today", so the engine never reads wall
//! time directly. Production uses [`SystemClock`]; tests drive a
//! [`ManualClock`] across day boundaries deterministically.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// Time source for the engine
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Controllable clock for tests
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    /// Clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(start)),
        }
    }

    /// Jump to an absolute instant
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.write() = instant;
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// Maps instants to calendar dates for the daily-reset boundary
///
/// A fixed UTC offset, not a tz database zone: reward days do not observe
/// DST transitions.
#[derive(Debug, Clone, Copy)]
pub struct TimePolicy {
    offset: FixedOffset,
}

impl TimePolicy {
    /// Reward days roll over at midnight UTC
    pub fn utc() -> Self {
        Self {
            offset: FixedOffset::east_opt(0).unwrap(),
        }
    }

    /// Reward days roll over at local midnight, `minutes` east of UTC
    pub fn with_offset_minutes(minutes: i32) -> Option<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
    }

    /// Calendar date of `instant` under this policy
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }
}

impl Default for TimePolicy {
    fn default() -> Self {
        Self::utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advance() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::hours(13));
        assert_eq!(clock.now(), start + Duration::hours(13));
    }

    #[test]
    fn test_local_date_respects_offset() {
        // 23:30 UTC on March 1st
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap();

        let utc = TimePolicy::utc();
        assert_eq!(
            utc.local_date(instant),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );

        // UTC+1: already past midnight
        let cet = TimePolicy::with_offset_minutes(60).unwrap();
        assert_eq!(
            cet.local_date(instant),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );

        // UTC-5: still the 1st
        let est = TimePolicy::with_offset_minutes(-300).unwrap();
        assert_eq!(
            est.local_date(instant),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[test]
    fn test_invalid_offset_rejected() {
        assert!(TimePolicy::with_offset_minutes(24 * 60).is_none());
        assert!(TimePolicy::with_offset_minutes(i32::MAX).is_none());
        assert!(TimePolicy::with_offset_minutes(i32::MIN).is_none());
    }
}
