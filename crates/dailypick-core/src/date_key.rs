//! Calendar-day keys in a fixed civil timezone.
//!
//! [`DateKeyProvider`] is the only place that decides what "today" is.
//! Every other component receives a [`DateKey`] from it, so day rollover is
//! consistent across the cache, quotas and streaks.

use std::cell::Cell;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const FORMAT: &str = "%Y-%m-%d";

/// A civil day, rendered as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn parse(s: &str) -> Option<Self> {
        NaiveDate::parse_from_str(s.trim(), FORMAT).ok().map(Self)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The day before.
    pub fn pred(&self) -> Self {
        Self(self.0.pred_opt().unwrap_or(self.0))
    }

    /// The day after.
    pub fn succ(&self) -> Self {
        Self(self.0.succ_opt().unwrap_or(self.0))
    }

    pub fn add_days(&self, days: i64) -> Self {
        Self(
            self.0
                .checked_add_signed(Duration::days(days))
                .unwrap_or(self.0),
        )
    }

    /// Signed number of days from `self` to `other`.
    pub fn days_until(&self, other: &DateKey) -> i64 {
        (other.0 - self.0).num_days()
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(FORMAT))
    }
}

impl FromStr for DateKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), FORMAT).map(Self)
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Source of the current instant.
///
/// `None` means the clock is missing or reported garbage; the provider then
/// uses system time.
pub trait Clock {
    fn now(&self) -> Option<DateTime<Utc>>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Option<DateTime<Utc>> {
        Some(Utc::now())
    }
}

/// Settable clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Option<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(Some(now)),
        }
    }

    /// A clock that reports nothing, forcing the system-time fallback.
    pub fn broken() -> Self {
        Self {
            now: Cell::new(None),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(Some(now));
    }

    pub fn advance(&self, by: Duration) {
        if let Some(now) = self.now.get() {
            self.now.set(Some(now + by));
        }
    }

    pub fn advance_days(&self, days: i64) {
        self.advance(Duration::days(days));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Option<DateTime<Utc>> {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for std::rc::Rc<C> {
    fn now(&self) -> Option<DateTime<Utc>> {
        (**self).now()
    }
}

/// Turns instants into [`DateKey`]s in one fixed offset.
pub struct DateKeyProvider {
    offset: FixedOffset,
    clock: Box<dyn Clock>,
    watermark: Cell<Option<DateKey>>,
}

impl DateKeyProvider {
    pub fn new(offset: FixedOffset, clock: Box<dyn Clock>) -> Self {
        Self {
            offset,
            clock,
            watermark: Cell::new(None),
        }
    }

    /// Provider on the system clock. Offsets outside ±1439 minutes fall back
    /// to UTC.
    pub fn system(utc_offset_minutes: i32) -> Self {
        Self::new(offset_from_minutes(utc_offset_minutes), Box::new(SystemClock))
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Day key for an explicit instant, independent of the clock and the
    /// watermark.
    pub fn key_for(&self, instant: DateTime<Utc>) -> DateKey {
        DateKey(instant.with_timezone(&self.offset).date_naive())
    }

    /// Current instant from the clock, or system time if the clock failed.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now().unwrap_or_else(Utc::now)
    }

    /// Today's key. Never earlier than a key this provider already returned.
    pub fn today_key(&self) -> DateKey {
        let computed = self.key_for(self.now());
        let today = match self.watermark.get() {
            Some(last) if last > computed => {
                tracing::debug!(%last, %computed, "clock moved backwards, holding day key");
                last
            }
            _ => computed,
        };
        self.watermark.set(Some(today));
        today
    }
}

/// Build a [`FixedOffset`] from minutes east of UTC, falling back to UTC.
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| {
        tracing::warn!(minutes, "invalid UTC offset, using UTC");
        Utc.fix()
    })
}
