//! Day-to-day streak tracking.
//!
//! [`apply_contribution`] is the whole state machine; [`StreakTracker`]
//! only reads the stored state, applies it and writes it back. Gaps reset the
//! streak to one and never count against the lifetime total.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::date_key::{DateKey, DateKeyProvider};
use crate::storage::{Decoded, Store};

const STATE_KEY: &str = "xp:streak";
const HISTORY_KEY: &str = "xp:history";
const SCHEMA_VERSION: u32 = 1;

/// Lifetime total plus the current run of consecutive days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub total: u64,
    pub current_streak: u32,
    pub last_date_key: Option<DateKey>,
}

/// Apply a contribution of `delta` points made on `today`.
///
/// Non-positive deltas only move the total. Positive deltas start, keep,
/// extend or restart the streak depending on the last contributing day.
pub fn apply_contribution(state: &StreakState, today: DateKey, delta: i64) -> StreakState {
    let total = if delta >= 0 {
        state.total.saturating_add(delta.unsigned_abs())
    } else {
        state.total.saturating_sub(delta.unsigned_abs())
    };

    if delta <= 0 {
        return StreakState {
            total,
            ..state.clone()
        };
    }

    let current_streak = match state.last_date_key {
        None => 1,
        Some(last) if last == today => state.current_streak.max(1),
        Some(last) if last == today.pred() => state.current_streak.saturating_add(1),
        // Gap of two or more days, or a last day in the future.
        Some(_) => 1,
    };

    StreakState {
        total,
        current_streak,
        last_date_key: Some(today),
    }
}

/// The streak as it stands on `today`: zero once a full day was missed.
pub fn effective_streak(state: &StreakState, today: DateKey) -> u32 {
    match state.last_date_key {
        Some(last) if last == today || last == today.pred() => state.current_streak,
        _ => 0,
    }
}

/// Before/after of one recorded contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakUpdate {
    pub before: StreakState,
    pub after: StreakState,
}

impl StreakUpdate {
    /// The streak grew by a day.
    pub fn extended(&self) -> bool {
        self.after.current_streak > self.before.current_streak
    }

    /// A previous run was broken and a new one started.
    pub fn restarted(&self) -> bool {
        match (self.before.last_date_key, self.after.last_date_key) {
            (Some(last), Some(today)) if last != today => last != today.pred(),
            _ => false,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StateRecord {
    v: u32,
    #[serde(flatten)]
    state: StreakState,
}

/// One day of point history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPoints {
    pub date_key: DateKey,
    pub points: u64,
}

/// Persisted streak, daily point counters and a capped history.
pub struct StreakTracker<'a> {
    store: &'a Store,
    dates: &'a DateKeyProvider,
    history_days: usize,
}

impl<'a> StreakTracker<'a> {
    pub fn new(store: &'a Store, dates: &'a DateKeyProvider, history_days: usize) -> Self {
        Self {
            store,
            dates,
            history_days,
        }
    }

    /// Stored state; missing or unreadable state starts from zero.
    pub fn state(&self) -> StreakState {
        match self.store.get_json::<StateRecord>(STATE_KEY) {
            Decoded::Present(record) if record.v == SCHEMA_VERSION => record.state,
            Decoded::Present(record) => {
                tracing::warn!(version = record.v, "unsupported streak schema, starting over");
                StreakState::default()
            }
            Decoded::Corrupt(reason) => {
                tracing::warn!(%reason, "corrupt streak record, starting over");
                StreakState::default()
            }
            Decoded::Absent => StreakState::default(),
        }
    }

    /// Streak as of today, zero if yesterday was missed.
    pub fn current(&self) -> u32 {
        effective_streak(&self.state(), self.dates.today_key())
    }

    /// Apply `delta` for today and persist.
    pub fn record(&self, delta: i64) -> StreakUpdate {
        let today = self.dates.today_key();
        let before = self.state();
        let after = apply_contribution(&before, today, delta);
        if after != before {
            let record = StateRecord {
                v: SCHEMA_VERSION,
                state: after.clone(),
            };
            self.store.set_json(STATE_KEY, &record);
        }
        StreakUpdate { before, after }
    }

    fn points_key(date_key: &DateKey) -> String {
        format!("xp:points:{date_key}")
    }

    /// Points earned today.
    pub fn points_today(&self) -> u64 {
        self.store
            .get_counter(&Self::points_key(&self.dates.today_key()))
    }

    /// Award points: updates the streak, today's counter and the history.
    pub fn award(&self, points: u32) -> StreakUpdate {
        let update = self.record(i64::from(points));
        if points == 0 {
            return update;
        }

        let today = self.dates.today_key();
        let key = Self::points_key(&today);
        let tally = self
            .store
            .get_counter(&key)
            .saturating_add(u64::from(points));
        self.store.set_counter(&key, tally);

        let mut history = self.history_map();
        history.insert(today, tally);
        self.trim(&mut history, today);
        self.store.set_json(HISTORY_KEY, &history);

        update
    }

    fn history_map(&self) -> BTreeMap<DateKey, u64> {
        self.store
            .get_json::<BTreeMap<DateKey, u64>>(HISTORY_KEY)
            .ok()
            .unwrap_or_default()
    }

    fn trim(&self, history: &mut BTreeMap<DateKey, u64>, today: DateKey) {
        let keep = i64::try_from(self.history_days).unwrap_or(i64::MAX);
        let oldest = today.add_days(1 - keep.max(1));
        let stale: Vec<DateKey> = history.range(..oldest).map(|(d, _)| *d).collect();
        for day in stale {
            history.remove(&day);
            self.store.remove(&Self::points_key(&day));
        }
    }

    /// Point history for the retained window, oldest first.
    pub fn history(&self) -> Vec<DayPoints> {
        let today = self.dates.today_key();
        let keep = i64::try_from(self.history_days).unwrap_or(i64::MAX);
        let oldest = today.add_days(1 - keep.max(1));
        self.history_map()
            .range(oldest..)
            .map(|(date_key, points)| DayPoints {
                date_key: *date_key,
                points: *points,
            })
            .collect()
    }
}
