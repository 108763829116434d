//! Per-feature daily usage ceilings.
//!
//! Counts live under `quota:<feature>:<date_key>`, so a new day starts from
//! zero without any reset step. This is a soft limit: [`QuotaCounter::consume`]
//! never refuses and never fails, and callers are expected to check
//! [`QuotaCounter::can_consume`] first.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::date_key::{DateKey, DateKeyProvider};
use crate::storage::Store;

/// What an exhausted quota blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaScope {
    /// Only new generation is blocked; earlier results stay readable.
    #[default]
    Generation,
    /// Reading previously generated content is blocked as well.
    GenerationAndAccess,
}

/// Ceiling and scope for one feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaPolicy {
    pub limit: u32,
    #[serde(default)]
    pub scope: QuotaScope,
}

/// Policies by feature, with a fallback for unlisted features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaLimits {
    default_limit: u32,
    policies: BTreeMap<String, QuotaPolicy>,
}

impl QuotaLimits {
    pub fn new(default_limit: u32) -> Self {
        Self {
            default_limit,
            policies: BTreeMap::new(),
        }
    }

    pub fn with_policy(mut self, feature: &str, policy: QuotaPolicy) -> Self {
        self.policies.insert(feature.to_string(), policy);
        self
    }

    pub fn with_policies(mut self, policies: BTreeMap<String, QuotaPolicy>) -> Self {
        self.policies.extend(policies);
        self
    }

    pub fn policy(&self, feature: &str) -> QuotaPolicy {
        self.policies.get(feature).cloned().unwrap_or(QuotaPolicy {
            limit: self.default_limit,
            scope: QuotaScope::Generation,
        })
    }
}

/// Snapshot of a feature's quota for today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub allowed: bool,
    pub used: u32,
    pub limit: u32,
}

impl QuotaStatus {
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }
}

/// Daily counters for every feature.
pub struct QuotaCounter<'a> {
    store: &'a Store,
    dates: &'a DateKeyProvider,
    limits: QuotaLimits,
}

impl<'a> QuotaCounter<'a> {
    pub fn new(store: &'a Store, dates: &'a DateKeyProvider, limits: QuotaLimits) -> Self {
        Self {
            store,
            dates,
            limits,
        }
    }

    fn key(feature: &str, date_key: &DateKey) -> String {
        format!("quota:{feature}:{date_key}")
    }

    fn used_on(&self, feature: &str, date_key: &DateKey) -> u32 {
        let raw = self.store.get_counter(&Self::key(feature, date_key));
        u32::try_from(raw).unwrap_or(u32::MAX)
    }

    /// Today's usage against the feature's ceiling.
    pub fn can_consume(&self, feature: &str) -> QuotaStatus {
        let today = self.dates.today_key();
        let used = self.used_on(feature, &today);
        let limit = self.limits.policy(feature).limit;
        QuotaStatus {
            allowed: used < limit,
            used,
            limit,
        }
    }

    /// Record one use and return the new count. Does not check the ceiling.
    /// A failed write is dropped; the returned count is still the intended one.
    pub fn consume(&self, feature: &str) -> u32 {
        let today = self.dates.today_key();
        let used = self.used_on(feature, &today).saturating_add(1);
        if !self
            .store
            .set_counter(&Self::key(feature, &today), u64::from(used))
        {
            tracing::debug!(feature, used, "quota increment not persisted");
        }
        used
    }

    /// Whether content already generated today may still be opened.
    pub fn can_access(&self, feature: &str) -> bool {
        match self.limits.policy(feature).scope {
            QuotaScope::Generation => true,
            QuotaScope::GenerationAndAccess => self.can_consume(feature).allowed,
        }
    }

    pub fn policy(&self, feature: &str) -> QuotaPolicy {
        self.limits.policy(feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_key::{offset_from_minutes, ManualClock};
    use crate::storage::UnavailableBackend;
    use chrono::{TimeZone, Utc};
    use std::rc::Rc;

    fn provider() -> (Rc<ManualClock>, DateKeyProvider) {
        let clock = Rc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap(),
        ));
        let dates = DateKeyProvider::new(offset_from_minutes(0), Box::new(clock.clone()));
        (clock, dates)
    }

    #[test]
    fn counts_up_to_limit_then_blocks() {
        let store = Store::in_memory("t");
        let (_clock, dates) = provider();
        let quota = QuotaCounter::new(&store, &dates, QuotaLimits::new(3));

        let start = quota.can_consume("plan");
        assert_eq!(
            start,
            QuotaStatus {
                allowed: true,
                used: 0,
                limit: 3
            }
        );
        assert_eq!(start.remaining(), 3);

        for expected in 1..=3 {
            assert!(quota.can_consume("plan").allowed);
            assert_eq!(quota.consume("plan"), expected);
        }
        let blocked = quota.can_consume("plan");
        assert!(!blocked.allowed);
        assert_eq!(blocked.used, 3);
        assert_eq!(blocked.remaining(), 0);
    }

    #[test]
    fn consume_does_not_enforce() {
        let store = Store::in_memory("t");
        let (_clock, dates) = provider();
        let quota = QuotaCounter::new(&store, &dates, QuotaLimits::new(1));
        quota.consume("plan");
        assert_eq!(quota.consume("plan"), 2);
        assert_eq!(quota.can_consume("plan").used, 2);
    }

    #[test]
    fn new_day_starts_fresh() {
        let store = Store::in_memory("t");
        let (clock, dates) = provider();
        let quota = QuotaCounter::new(&store, &dates, QuotaLimits::new(2));
        quota.consume("plan");
        quota.consume("plan");
        assert!(!quota.can_consume("plan").allowed);

        clock.advance_days(1);
        let status = quota.can_consume("plan");
        assert!(status.allowed);
        assert_eq!(status.used, 0);
    }

    #[test]
    fn features_are_isolated_with_own_limits() {
        let store = Store::in_memory("t");
        let (_clock, dates) = provider();
        let limits = QuotaLimits::new(3).with_policy(
            "story",
            QuotaPolicy {
                limit: 1,
                scope: QuotaScope::GenerationAndAccess,
            },
        );
        let quota = QuotaCounter::new(&store, &dates, limits);
        quota.consume("story");
        assert!(!quota.can_consume("story").allowed);
        assert!(quota.can_consume("plan").allowed);
        assert_eq!(quota.can_consume("plan").limit, 3);
    }

    #[test]
    fn access_scope_per_feature() {
        let store = Store::in_memory("t");
        let (_clock, dates) = provider();
        let limits = QuotaLimits::new(1).with_policy(
            "story",
            QuotaPolicy {
                limit: 1,
                scope: QuotaScope::GenerationAndAccess,
            },
        );
        let quota = QuotaCounter::new(&store, &dates, limits);
        quota.consume("plan");
        quota.consume("story");
        assert!(quota.can_access("plan"));
        assert!(!quota.can_access("story"));
    }

    #[test]
    fn storage_failure_is_optimistic() {
        let store = Store::new(Box::new(UnavailableBackend), "t");
        let (_clock, dates) = provider();
        let quota = QuotaCounter::new(&store, &dates, QuotaLimits::new(3));
        assert_eq!(quota.consume("plan"), 1);
        let status = quota.can_consume("plan");
        assert!(status.allowed);
        assert_eq!(status.used, 0);
    }

    #[test]
    fn zero_limit_blocks_immediately() {
        let store = Store::in_memory("t");
        let (_clock, dates) = provider();
        let quota = QuotaCounter::new(&store, &dates, QuotaLimits::new(0));
        assert!(!quota.can_consume("plan").allowed);
    }
}
