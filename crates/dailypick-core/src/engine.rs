//! Engine facade.
//!
//! Wires the store, catalog, day keys and configuration into the three
//! user-facing flows: today's pick, "generate again" under a quota, and XP
//! awards with streak tracking. Every outcome is reported to the telemetry
//! sink.

use serde::Serialize;

use crate::cache::{ContentCache, MigrationOutcome};
use crate::catalog::{Catalog, ContentItem, PoolQuery, PoolSource};
use crate::context::ContextKey;
use crate::date_key::{DateKey, DateKeyProvider};
use crate::error::{EngineError, SelectionError};
use crate::events::{EngineEvent, NoopSink, TelemetrySink};
use crate::quota::{QuotaCounter, QuotaStatus};
use crate::rotation::{merge_sources, RotationPicker};
use crate::selector::DeterministicSelector;
use crate::storage::{Config, Store};
use crate::streak::{effective_streak, DayPoints, StreakTracker, StreakUpdate};

/// Today's pick for one context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pick {
    pub date_key: DateKey,
    pub context_key: ContextKey,
    pub item: ContentItem,
    /// Served from today's cache.
    pub cached: bool,
    /// How the pool was found; absent for cached picks.
    pub source: Option<PoolSource>,
}

/// Result of one "generate again".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Generation {
    pub feature: String,
    pub context_key: ContextKey,
    /// Counter value this batch was rotated by.
    pub generation: u64,
    pub items: Vec<ContentItem>,
    /// Quota after this generation was counted.
    pub quota: QuotaStatus,
}

/// Streak as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreakSummary {
    pub total: u64,
    /// Zero once a day was missed.
    pub current_streak: u32,
    pub last_date_key: Option<DateKey>,
    pub points_today: u64,
}

pub struct Engine<'a> {
    store: &'a Store,
    catalog: &'a Catalog,
    dates: &'a DateKeyProvider,
    config: Config,
    selector: DeterministicSelector,
    sink: Box<dyn TelemetrySink + 'a>,
}

impl<'a> Engine<'a> {
    pub fn new(
        store: &'a Store,
        catalog: &'a Catalog,
        dates: &'a DateKeyProvider,
        config: &Config,
    ) -> Self {
        Self {
            store,
            catalog,
            dates,
            config: config.clone(),
            selector: DeterministicSelector::new(),
            sink: Box::new(NoopSink),
        }
    }

    pub fn with_sink(mut self, sink: impl TelemetrySink + 'a) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        self.catalog
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn today(&self) -> DateKey {
        self.dates.today_key()
    }

    fn emit(&self, event: EngineEvent) {
        if let Err(e) = self.sink.emit(&event) {
            tracing::debug!(event = event.name(), error = %e, "telemetry sink failed");
        }
    }

    fn quota(&self) -> QuotaCounter<'a> {
        QuotaCounter::new(self.store, self.dates, self.config.quotas.limits())
    }

    fn streak_tracker(&self) -> StreakTracker<'a> {
        StreakTracker::new(self.store, self.dates, self.config.streak.history_days)
    }

    /// Today's item for `query` in `namespace`. Repeated calls on the same
    /// day return the same item.
    ///
    /// # Errors
    /// [`SelectionError::EmptyPool`] when nothing in the catalog fits and
    /// there is no default item.
    pub fn daily_pick(&self, namespace: &str, query: &PoolQuery) -> Result<Pick, SelectionError> {
        let cache = ContentCache::new(self.store, self.dates, namespace)
            .with_default_band(&self.config.selection.default_band);

        if let MigrationOutcome::Migrated { context_key } = cache.migrate_legacy() {
            self.emit(EngineEvent::CacheMigrated {
                namespace: namespace.to_string(),
                context_key: context_key.to_string(),
                at: self.dates.now(),
            });
        }

        let context_key = query.context_key();
        let today = self.dates.today_key();

        let pick = match cache.get_selection(&context_key) {
            Some(selection) => Pick {
                date_key: selection.date_key,
                context_key,
                item: selection.item,
                cached: true,
                source: None,
            },
            None => {
                let pool = self
                    .catalog
                    .pool(query, self.config.selection.min_viable_pool)?;
                let item = self
                    .selector
                    .select(&today, &context_key, &pool.items)?
                    .clone();
                cache.put(&context_key, today, &item);
                Pick {
                    date_key: today,
                    context_key,
                    item,
                    cached: false,
                    source: Some(pool.source),
                }
            }
        };

        self.emit(EngineEvent::SelectionMade {
            context_key: pick.context_key.to_string(),
            date_key: pick.date_key,
            item_id: pick.item.id.clone(),
            cached: pick.cached,
            source: pick.source.clone(),
            at: self.dates.now(),
        });
        Ok(pick)
    }

    /// Next rotated batch for `feature`, counted against its daily quota.
    ///
    /// `extra` holds candidates from outside the catalog (typically a text
    /// generator); duplicates of catalog items are dropped.
    ///
    /// # Errors
    /// [`EngineError::QuotaExceeded`] when today's ceiling is reached, and
    /// [`EngineError::Selection`] when there is nothing to rotate through.
    pub fn regenerate(
        &self,
        feature: &str,
        query: &PoolQuery,
        extra: Vec<ContentItem>,
        take: usize,
    ) -> Result<Generation, EngineError> {
        let quota = self.quota();
        let status = quota.can_consume(feature);
        if !status.allowed {
            self.emit(EngineEvent::QuotaBlocked {
                feature: feature.to_string(),
                used: status.used,
                limit: status.limit,
                at: self.dates.now(),
            });
            return Err(EngineError::QuotaExceeded {
                feature: feature.to_string(),
                status,
            });
        }

        let catalog_items = match self
            .catalog
            .pool(query, self.config.selection.min_viable_pool)
        {
            Ok(pool) => pool.items,
            Err(SelectionError::EmptyPool) if !extra.is_empty() => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let candidates = merge_sources([catalog_items, extra]);
        if candidates.is_empty() {
            return Err(SelectionError::EmptyPool.into());
        }

        let context_key = query.context_key();
        let picker = RotationPicker::new(self.store, feature);
        let generation = picker.generation(&context_key);
        let items = picker.next(&context_key, &candidates, take.max(1));

        let used = quota.consume(feature);
        let status = QuotaStatus {
            allowed: used < status.limit,
            used,
            limit: status.limit,
        };
        self.emit(EngineEvent::QuotaConsumed {
            feature: feature.to_string(),
            used,
            limit: status.limit,
            at: self.dates.now(),
        });
        self.emit(EngineEvent::PlanGenerated {
            feature: feature.to_string(),
            context_key: context_key.to_string(),
            generation,
            item_ids: items.iter().map(|i| i.id.clone()).collect(),
            at: self.dates.now(),
        });

        Ok(Generation {
            feature: feature.to_string(),
            context_key,
            generation,
            items,
            quota: status,
        })
    }

    /// Award XP for today.
    pub fn award_xp(&self, points: u32) -> StreakUpdate {
        let tracker = self.streak_tracker();
        let update = tracker.award(points);
        let at = self.dates.now();

        if update.restarted() {
            self.emit(EngineEvent::StreakReset {
                previous_streak: update.before.current_streak,
                at,
            });
        } else if update.extended() {
            self.emit(EngineEvent::StreakIncremented {
                current_streak: update.after.current_streak,
                at,
            });
        }
        if points > 0 {
            self.emit(EngineEvent::PointsAwarded {
                points,
                total: update.after.total,
                points_today: tracker.points_today(),
                at,
            });
        }
        update
    }

    /// Record one use of `feature` outside of [`Engine::regenerate`].
    pub fn consume(&self, feature: &str) -> QuotaStatus {
        let quota = self.quota();
        let used = quota.consume(feature);
        let limit = quota.policy(feature).limit;
        self.emit(EngineEvent::QuotaConsumed {
            feature: feature.to_string(),
            used,
            limit,
            at: self.dates.now(),
        });
        QuotaStatus {
            allowed: used < limit,
            used,
            limit,
        }
    }

    pub fn quota_status(&self, feature: &str) -> QuotaStatus {
        self.quota().can_consume(feature)
    }

    /// Whether content generated today for `feature` may still be opened.
    pub fn can_access(&self, feature: &str) -> bool {
        self.quota().can_access(feature)
    }

    pub fn streak(&self) -> StreakSummary {
        let tracker = self.streak_tracker();
        let state = tracker.state();
        StreakSummary {
            total: state.total,
            current_streak: effective_streak(&state, self.dates.today_key()),
            last_date_key: state.last_date_key,
            points_today: tracker.points_today(),
        }
    }

    pub fn points_history(&self) -> Vec<DayPoints> {
        self.streak_tracker().history()
    }
}
