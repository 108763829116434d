//! Per-context cache of the day's selection.
//!
//! Records live under `<namespace>:<context_key>` and are only valid for the
//! day they were written. Older builds kept a single unnamespaced record per
//! feature under `<namespace>`; it is moved into the namespaced slot the
//! first time a cache instance is used.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::catalog::{BandId, ContentItem};
use crate::context::ContextKey;
use crate::date_key::{DateKey, DateKeyProvider};
use crate::storage::{Decoded, Store};

const SCHEMA_VERSION: u32 = 1;

/// The pick made for one context on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySelection {
    pub date_key: DateKey,
    pub context_key: ContextKey,
    pub item: ContentItem,
    #[serde(default)]
    pub band: Option<BandId>,
}

#[derive(Serialize, Deserialize)]
struct Record {
    v: u32,
    #[serde(flatten)]
    selection: DailySelection,
}

/// Shape written before records were namespaced.
#[derive(Deserialize)]
struct LegacyRecord {
    date: DateKey,
    item: ContentItem,
    #[serde(default)]
    band: Option<BandId>,
}

/// What a legacy migration pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    NoLegacy,
    /// Copied into the slot for this context and removed.
    Migrated { context_key: ContextKey },
    /// The namespaced slot was already populated; legacy removed only.
    AlreadyPresent { context_key: ContextKey },
    /// Legacy payload was unreadable and removed.
    Discarded,
    /// The slot could not be written; legacy kept for a later run.
    Deferred,
}

/// Result of [`ContentCache::get_or_insert_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub item: ContentItem,
    /// Whether the item came from the cache.
    pub cached: bool,
}

/// Daily selection cache for one namespace.
pub struct ContentCache<'a> {
    store: &'a Store,
    dates: &'a DateKeyProvider,
    namespace: String,
    default_band: BandId,
    migrated: Cell<bool>,
    reported: RefCell<HashSet<String>>,
}

impl<'a> ContentCache<'a> {
    pub fn new(store: &'a Store, dates: &'a DateKeyProvider, namespace: &str) -> Self {
        Self {
            store,
            dates,
            namespace: namespace.to_string(),
            default_band: "3-5".to_string(),
            migrated: Cell::new(false),
            reported: RefCell::new(HashSet::new()),
        }
    }

    /// Band assumed for legacy records that carry none.
    pub fn with_default_band(mut self, band: &str) -> Self {
        self.default_band = band.to_string();
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn record_key(&self, context: &ContextKey) -> String {
        format!("{}:{}", self.namespace, context)
    }

    fn legacy_key(&self) -> &str {
        &self.namespace
    }

    /// Today's cached item for `context`, or `None` on a miss.
    pub fn get(&self, context: &ContextKey) -> Option<ContentItem> {
        self.get_selection(context).map(|s| s.item)
    }

    /// Today's full selection record for `context`.
    pub fn get_selection(&self, context: &ContextKey) -> Option<DailySelection> {
        self.ensure_migrated();
        let key = self.record_key(context);
        let today = self.dates.today_key();

        let record = match self.store.get_json::<Record>(&key) {
            Decoded::Present(record) => record,
            Decoded::Absent => {
                tracing::debug!(%key, "cache miss");
                return None;
            }
            Decoded::Corrupt(reason) => {
                self.report_corrupt(&key, &reason);
                return None;
            }
        };

        if record.v != SCHEMA_VERSION {
            self.report_corrupt(&key, &format!("unsupported schema version {}", record.v));
            return None;
        }
        if record.selection.context_key != *context {
            self.report_corrupt(&key, "context key mismatch");
            return None;
        }
        if record.selection.date_key != today {
            tracing::debug!(%key, stored = %record.selection.date_key, %today, "cache stale");
            return None;
        }
        tracing::debug!(%key, item = %record.selection.item.id, "cache hit");
        Some(record.selection)
    }

    /// Store `item` as the pick for `context` on `date_key`, replacing
    /// whatever was there. Returns whether the write was persisted.
    pub fn put(&self, context: &ContextKey, date_key: DateKey, item: &ContentItem) -> bool {
        self.ensure_migrated();
        let record = Record {
            v: SCHEMA_VERSION,
            selection: DailySelection {
                date_key,
                context_key: context.clone(),
                item: item.clone(),
                band: item.band.clone(),
            },
        };
        self.store.set_json(&self.record_key(context), &record)
    }

    /// Return today's item, computing and storing it on a miss.
    pub fn get_or_insert_with<E>(
        &self,
        context: &ContextKey,
        compute: impl FnOnce() -> Result<ContentItem, E>,
    ) -> Result<Lookup, E> {
        if let Some(item) = self.get(context) {
            return Ok(Lookup { item, cached: true });
        }
        let item = compute()?;
        self.put(context, self.dates.today_key(), &item);
        Ok(Lookup {
            item,
            cached: false,
        })
    }

    fn ensure_migrated(&self) {
        if !self.migrated.get() {
            self.migrate_legacy();
        }
    }

    /// Move a legacy record into its namespaced slot. Safe to call any
    /// number of times.
    pub fn migrate_legacy(&self) -> MigrationOutcome {
        self.migrated.set(true);
        let legacy_key = self.legacy_key().to_string();

        let legacy = match self.store.get_json::<LegacyRecord>(&legacy_key) {
            Decoded::Absent => return MigrationOutcome::NoLegacy,
            Decoded::Corrupt(reason) => {
                self.report_corrupt(&legacy_key, &reason);
                self.store.remove(&legacy_key);
                return MigrationOutcome::Discarded;
            }
            Decoded::Present(legacy) => legacy,
        };

        let band = legacy
            .band
            .or_else(|| legacy.item.band.clone())
            .unwrap_or_else(|| self.default_band.clone());
        let context_key = ContextKey::for_band(&band);
        let slot = self.record_key(&context_key);

        let outcome = if self.store.get(&slot).is_some() {
            MigrationOutcome::AlreadyPresent {
                context_key: context_key.clone(),
            }
        } else {
            let record = Record {
                v: SCHEMA_VERSION,
                selection: DailySelection {
                    date_key: legacy.date,
                    context_key: context_key.clone(),
                    item: legacy.item,
                    band: Some(band),
                },
            };
            if !self.store.set_json(&slot, &record) {
                return MigrationOutcome::Deferred;
            }
            MigrationOutcome::Migrated {
                context_key: context_key.clone(),
            }
        };

        self.store.remove(&legacy_key);
        tracing::info!(namespace = %self.namespace, %context_key, ?outcome, "migrated legacy selection");
        outcome
    }

    fn report_corrupt(&self, key: &str, reason: &str) {
        if self.reported.borrow_mut().insert(key.to_string()) {
            tracing::warn!(%key, %reason, "ignoring corrupt cache record");
        }
    }
}
