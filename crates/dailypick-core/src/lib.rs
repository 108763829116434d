//! # dailypick Core Library
//!
//! Deterministic daily picks, rotation, quotas and streaks over a local
//! key-value store. Everything is available through the standalone
//! `dailypick` CLI, which is a thin layer over this library.
//!
//! ## Architecture
//!
//! - **Day keys**: one [`DateKeyProvider`] turns the clock into civil-day
//!   keys in a fixed offset; nothing else computes "today"
//! - **Selection**: a stable string hash of `(day, context)` picks from a pool
//!   built by the catalog's fallback cascade
//! - **Storage**: a best-effort [`Store`] over SQLite or memory, with
//!   versioned JSON records and TOML configuration
//! - **Telemetry**: outcomes are reported as [`EngineEvent`]s to a pluggable
//!   sink
//!
//! ## Key Components
//!
//! - [`Engine`]: facade over the three user flows
//! - [`ContentCache`]: per-context pick of the day
//! - [`RotationPicker`]: "generate again" without repeats
//! - [`QuotaCounter`]: per-feature daily ceilings
//! - [`StreakTracker`]: XP totals and day streaks

pub mod cache;
pub mod catalog;
pub mod context;
pub mod date_key;
pub mod engine;
pub mod error;
pub mod events;
pub mod generator;
pub mod quota;
pub mod rotation;
pub mod selector;
pub mod storage;
pub mod streak;

pub use cache::{ContentCache, DailySelection, Lookup, MigrationOutcome};
pub use catalog::{Band, Catalog, ContentItem, Pool, PoolQuery, PoolSource};
pub use context::{ContextKey, ContextKeyBuilder};
pub use date_key::{Clock, DateKey, DateKeyProvider, ManualClock, SystemClock};
pub use engine::{Engine, Generation, Pick, StreakSummary};
pub use error::{ConfigError, CoreError, EngineError, SelectionError, StorageError};
pub use events::{EngineEvent, MemorySink, NoopSink, TelemetryError, TelemetrySink, TracingSink};
pub use generator::{generate_or_fallback, GeneratorError, TemplateGenerator, TextGenerator};
pub use quota::{QuotaCounter, QuotaLimits, QuotaPolicy, QuotaScope, QuotaStatus};
pub use rotation::{merge_sources, rotate, RotationPicker};
pub use selector::{DeterministicSelector, Fnv1a, KeyHasher, RollingHash};
pub use storage::{Config, KvBackend, MemoryBackend, SqliteBackend, Store};
pub use streak::{apply_contribution, effective_streak, DayPoints, StreakState, StreakTracker, StreakUpdate};
