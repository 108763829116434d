use std::cell::RefCell;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::PoolSource;
use crate::date_key::DateKey;

/// Every observable outcome of the engine produces an EngineEvent.
/// Sinks forward them to analytics; nothing in the core reads them back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    SelectionMade {
        context_key: String,
        date_key: DateKey,
        item_id: String,
        /// Served from today's cache rather than freshly selected.
        cached: bool,
        source: Option<PoolSource>,
        at: DateTime<Utc>,
    },
    /// A legacy single-key record was moved into a per-context slot.
    CacheMigrated {
        namespace: String,
        context_key: String,
        at: DateTime<Utc>,
    },
    PlanGenerated {
        feature: String,
        context_key: String,
        generation: u64,
        item_ids: Vec<String>,
        at: DateTime<Utc>,
    },
    QuotaBlocked {
        feature: String,
        used: u32,
        limit: u32,
        at: DateTime<Utc>,
    },
    QuotaConsumed {
        feature: String,
        used: u32,
        limit: u32,
        at: DateTime<Utc>,
    },
    StreakIncremented {
        current_streak: u32,
        at: DateTime<Utc>,
    },
    /// A broken run restarted at one.
    StreakReset {
        previous_streak: u32,
        at: DateTime<Utc>,
    },
    PointsAwarded {
        points: u32,
        total: u64,
        points_today: u64,
        at: DateTime<Utc>,
    },
}

impl EngineEvent {
    /// Stable snake_case name for log lines and analytics.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::SelectionMade { .. } => "selection_made",
            EngineEvent::CacheMigrated { .. } => "cache_migrated",
            EngineEvent::PlanGenerated { .. } => "plan_generated",
            EngineEvent::QuotaBlocked { .. } => "quota_blocked",
            EngineEvent::QuotaConsumed { .. } => "quota_consumed",
            EngineEvent::StreakIncremented { .. } => "streak_incremented",
            EngineEvent::StreakReset { .. } => "streak_reset",
            EngineEvent::PointsAwarded { .. } => "points_awarded",
        }
    }
}

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("telemetry sink rejected event: {0}")]
    Rejected(String),

    #[error("telemetry serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where engine events go. Failures are the sink's problem; the engine only
/// logs them.
pub trait TelemetrySink {
    fn emit(&self, event: &EngineEvent) -> Result<(), TelemetryError>;
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for std::rc::Rc<S> {
    fn emit(&self, event: &EngineEvent) -> Result<(), TelemetryError> {
        (**self).emit(event)
    }
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn emit(&self, _event: &EngineEvent) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Writes each event as a JSON payload at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn emit(&self, event: &EngineEvent) -> Result<(), TelemetryError> {
        let payload = serde_json::to_string(event)?;
        tracing::info!(target: "dailypick::telemetry", event = event.name(), %payload);
        Ok(())
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: RefCell<Vec<EngineEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.borrow().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(EngineEvent::name).collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl TelemetrySink for MemorySink {
    fn emit(&self, event: &EngineEvent) -> Result<(), TelemetryError> {
        self.events.borrow_mut().push(event.clone());
        Ok(())
    }
}
