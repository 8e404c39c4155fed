//! Session core. [SessionContext] ties the tracker, the reminder countdowns and the history log
//! together, [driver::SessionDriver] owns a context and feeds it commands and ticks.

use anyhow::Context;
use chrono::{DateTime, Local};
use scheduler::{CountdownPair, FirePolicy, ReminderKind, ReminderScheduler};
use tracing::{debug, info};
use tracker::{SessionState, SessionTracker};

use crate::{
    error::TrackerError,
    storage::{entities::SessionRecord, history_store::HistoryStore},
};

pub mod driver;
pub mod scheduler;
pub mod shutdown;
pub mod tracker;

/// Point in time view of a session used by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session: SessionState,
    pub countdowns: CountdownPair,
    pub policy: FirePolicy,
}

/// Everything that makes up a single tracked session. There is no global state, the context is
/// created by whoever drives the session and passed around explicitly.
pub struct SessionContext<S> {
    tracker: SessionTracker,
    scheduler: ReminderScheduler,
    store: S,
    retention_days: u32,
}

impl<S: HistoryStore> SessionContext<S> {
    pub fn new(scheduler: ReminderScheduler, store: S, retention_days: u32) -> Self {
        Self {
            tracker: SessionTracker::new(),
            scheduler,
            store,
            retention_days,
        }
    }

    pub fn is_active(&self) -> bool {
        self.tracker.is_active()
    }

    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }

    pub fn countdowns(&self) -> CountdownPair {
        self.scheduler.countdowns()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.tracker.state(),
            countdowns: self.scheduler.countdowns(),
            policy: self.scheduler.policy(),
        }
    }

    pub fn start(&mut self, now: DateTime<Local>) -> Result<(), TrackerError> {
        self.tracker.start(now)?;
        self.scheduler.arm();
        Ok(())
    }

    /// Advances the session by one second. Returns reminders that became due on this tick.
    pub fn tick(&mut self) -> Vec<ReminderKind> {
        if !self.tracker.is_active() {
            return vec![];
        }
        self.tracker.tick();
        self.scheduler.tick()
    }

    /// The session was suspended by a fired reminder and should be stopped.
    pub fn pause_requested(&self) -> bool {
        self.tracker.is_active() && !self.scheduler.is_armed()
    }

    pub fn configure(
        &mut self,
        short_interval: u64,
        long_interval: u64,
    ) -> Result<(), TrackerError> {
        self.scheduler.configure(short_interval, long_interval)
    }

    pub fn reset(&mut self, kind: ReminderKind) {
        self.scheduler.reset(kind);
    }

    /// Ends the session and writes it to history when it lasted at least a minute. The log is
    /// compacted right after the append. Session state is reset even when persisting fails.
    pub async fn stop(
        &mut self,
        now: DateTime<Local>,
    ) -> Result<Option<SessionRecord>, TrackerError> {
        self.scheduler.disarm();
        let Some(record) = self.tracker.stop() else {
            debug!("Nothing to record");
            return Ok(None);
        };

        self.store
            .append(record)
            .await
            .with_context(|| format!("failed to append session {record}"))
            .map_err(TrackerError::Persistence)?;
        info!("Recorded session {record}");

        self.store
            .compact(self.retention_days, now.date_naive())
            .await
            .map_err(|source| TrackerError::Compaction { record, source })?;
        Ok(Some(record))
    }
}
