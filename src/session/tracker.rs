use chrono::{DateTime, Local};
use tracing::{info, trace};

use crate::{error::TrackerError, storage::entities::SessionRecord};

/// Snapshot of the tracked session. `started_at` is only present while the session is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionState {
    pub active: bool,
    pub started_at: Option<DateTime<Local>>,
    pub elapsed_seconds: u64,
}

/// Keeps track of a single usage session. Elapsed time is counted in ticks rather than taken from
/// the wall clock, so time spent suspended or paused never ends up in the history.
#[derive(Debug, Default)]
pub struct SessionTracker {
    state: SessionState,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn start(&mut self, now: DateTime<Local>) -> Result<(), TrackerError> {
        if self.state.active {
            return Err(TrackerError::AlreadyActive);
        }
        self.state = SessionState {
            active: true,
            started_at: Some(now),
            elapsed_seconds: 0,
        };
        info!("Session started at {now}");
        Ok(())
    }

    /// Counts one second of activity.
    pub fn tick(&mut self) {
        if !self.state.active {
            return;
        }
        self.state.elapsed_seconds += 1;
        trace!("Session elapsed {}s", self.state.elapsed_seconds);
    }

    /// Ends the session. Returns the record to persist when at least one whole minute has passed.
    /// Calling it on an inactive tracker does nothing.
    pub fn stop(&mut self) -> Option<SessionRecord> {
        let SessionState {
            active,
            started_at,
            elapsed_seconds,
        } = std::mem::take(&mut self.state);
        if !active {
            return None;
        }

        let minutes = u32::try_from(elapsed_seconds / 60).unwrap_or(u32::MAX);
        info!("Session stopped after {elapsed_seconds}s");

        match started_at {
            Some(started_at) if minutes > 0 => {
                Some(SessionRecord::new(started_at.date_naive(), minutes))
            }
            Some(_) | None => None,
        }
    }
}
