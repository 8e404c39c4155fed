use std::fmt::Display;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{info, trace};

use crate::{error::TrackerError, utils::time::format_countdown};

/// Default "look away" interval, 20 minutes.
pub const DEFAULT_SHORT_INTERVAL: u64 = 20 * 60;
/// Default break interval, 60 minutes.
pub const DEFAULT_LONG_INTERVAL: u64 = 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ReminderKind {
    /// Short interval reminder to look at something far away.
    #[value(alias = "short")]
    LookAway,
    /// Long interval reminder to step away from the screen.
    #[value(alias = "long")]
    Break,
}

impl Display for ReminderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReminderKind::LookAway => write!(f, "look-away"),
            ReminderKind::Break => write!(f, "break"),
        }
    }
}

/// What happens to the session once a reminder fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FirePolicy {
    /// Any reminder suspends both countdowns and ends the session. The user starts a new session
    /// once the reminder has been dealt with.
    #[default]
    PauseSession,
    /// Only the fired countdown is reset, the session keeps running.
    Continue,
}

impl Display for FirePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FirePolicy::PauseSession => write!(f, "pause-session"),
            FirePolicy::Continue => write!(f, "continue"),
        }
    }
}

/// Remaining and configured seconds of both countdowns. `remaining` never exceeds `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountdownPair {
    pub short_remaining: u64,
    pub long_remaining: u64,
    pub short_interval: u64,
    pub long_interval: u64,
}

impl CountdownPair {
    fn full(short_interval: u64, long_interval: u64) -> Self {
        Self {
            short_remaining: short_interval,
            long_remaining: long_interval,
            short_interval,
            long_interval,
        }
    }

    pub fn remaining(&self, kind: ReminderKind) -> u64 {
        match kind {
            ReminderKind::LookAway => self.short_remaining,
            ReminderKind::Break => self.long_remaining,
        }
    }
}

impl Display for CountdownPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "look away in {}, break in {}",
            format_countdown(self.short_remaining),
            format_countdown(self.long_remaining)
        )
    }
}

/// Two independent countdowns that tick while the owning session is active.
#[derive(Debug, Clone)]
pub struct ReminderScheduler {
    countdowns: CountdownPair,
    policy: FirePolicy,
    armed: bool,
}

impl Default for ReminderScheduler {
    fn default() -> Self {
        Self {
            countdowns: CountdownPair::full(DEFAULT_SHORT_INTERVAL, DEFAULT_LONG_INTERVAL),
            policy: FirePolicy::default(),
            armed: false,
        }
    }
}

impl ReminderScheduler {
    pub fn new(
        short_interval: u64,
        long_interval: u64,
        policy: FirePolicy,
    ) -> Result<Self, TrackerError> {
        let mut scheduler = Self {
            policy,
            ..Self::default()
        };
        scheduler.configure(short_interval, long_interval)?;
        Ok(scheduler)
    }

    pub fn countdowns(&self) -> CountdownPair {
        self.countdowns
    }

    pub fn policy(&self) -> FirePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: FirePolicy) {
        self.policy = policy;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Lets [ReminderScheduler::tick] count down. Countdown progress is kept across disarm/arm.
    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    /// Replaces both intervals and restarts both countdowns from the new values, discarding any
    /// progress. Invalid values leave the previous configuration untouched.
    pub fn configure(
        &mut self,
        short_interval: u64,
        long_interval: u64,
    ) -> Result<(), TrackerError> {
        if short_interval == 0 || long_interval == 0 {
            return Err(TrackerError::InvalidInterval {
                short: short_interval,
                long: long_interval,
            });
        }
        self.countdowns = CountdownPair::full(short_interval, long_interval);
        info!("Reminder intervals set to {short_interval}s and {long_interval}s");
        Ok(())
    }

    /// Restarts one countdown from its full interval.
    pub fn reset(&mut self, kind: ReminderKind) {
        let countdowns = &mut self.countdowns;
        match kind {
            ReminderKind::LookAway => countdowns.short_remaining = countdowns.short_interval,
            ReminderKind::Break => countdowns.long_remaining = countdowns.long_interval,
        }
    }

    /// Advances both countdowns by one second and returns the reminders that became due. Both can
    /// fire on the same tick. Under [FirePolicy::PauseSession] firing disarms the scheduler.
    pub fn tick(&mut self) -> Vec<ReminderKind> {
        if !self.armed {
            return vec![];
        }

        self.countdowns.short_remaining = self.countdowns.short_remaining.saturating_sub(1);
        self.countdowns.long_remaining = self.countdowns.long_remaining.saturating_sub(1);
        trace!("Countdowns {}", self.countdowns);

        let mut due = Vec::new();
        for kind in [ReminderKind::LookAway, ReminderKind::Break] {
            if self.countdowns.remaining(kind) == 0 {
                info!("Reminder {kind} is due");
                due.push(kind);
                self.reset(kind);
            }
        }

        if !due.is_empty() && self.policy == FirePolicy::PauseSession {
            self.disarm();
        }
        due
    }
}
