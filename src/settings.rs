use std::{io::ErrorKind, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::TrackerError,
    fs::operations::replace_file_contents,
    report::DEFAULT_SUMMARY_DAYS,
    session::scheduler::{FirePolicy, ReminderScheduler},
    storage::DEFAULT_RETENTION_DAYS,
};

pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// User settings kept in the application directory. Missing fields fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub short_interval_minutes: u64,
    pub long_interval_minutes: u64,
    pub retention_days: u32,
    pub summary_days: u32,
    pub fire_policy: FirePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            short_interval_minutes: 20,
            long_interval_minutes: 60,
            retention_days: DEFAULT_RETENTION_DAYS,
            summary_days: DEFAULT_SUMMARY_DAYS,
            fire_policy: FirePolicy::default(),
        }
    }
}

impl Settings {
    pub fn short_interval_seconds(&self) -> u64 {
        self.short_interval_minutes.saturating_mul(60)
    }

    pub fn long_interval_seconds(&self) -> u64 {
        self.long_interval_minutes.saturating_mul(60)
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.short_interval_minutes == 0 || self.long_interval_minutes == 0 {
            return Err(TrackerError::InvalidInterval {
                short: self.short_interval_seconds(),
                long: self.long_interval_seconds(),
            });
        }
        Ok(())
    }

    pub fn scheduler(&self) -> Result<ReminderScheduler, TrackerError> {
        ReminderScheduler::new(
            self.short_interval_seconds(),
            self.long_interval_seconds(),
            self.fire_policy,
        )
    }

    /// Reads settings from `path`. A missing file means defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No settings at {path:?}, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e).with_context(|| format!("failed to read {path:?}")),
        };

        let settings: Settings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings in {path:?}"))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates and writes settings to `path`. Invalid settings are never written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let mut buffer = serde_json::to_vec_pretty(self)?;
        buffer.push(b'\n');
        replace_file_contents(path, &buffer)
            .await
            .with_context(|| format!("failed to write {path:?}"))?;
        Ok(())
    }
}
