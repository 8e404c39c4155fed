use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use crate::{
    session::scheduler::FirePolicy,
    settings::{Settings, SETTINGS_FILE_NAME},
};

#[derive(Debug, Parser)]
pub struct ConfigCommand {
    #[arg(
        long,
        help = "Look-away interval in minutes",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    short: Option<u64>,
    #[arg(
        long,
        help = "Break interval in minutes",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    long: Option<u64>,
    #[arg(long = "retention-days", help = "Days of history to keep")]
    retention_days: Option<u32>,
    #[arg(long = "summary-days", help = "Days shown by the history command")]
    summary_days: Option<u32>,
    #[arg(
        long = "fire-policy",
        help = "What happens to the session once a reminder fires"
    )]
    fire_policy: Option<FirePolicy>,
}

impl ConfigCommand {
    fn is_empty(&self) -> bool {
        self.short.is_none()
            && self.long.is_none()
            && self.retention_days.is_none()
            && self.summary_days.is_none()
            && self.fire_policy.is_none()
    }

    fn apply(self, settings: Settings) -> Settings {
        Settings {
            short_interval_minutes: self.short.unwrap_or(settings.short_interval_minutes),
            long_interval_minutes: self.long.unwrap_or(settings.long_interval_minutes),
            retention_days: self.retention_days.unwrap_or(settings.retention_days),
            summary_days: self.summary_days.unwrap_or(settings.summary_days),
            fire_policy: self.fire_policy.unwrap_or(settings.fire_policy),
        }
    }
}

/// Prints settings, updating them first when any option was given.
pub async fn process_config_command(command: ConfigCommand, app_dir: &Path) -> Result<()> {
    let path = app_dir.join(SETTINGS_FILE_NAME);
    let mut settings = Settings::load(&path).await?;

    if !command.is_empty() {
        settings = command.apply(settings);
        settings.save(&path).await?;
        info!("Saved settings {settings:?}");
        println!("Settings saved successfully!");
    }

    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
