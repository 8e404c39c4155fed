use std::{fmt::Display, path::Path};

use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{Parser, ValueEnum};
use tracing::info;

use crate::{
    report::{load_summary, DailyTotal},
    settings::{Settings, SETTINGS_FILE_NAME},
    storage::{
        history_store::{FileHistoryStore, HistoryStore},
        HISTORY_FILE_NAME,
    },
    utils::time::{date_to_record_name, format_minutes},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct HistoryCommand {
    #[arg(long, help = "Number of days to show. Defaults to the summary_days setting")]
    days: Option<u32>,
    #[arg(
        long = "as-of",
        help = "Last day of the report. Examples are \"yesterday\", \"15/03/2025\""
    )]
    as_of: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(long, help = "Print the report as json")]
    json: bool,
}

#[derive(Debug, Parser)]
pub struct CompactCommand {
    #[arg(
        long = "retention-days",
        help = "Days of history to keep. Defaults to the retention_days setting"
    )]
    retention_days: Option<u32>,
}

pub fn history_store(app_dir: &Path) -> Result<FileHistoryStore> {
    Ok(FileHistoryStore::new(app_dir.join(HISTORY_FILE_NAME))?)
}

/// Prints total screen time for each of the last days.
pub async fn process_history_command(
    HistoryCommand {
        days,
        as_of,
        date_style,
        json,
    }: HistoryCommand,
    app_dir: &Path,
) -> Result<()> {
    let settings = Settings::load(&app_dir.join(SETTINGS_FILE_NAME)).await?;
    let days = days.unwrap_or(settings.summary_days);
    let as_of = parse_as_of(as_of, date_style)?;

    let summary = load_summary(&history_store(app_dir)?, days, as_of).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render_report(&summary));
    }
    Ok(())
}

pub async fn process_compact_command(
    CompactCommand { retention_days }: CompactCommand,
    app_dir: &Path,
) -> Result<()> {
    let settings = Settings::load(&app_dir.join(SETTINGS_FILE_NAME)).await?;
    let retention_days = retention_days.unwrap_or(settings.retention_days);
    let today = Local::now().date_naive();

    let dropped = history_store(app_dir)?
        .compact(retention_days, today)
        .await?;
    info!("Compaction dropped {dropped} entries");
    println!("Removed {dropped} entries older than {retention_days} days");
    Ok(())
}

fn parse_as_of(as_of: Option<String>, date_style: DateStyle) -> Result<NaiveDate> {
    let now = Local::now();
    match as_of {
        Some(value) => parse_date_string(&value, now, date_style.into())
            .map(|date| date.date_naive())
            .map_err(|e| anyhow!("Failed to validate date {value:?}: {e}")),
        None => Ok(now.date_naive()),
    }
}

/// Text report in the form of `YYYY-MM-DD: 1h 30m`, one line per day.
pub fn render_report(summary: &[DailyTotal]) -> String {
    let mut report = format!("Last {} Days Screen Time:\n\n", summary.len());
    for day in summary {
        report += &format!(
            "{}: {}\n",
            date_to_record_name(day.date),
            format_minutes(day.minutes)
        );
    }
    report
}
