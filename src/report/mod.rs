//! Turns raw history records into per day totals.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::storage::{entities::SessionRecord, history_store::HistoryStore};

/// Days shown in the history report by default.
pub const DEFAULT_SUMMARY_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub minutes: u32,
}

/// Returns one entry for each of the last `days` dates ending at `as_of`, oldest first. Minutes
/// of records sharing a date are summed, dates without records report zero.
pub fn summarize(records: &[SessionRecord], days: u32, as_of: NaiveDate) -> Vec<DailyTotal> {
    let mut by_date = HashMap::<NaiveDate, u32>::new();
    for record in records {
        let total = by_date.entry(record.date).or_default();
        *total = total.saturating_add(record.minutes);
    }

    (0..days)
        .rev()
        .filter_map(|offset| as_of.checked_sub_days(Days::new(offset.into())))
        .map(|date| DailyTotal {
            date,
            minutes: by_date.get(&date).copied().unwrap_or(0),
        })
        .collect()
}

/// Reloads history from `store` and summarizes it.
pub async fn load_summary(
    store: &impl HistoryStore,
    days: u32,
    as_of: NaiveDate,
) -> Result<Vec<DailyTotal>> {
    let records = store.load_all().await?;
    Ok(summarize(&records, days, as_of))
}
