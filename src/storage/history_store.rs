use std::{
    io::{ErrorKind, SeekFrom},
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
    sync::Mutex,
};
use tracing::{debug, warn};

use crate::fs::operations::replace_file_contents;

use super::entities::SessionRecord;

/// Interface for the durable session log. Records are only ever appended, and only removed by
/// [HistoryStore::compact].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends a single record to the end of the log.
    async fn append(&self, record: SessionRecord) -> Result<()>;

    /// Returns every record that can be parsed. Malformed lines are skipped.
    async fn load_all(&self) -> Result<Vec<SessionRecord>>;

    /// Rewrites the log so that it only contains records inside the retention window ending at
    /// `as_of`. Returns the number of dropped lines.
    async fn compact(&self, retention_days: u32, as_of: NaiveDate) -> Result<usize>;
}

#[async_trait]
impl<T> HistoryStore for T
where
    T: Deref + Send + Sync,
    T::Target: HistoryStore,
{
    async fn append(&self, record: SessionRecord) -> Result<()> {
        self.deref().append(record).await
    }

    async fn load_all(&self) -> Result<Vec<SessionRecord>> {
        self.deref().load_all().await
    }

    async fn compact(&self, retention_days: u32, as_of: NaiveDate) -> Result<usize> {
        self.deref().compact(retention_days, as_of).await
    }
}

/// Window is `[as_of - retention_days, as_of]` with both ends included.
pub fn within_retention(date: NaiveDate, retention_days: u32, as_of: NaiveDate) -> bool {
    let cutoff = as_of
        .checked_sub_days(Days::new(retention_days.into()))
        .unwrap_or(NaiveDate::MIN);
    cutoff <= date && date <= as_of
}

/// Parses log contents line by line. Lines that fail to parse are reported and dropped.
fn parse_lines<'a>(
    lines: impl IntoIterator<Item = &'a str>,
    source: &str,
) -> Vec<SessionRecord> {
    lines
        .into_iter()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match line.parse::<SessionRecord>() {
            Ok(record) => Some(record),
            Err(e) => {
                // Usually a write cut off by a shutdown or a hand edited file.
                warn!("Skipping malformed history line {line:?} in {source}: {e}");
                None
            }
        })
        .collect()
}

/// Keeps retained records and renders them back into log form.
fn retained_lines(
    records: &[SessionRecord],
    retention_days: u32,
    as_of: NaiveDate,
) -> (Vec<SessionRecord>, String) {
    let kept = records
        .iter()
        .copied()
        .filter(|record| within_retention(record.date, retention_days, as_of))
        .collect::<Vec<_>>();
    let buffer = kept.iter().map(SessionRecord::to_line).collect::<String>();
    (kept, buffer)
}

/// The main realization of [HistoryStore]. A single text file with one `YYYY-MM-DD|minutes`
/// record per line.
pub struct FileHistoryStore {
    path: PathBuf,
}

impl FileHistoryStore {
    pub fn new(path: PathBuf) -> Result<Self, std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_locked(file: &mut File) -> Result<String, std::io::Error> {
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).await?;
        // Invalid utf-8 only breaks the lines it appears in, which then fail to parse.
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Empty files count as terminated.
    async fn ends_with_newline(file: &mut File) -> Result<bool, std::io::Error> {
        if file.metadata().await?.len() == 0 {
            return Ok(true);
        }
        file.seek(SeekFrom::End(-1)).await?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last).await?;
        Ok(last[0] == b'\n')
    }

    async fn open_existing(&self) -> Result<Option<File>, std::io::Error> {
        match File::options().read(true).write(true).open(&self.path).await {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn append(&self, record: SessionRecord) -> Result<()> {
        let mut file = File::options()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .await?;

        file.lock_exclusive()?;
        let result = async {
            let mut line = record.to_line();
            // A torn last line must stay on its own, otherwise it swallows this record.
            if !Self::ends_with_newline(&mut file).await? {
                warn!("History {:?} doesn't end with a newline", self.path);
                line.insert(0, '\n');
            }
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
            file.sync_data().await
        }
        .await;
        file.unlock_async().await?;

        result?;
        debug!("Appended {record} to {:?}", self.path);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<SessionRecord>> {
        let Some(mut file) = self.open_existing().await? else {
            return Ok(vec![]);
        };

        file.lock_shared()?;
        let contents = Self::read_locked(&mut file).await;
        file.unlock_async().await?;

        let contents = contents?;
        Ok(parse_lines(contents.lines(), &self.path.to_string_lossy()))
    }

    async fn compact(&self, retention_days: u32, as_of: NaiveDate) -> Result<usize> {
        let Some(mut file) = self.open_existing().await? else {
            return Ok(0);
        };

        file.lock_exclusive()?;
        let result = async {
            let contents = Self::read_locked(&mut file).await?;
            let total = contents.lines().filter(|l| !l.trim().is_empty()).count();
            let records = parse_lines(contents.lines(), &self.path.to_string_lossy());
            let (kept, buffer) = retained_lines(&records, retention_days, as_of);

            let dropped = total - kept.len();
            if dropped > 0 || buffer.len() != contents.len() {
                replace_file_contents(&self.path, buffer.as_bytes()).await?;
            }
            Ok::<_, anyhow::Error>(dropped)
        }
        .await;
        file.unlock_async().await?;

        let dropped = result?;
        debug!(
            "Compacted {:?} as of {as_of} keeping {retention_days} days, dropped {dropped} lines",
            self.path
        );
        Ok(dropped)
    }
}

/// In-memory [HistoryStore]. Keeps raw lines so that it behaves like the file log, malformed
/// entries included.
#[derive(Default)]
pub struct MemoryHistoryStore {
    lines: Mutex<Vec<String>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lines(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            lines: Mutex::new(lines.into_iter().map(Into::into).collect()),
        }
    }

    /// Raw contents of the log.
    pub async fn lines(&self) -> Vec<String> {
        self.lines.lock().await.clone()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, record: SessionRecord) -> Result<()> {
        self.lines.lock().await.push(record.to_string());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<SessionRecord>> {
        let lines = self.lines.lock().await;
        Ok(parse_lines(lines.iter().map(String::as_str), "memory"))
    }

    async fn compact(&self, retention_days: u32, as_of: NaiveDate) -> Result<usize> {
        let mut lines = self.lines.lock().await;
        let records = parse_lines(lines.iter().map(String::as_str), "memory");
        let (kept, _) = retained_lines(&records, retention_days, as_of);
        let dropped = lines.len() - kept.len();
        *lines = kept.iter().map(ToString::to_string).collect();
        Ok(dropped)
    }
}
