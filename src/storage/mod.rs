//!  Session history is kept through [history_store::HistoryStore].
//!  The basic idea is:
//!   - There is a single append-only log with one line per completed session.
//!   - Lines are `YYYY-MM-DD|minutes`, several lines may share a date.
//!   - After every append the log is compacted down to the retention window.

pub mod entities;
pub mod history_store;

/// Name of the log file inside the application directory.
pub const HISTORY_FILE_NAME: &str = "screen_time_history.txt";

/// Days of history kept by default.
pub const DEFAULT_RETENTION_DAYS: u32 = 7;
