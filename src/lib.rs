//! Terminal screen time tracker. Counts how long you have been in front of the screen, reminds you
//! to look away every so often and to take a proper break every hour, and keeps a short daily
//! history of screen time.
//!

pub mod cli;
pub mod error;
pub mod fs;
pub mod report;
pub mod session;
pub mod settings;
pub mod storage;
pub mod utils;
