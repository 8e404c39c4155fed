use std::{fmt::Display, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{error::RecordParseError, utils::time::date_to_record_name};

/// One completed session. Several records may share a date, they are summed when reporting.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize, Clone, Copy)]
pub struct SessionRecord {
    pub date: NaiveDate,
    pub minutes: u32,
}

impl SessionRecord {
    pub fn new(date: NaiveDate, minutes: u32) -> Self {
        Self { date, minutes }
    }

    /// Line representation used by the history log, including the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl Display for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", date_to_record_name(self.date), self.minutes)
    }
}

impl FromStr for SessionRecord {
    type Err = RecordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (date, minutes) = s
            .trim()
            .split_once('|')
            .ok_or(RecordParseError::MissingSeparator)?;
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|_| RecordParseError::InvalidDate(date.into()))?;
        let minutes = minutes
            .trim()
            .parse::<u32>()
            .map_err(|_| RecordParseError::InvalidMinutes(minutes.into()))?;
        Ok(Self { date, minutes })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::error::RecordParseError;

    use super::SessionRecord;

    #[test]
    fn test_record_line_format() {
        let record = SessionRecord::new(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(), 90);
        assert_eq!(record.to_line(), "2024-01-05|90\n");
    }

    #[test]
    fn test_record_parse_trims_line_ending() {
        let record = "2024-01-05|90\r\n".parse::<SessionRecord>().unwrap();
        assert_eq!(
            record,
            SessionRecord::new(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(), 90)
        );
    }

    #[test]
    fn test_record_parse_errors() {
        assert_eq!(
            "garbage".parse::<SessionRecord>(),
            Err(RecordParseError::MissingSeparator)
        );
        assert_eq!(
            "2024-13-01|5".parse::<SessionRecord>(),
            Err(RecordParseError::InvalidDate("2024-13-01".into()))
        );
        assert_eq!(
            "2024-01-01|-5".parse::<SessionRecord>(),
            Err(RecordParseError::InvalidMinutes("-5".into()))
        );
        assert_eq!(
            "2024-01-01|".parse::<SessionRecord>(),
            Err(RecordParseError::InvalidMinutes("".into()))
        );
    }
}
