use chrono::NaiveDate;

/// This is the standard way of converting a date to a string in screentime.
pub fn date_to_record_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Formats remaining seconds of a countdown as `MM:SS`. Minutes are not wrapped into hours, so a
/// 90 minute interval shows up as `90:00`.
pub fn format_countdown(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Formats a daily total the way the history report shows it, for example `1h 30m`.
pub fn format_minutes(minutes: u32) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::{format_countdown, format_minutes};

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(1200), "20:00");
        assert_eq!(format_countdown(599), "09:59");
        assert_eq!(format_countdown(0), "00:00");
        assert_eq!(format_countdown(5400), "90:00");
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(90), "1h 30m");
        assert_eq!(format_minutes(0), "0h 0m");
        assert_eq!(format_minutes(59), "0h 59m");
    }
}
