use chrono::NaiveDate;

pub const MS_IN_ONE_SECOND: i64 = 1000;
pub const MS_IN_ONE_DAY: i64 = 24 * 60 * 60 * MS_IN_ONE_SECOND;

/// This is the standard way of converting a date to a file name in prodtimer.
pub fn date_to_record_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Renders milliseconds as `1h2m3s`, dropping leading zero units.
pub fn format_duration_ms(ms: u64) -> String {
    let seconds = ms / MS_IN_ONE_SECOND as u64;
    let (hours, minutes, seconds) = (seconds / 3600, seconds / 60 % 60, seconds % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{date_to_record_name, format_duration_ms};

    #[test]
    fn record_names() {
        assert_eq!(
            date_to_record_name(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()),
            "2024-01-05"
        );
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration_ms(12), "0s");
        assert_eq!(format_duration_ms(61_000), "1m1s");
        assert_eq!(format_duration_ms(10 * 3_600_000 + 61_000), "10h1m1s");
    }
}
