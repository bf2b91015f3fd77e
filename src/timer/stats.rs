use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{storage::entities::LogEntry, utils::time::MS_IN_ONE_DAY};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    #[error("Cannot go \"{0}\" days back from today.")]
    InvalidDayCount(String),
    #[error("Invalid date string: \"{0}\". Use format: \"mm-dd-yyyy\".")]
    InvalidDate(String),
}

/// Which day `STATS` reports on. Values are validated on [resolution](resolve_date).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsArg {
    DaysAgo(i64),
    Date(String),
}

impl StatsArg {
    /// Numbers and numeric text are day counts, any other text is a date.
    pub fn from_value(value: Value) -> Result<StatsArg, StatsError> {
        match value {
            Value::Number(number) => number
                .as_i64()
                .map(StatsArg::DaysAgo)
                .ok_or_else(|| StatsError::InvalidDayCount(number.to_string())),
            Value::String(text) => Ok(match text.trim().parse::<i64>() {
                Ok(days) => StatsArg::DaysAgo(days),
                Err(_) => StatsArg::Date(text),
            }),
            other => Err(StatsError::InvalidDate(other.to_string())),
        }
    }
}

/// Resolves the day to report on. No argument means today.
pub fn resolve_date<Tz: TimeZone>(
    arg: Option<&StatsArg>,
    now: DateTime<Tz>,
) -> Result<NaiveDate, StatsError> {
    match arg {
        None => Ok(now.date_naive()),
        Some(StatsArg::DaysAgo(days)) => {
            let invalid = || StatsError::InvalidDayCount(days.to_string());
            if *days <= 0 {
                return Err(invalid());
            }
            let back = days
                .checked_mul(MS_IN_ONE_DAY)
                .and_then(TimeDelta::try_milliseconds)
                .ok_or_else(invalid)?;
            now.checked_sub_signed(back)
                .map(|v| v.date_naive())
                .ok_or_else(invalid)
        }
        Some(StatsArg::Date(text)) => parse_us_date(text),
    }
}

/// Parses `mm-dd-yyyy` (or `mm/dd/yyyy`) into a real calendar date.
pub fn parse_us_date(text: &str) -> Result<NaiveDate, StatsError> {
    let invalid = || StatsError::InvalidDate(text.to_string());
    let bytes = text.as_bytes();
    if bytes.len() != 10 {
        return Err(invalid());
    }

    let separator = bytes[2];
    if !matches!(separator, b'-' | b'/') || bytes[5] != separator {
        return Err(invalid());
    }

    let digits_only = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 2 || i == 5 || b.is_ascii_digit());
    if !digits_only {
        return Err(invalid());
    }

    let month = text[0..2].parse::<u32>().map_err(|_| invalid())?;
    let day = text[3..5].parse::<u32>().map_err(|_| invalid())?;
    let year = text[6..10].parse::<i32>().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerStats {
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub total_duration_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedStats {
    pub timer_count: u64,
    pub total_duration_ms: u64,
    pub timers: BTreeMap<String, TimerStats>,
}

/// Folds a day of sessions into totals. The first description seen for a name is kept.
pub fn aggregate(entries: impl IntoIterator<Item = LogEntry>) -> AggregatedStats {
    let mut stats = AggregatedStats::default();

    for LogEntry {
        name,
        description,
        elapsed_time_ms,
        ..
    } in entries
    {
        stats.timer_count += 1;
        stats.total_duration_ms += elapsed_time_ms;

        let timer = stats.timers.entry(name).or_insert_with(|| TimerStats {
            count: 0,
            description,
            total_duration_ms: 0,
        });
        timer.count += 1;
        timer.total_duration_ms += elapsed_time_ms;
    }

    stats
}
