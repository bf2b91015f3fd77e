use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One finished timer session as it is stored on disk.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "elapsedTimeMS")]
    pub elapsed_time_ms: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}
