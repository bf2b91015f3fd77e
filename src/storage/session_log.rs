use std::{
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::{Local, NaiveDate};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use crate::utils::time::date_to_record_name;

use super::entities::LogEntry;

/// Interface for abstracting storage of finished sessions.
pub trait SessionLog {
    /// Prepares the storage. Calling it more than once is harmless.
    fn init(&self) -> impl Future<Output = Result<()>>;

    /// Appends a single session to the file of the local day the session finished on.
    fn log(&self, entry: LogEntry) -> impl Future<Output = Result<()>>;

    /// Retrieves all sessions that finished on `date`.
    fn get_logs(&self, date: NaiveDate) -> impl Future<Output = Result<Vec<LogEntry>>>;
}

/// The main realization of [SessionLog]. Every day has its own json lines file.
pub struct SessionLogStorage {
    logs_dir: PathBuf,
}

impl SessionLogStorage {
    pub fn new(logs_dir: PathBuf) -> Self {
        Self { logs_dir }
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.logs_dir.join(date_to_record_name(date))
    }

    async fn read_all(path: &Path) -> Result<Vec<LogEntry>> {
        async fn extract(path: &Path) -> std::result::Result<Vec<LogEntry>, std::io::Error> {
            debug!("Extracting {path:?}");
            let file = File::open(path).await?;
            file.lock_shared()?;
            let buffer = BufReader::new(file);
            let mut lines = buffer.lines();
            let mut entries = vec![];
            while let Ok(Some(v)) = lines.next_line().await {
                if v.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<LogEntry>(&v) {
                    Ok(v) => entries.push(v),
                    Err(e) => {
                        // A write cut off by a shutdown leaves a partial line behind
                        warn!(
                            "During parsing in path {:?} found illegal json string {}:  {e}",
                            path, &v
                        )
                    }
                }
            }

            lines.into_inner().into_inner().unlock_async().await?;

            Ok(entries)
        }

        match extract(path).await {
            Ok(s) => Ok(s),
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    Ok(vec![])
                } else {
                    Err(e)?
                }
            }
        }
    }

    async fn append_with_file(file: &mut File, entry: &LogEntry) -> Result<()> {
        let mut buffer = serde_json::to_vec(entry)?;
        buffer.push(b'\n');
        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(())
    }
}

impl SessionLog for SessionLogStorage {
    async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.logs_dir).await?;
        Ok(())
    }

    async fn log(&self, entry: LogEntry) -> Result<()> {
        let date = entry.timestamp.with_timezone(&Local).date_naive();
        let mut file = File::options()
            .append(true)
            .create(true)
            .open(self.path_for(date))
            .await?;

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = Self::append_with_file(&mut file, &entry).await;
        file.unlock_async().await?;
        result
    }

    async fn get_logs(&self, date: NaiveDate) -> Result<Vec<LogEntry>> {
        Self::read_all(&self.path_for(date)).await
    }
}
