use std::{collections::BTreeMap, future::Future, io::ErrorKind, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::timer::{TimerBrief, TimerError};

pub const DEFAULT_BEEP_DURATION_MS: u64 = 3_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No saved timer with name: \"{0}\"")]
    UnknownTimer(String),
    #[error("Invalid timer: {0}")]
    InvalidTimer(#[from] TimerError),
    #[error("Failed to access config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid json in config file {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerConfig {
    /// Milliseconds.
    #[serde(default = "default_beep_duration")]
    pub beep_duration: u64,
    #[serde(default)]
    pub saved_timers: BTreeMap<String, TimerBrief>,
}

fn default_beep_duration() -> u64 {
    DEFAULT_BEEP_DURATION_MS
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            beep_duration: DEFAULT_BEEP_DURATION_MS,
            saved_timers: BTreeMap::new(),
        }
    }
}

/// Source of the beep duration and saved timers.
pub trait ConfigStore {
    /// Makes sure a config exists and loads it. Calling it more than once is harmless.
    fn init(&mut self) -> impl Future<Output = Result<(), ConfigError>>;

    /// Reloads the config from its source.
    fn update_config(&mut self) -> impl Future<Output = Result<(), ConfigError>>;

    /// Last loaded snapshot.
    fn get_config(&self) -> &TimerConfig;

    /// Saves a timer under its name, replacing a previous timer with the same name. Untrusted
    /// timers are validated first.
    fn save_timer(
        &mut self,
        timer: TimerBrief,
        is_trusted: bool,
    ) -> impl Future<Output = Result<(), ConfigError>>;

    fn delete_saved_timer(&mut self, name: &str) -> impl Future<Output = Result<(), ConfigError>>;
}

/// [ConfigStore] backed by a json file. Writes go to a sibling temporary file that is renamed over
/// the original, so a crash never leaves half a config behind.
pub struct JsonConfigStore {
    path: PathBuf,
    config: TimerConfig,
}

impl JsonConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            config: TimerConfig::default(),
        }
    }

    fn io_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn read(&self) -> Result<Option<TimerConfig>, ConfigError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| ConfigError::Json {
                path: self.path.clone(),
                source,
            })
    }

    async fn write(&self, config: &TimerConfig) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Json {
            path: self.path.clone(),
            source,
        })?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let temporary = self.path.with_extension("json.tmp");
        tokio::fs::write(&temporary, text)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&temporary, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        debug!("Wrote config {:?}", self.path);
        Ok(())
    }
}

impl ConfigStore for JsonConfigStore {
    async fn init(&mut self) -> Result<(), ConfigError> {
        match self.read().await? {
            Some(config) => self.config = config,
            None => {
                info!("Creating default config at {:?}", self.path);
                self.config = TimerConfig::default();
                self.write(&self.config).await?;
            }
        }
        Ok(())
    }

    async fn update_config(&mut self) -> Result<(), ConfigError> {
        self.config = self.read().await?.unwrap_or_default();
        Ok(())
    }

    fn get_config(&self) -> &TimerConfig {
        &self.config
    }

    async fn save_timer(&mut self, timer: TimerBrief, is_trusted: bool) -> Result<(), ConfigError> {
        if !is_trusted {
            timer.validate()?;
        }
        let mut config = self.read().await?.unwrap_or_default();
        config.saved_timers.insert(timer.name.clone(), timer);
        self.write(&config).await?;
        self.config = config;
        Ok(())
    }

    async fn delete_saved_timer(&mut self, name: &str) -> Result<(), ConfigError> {
        let mut config = self.read().await?.unwrap_or_default();
        if config.saved_timers.remove(name).is_none() {
            return Err(ConfigError::UnknownTimer(name.to_string()));
        }
        self.write(&config).await?;
        self.config = config;
        Ok(())
    }
}
