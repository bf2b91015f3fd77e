//! Countdown timer and the manager that owns it.
//!
//! A [CountdownTimer] never ticks. Remaining time is derived from the instant the timer was last
//! resumed, so the owner only has to [settle](CountdownTimer::settle) it at its
//! [deadline](CountdownTimer::deadline) for natural elapsation to be observed.

pub mod manager;
pub mod stats;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use crate::{storage::entities::LogEntry, utils::clock::Clock};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("The timer is already running.")]
    AlreadyRunning,
    #[error("The timer is not running.")]
    NotRunning,
    #[error("The timer has already ended.")]
    AlreadyEnded,
    #[error("The timer has not been started.")]
    NotStarted,
    #[error("A timer must have a name.")]
    EmptyName,
    #[error("Invalid timer duration: {0}")]
    InvalidDuration(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "ms")]
    Milliseconds,
    #[serde(rename = "s")]
    Seconds,
    #[default]
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
}

impl TimeUnit {
    pub fn millis(&self) -> f64 {
        match self {
            TimeUnit::Milliseconds => 1.,
            TimeUnit::Seconds => 1_000.,
            TimeUnit::Minutes => 60_000.,
            TimeUnit::Hours => 3_600_000.,
        }
    }
}

/// User supplied description of a timer, as produced by `CREATE` and `SAVE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimerSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub duration: f64,
    #[serde(default)]
    pub unit: TimeUnit,
}

impl TimerSpec {
    pub fn to_brief(&self) -> Result<TimerBrief, TimerError> {
        let millis = self.duration * self.unit.millis();
        if !millis.is_finite() || millis < 1. || millis > u64::MAX as f64 {
            return Err(TimerError::InvalidDuration(format!(
                "{} {:?}",
                self.duration, self.unit
            )));
        }
        let brief = TimerBrief {
            name: self.name.clone(),
            description: self.description.clone(),
            duration: millis.round() as u64,
        };
        brief.validate()?;
        Ok(brief)
    }
}

/// Identity of a timer. This is what gets saved and listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerBrief {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Milliseconds.
    pub duration: u64,
}

impl TimerBrief {
    pub fn validate(&self) -> Result<(), TimerError> {
        if self.name.trim().is_empty() {
            return Err(TimerError::EmptyName);
        }
        if self.duration == 0 {
            return Err(TimerError::InvalidDuration("0ms".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerState {
    Created,
    Running,
    Paused,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerInfo {
    #[serde(flatten)]
    pub brief: TimerBrief,
    pub state: TimerState,
    pub elapsed_time: u64,
    pub remaining_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CountdownTimer {
    brief: TimerBrief,
    state: TimerState,
    /// Time accumulated before the current run.
    banked: Duration,
    /// Set only while running.
    resumed_at: Option<Instant>,
    started_at: Option<DateTime<Utc>>,
    completion: Option<LogEntry>,
}

impl CountdownTimer {
    pub fn new(brief: TimerBrief) -> Result<Self, TimerError> {
        brief.validate()?;
        Ok(Self {
            brief,
            state: TimerState::Created,
            banked: Duration::ZERO,
            resumed_at: None,
            started_at: None,
            completion: None,
        })
    }

    fn duration(&self) -> Duration {
        Duration::from_millis(self.brief.duration)
    }

    fn elapsed(&self, now: Instant) -> Duration {
        let running = self
            .resumed_at
            .map(|resumed| now.saturating_duration_since(resumed))
            .unwrap_or_default();
        (self.banked + running).min(self.duration())
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn brief(&self) -> &TimerBrief {
        &self.brief
    }

    /// Instant at which a running timer elapses.
    pub fn deadline(&self) -> Option<Instant> {
        self.resumed_at
            .map(|resumed| resumed + self.duration().saturating_sub(self.banked))
    }

    /// Ends a running timer whose remaining time reached zero.
    pub fn settle(&mut self, clock: &dyn Clock) {
        if self.state == TimerState::Running && self.elapsed(clock.instant()) >= self.duration() {
            self.finish(clock);
        }
    }

    fn finish(&mut self, clock: &dyn Clock) {
        self.banked = self.elapsed(clock.instant());
        self.resumed_at = None;
        self.state = TimerState::Ended;
        self.completion = Some(LogEntry {
            name: self.brief.name.clone(),
            description: self.brief.description.clone(),
            elapsed_time_ms: self.banked.as_millis() as u64,
            timestamp: clock.time(),
        });
    }

    /// Completion record of the session. Returned once, the first time it is asked for after the
    /// timer ended.
    pub fn take_completion(&mut self) -> Option<LogEntry> {
        self.completion.take()
    }

    pub fn start(&mut self, clock: &dyn Clock) -> Result<TimerInfo, TimerError> {
        self.settle(clock);
        match self.state {
            TimerState::Created | TimerState::Paused => {
                self.resumed_at = Some(clock.instant());
                self.started_at.get_or_insert_with(|| clock.time());
                self.state = TimerState::Running;
                Ok(self.info(clock))
            }
            TimerState::Running => Err(TimerError::AlreadyRunning),
            TimerState::Ended => Err(TimerError::AlreadyEnded),
        }
    }

    pub fn pause(&mut self, clock: &dyn Clock) -> Result<TimerInfo, TimerError> {
        self.settle(clock);
        match self.state {
            TimerState::Running => {
                self.banked = self.elapsed(clock.instant());
                self.resumed_at = None;
                self.state = TimerState::Paused;
                Ok(self.info(clock))
            }
            TimerState::Ended => Err(TimerError::AlreadyEnded),
            TimerState::Created | TimerState::Paused => Err(TimerError::NotRunning),
        }
    }

    pub fn reset(&mut self, clock: &dyn Clock) -> TimerInfo {
        self.state = TimerState::Created;
        self.banked = Duration::ZERO;
        self.resumed_at = None;
        self.started_at = None;
        self.info(clock)
    }

    pub fn end(&mut self, clock: &dyn Clock) -> Result<TimerInfo, TimerError> {
        self.settle(clock);
        match self.state {
            TimerState::Running | TimerState::Paused => {
                self.finish(clock);
                Ok(self.info(clock))
            }
            TimerState::Ended => Err(TimerError::AlreadyEnded),
            TimerState::Created => Err(TimerError::NotStarted),
        }
    }

    pub fn info(&self, clock: &dyn Clock) -> TimerInfo {
        let elapsed = self.elapsed(clock.instant()).as_millis() as u64;
        TimerInfo {
            brief: self.brief.clone(),
            state: self.state,
            elapsed_time: elapsed,
            remaining_time: self.brief.duration - elapsed,
            started_at: self.started_at,
        }
    }
}
