//! Turns loosely typed invocations into [Command]s.
//!
//! The path is `raw json -> normalize -> NormalizedCommand -> Command`. [normalize::normalize] is
//! schema driven and knows nothing about timers, the conversion into [Command] is where the typed
//! shape of every argument is decided.

pub mod error;
pub mod normalize;
pub mod schema;

use std::fmt::Display;

use error::{ErrorCode, NormalizeError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::timer::{stats::StatsArg, TimerSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandName {
    Create,
    Start,
    Pause,
    Reset,
    End,
    Info,
    Save,
    UpdateConfig,
    ListSavedTimers,
    DeleteSavedTimer,
    Stats,
    StopBeeping,
}

impl CommandName {
    pub const ALL: [CommandName; 12] = [
        CommandName::Create,
        CommandName::Start,
        CommandName::Pause,
        CommandName::Reset,
        CommandName::End,
        CommandName::Info,
        CommandName::Save,
        CommandName::UpdateConfig,
        CommandName::ListSavedTimers,
        CommandName::DeleteSavedTimer,
        CommandName::Stats,
        CommandName::StopBeeping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandName::Create => "CREATE",
            CommandName::Start => "START",
            CommandName::Pause => "PAUSE",
            CommandName::Reset => "RESET",
            CommandName::End => "END",
            CommandName::Info => "INFO",
            CommandName::Save => "SAVE",
            CommandName::UpdateConfig => "UPDATE_CONFIG",
            CommandName::ListSavedTimers => "LIST_SAVED_TIMERS",
            CommandName::DeleteSavedTimer => "DELETE_SAVED_TIMER",
            CommandName::Stats => "STATS",
            CommandName::StopBeeping => "STOP_BEEPING",
        }
    }

    /// Exact match against the upper-cased names.
    pub fn from_canonical(name: &str) -> Option<CommandName> {
        Self::ALL.into_iter().find(|v| v.as_str() == name)
    }
}

impl Display for CommandName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical `{command, argument}` pair. The argument is exactly what the schema of `command`
/// allows: an object for option based commands, a string or a list of strings for positional ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCommand {
    pub command: CommandName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<Value>,
}

impl NormalizedCommand {
    pub fn bare(command: CommandName) -> Self {
        Self {
            command,
            argument: None,
        }
    }

    /// Builds the raw form that normalizes back into `self`.
    pub fn to_raw(&self) -> Value {
        let command = self.command.as_str();
        match &self.argument {
            Some(Value::Object(options)) => json!({ "command": command, "options": options }),
            Some(Value::String(argument)) => {
                json!({ "command": command, "options": {}, "arguments": [argument] })
            }
            Some(Value::Array(arguments)) => {
                json!({ "command": command, "options": {}, "arguments": arguments })
            }
            _ => json!({ "command": command, "options": {} }),
        }
    }
}

/// One variant per command. `None` arguments on the lifecycle commands mean "the active timer".
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create(TimerSpec),
    Start(Option<String>),
    Pause,
    Reset,
    End,
    Info,
    Save(Option<TimerSpec>),
    UpdateConfig,
    ListSavedTimers,
    DeleteSavedTimer(String),
    Stats(Option<StatsArg>),
    StopBeeping,
}

impl Command {
    pub fn name(&self) -> CommandName {
        match self {
            Command::Create(_) => CommandName::Create,
            Command::Start(_) => CommandName::Start,
            Command::Pause => CommandName::Pause,
            Command::Reset => CommandName::Reset,
            Command::End => CommandName::End,
            Command::Info => CommandName::Info,
            Command::Save(_) => CommandName::Save,
            Command::UpdateConfig => CommandName::UpdateConfig,
            Command::ListSavedTimers => CommandName::ListSavedTimers,
            Command::DeleteSavedTimer(_) => CommandName::DeleteSavedTimer,
            Command::Stats(_) => CommandName::Stats,
            Command::StopBeeping => CommandName::StopBeeping,
        }
    }

    /// Normalizes `raw` against the built-in table and parses the result.
    pub fn parse(raw: &Value) -> Result<Command, NormalizeError> {
        normalize::normalize(raw, &schema::DEFAULT_TABLE)?.try_into()
    }
}

impl TryFrom<NormalizedCommand> for Command {
    type Error = NormalizeError;

    fn try_from(
        NormalizedCommand { command, argument }: NormalizedCommand,
    ) -> Result<Self, Self::Error> {
        let parsed = match command {
            CommandName::Create => Command::Create(timer_spec(
                command,
                argument.ok_or_else(|| missing_options(command))?,
            )?),
            CommandName::Save => Command::Save(
                argument
                    .map(|argument| timer_spec(command, argument))
                    .transpose()?,
            ),
            CommandName::Start => Command::Start(argument.map(|v| text(command, v)).transpose()?),
            CommandName::Pause => Command::Pause,
            CommandName::Reset => Command::Reset,
            CommandName::End => Command::End,
            CommandName::Info => Command::Info,
            CommandName::UpdateConfig => Command::UpdateConfig,
            CommandName::ListSavedTimers => Command::ListSavedTimers,
            CommandName::DeleteSavedTimer => Command::DeleteSavedTimer(text(
                command,
                argument.ok_or_else(|| missing_argument(command))?,
            )?),
            CommandName::Stats => Command::Stats(
                argument
                    .map(|v| StatsArg::from_value(v).map_err(|e| invalid_argument(command, e)))
                    .transpose()?,
            ),
            CommandName::StopBeeping => Command::StopBeeping,
        };
        Ok(parsed)
    }
}

fn timer_spec(command: CommandName, argument: Value) -> Result<TimerSpec, NormalizeError> {
    serde_json::from_value(argument).map_err(|e| invalid_argument(command, e))
}

fn text(command: CommandName, argument: Value) -> Result<String, NormalizeError> {
    match argument {
        Value::String(v) => Ok(v),
        other => Err(invalid_argument(command, format!("expected text, got {other}"))),
    }
}

fn invalid_argument(command: CommandName, reason: impl Display) -> NormalizeError {
    NormalizeError::new(
        ErrorCode::InvalidOptionValue,
        format!("Invalid argument for \"{command}\": {reason}"),
    )
}

fn missing_options(command: CommandName) -> NormalizeError {
    NormalizeError::new(
        ErrorCode::MissingRequiredOption,
        format!("The command \"{command}\" requires options."),
    )
}

fn missing_argument(command: CommandName) -> NormalizeError {
    NormalizeError::new(
        ErrorCode::MissingRequiredMainArguments,
        format!("The command \"{command}\" is missing 1 required main argument(s)."),
    )
}
