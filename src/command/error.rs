use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable codes attached to every validation failure. They are sent to the client as is, so
/// renaming a variant's string is a breaking change for scripts parsing the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "UNKNOWN_COMMAND")]
    UnknownCommand,
    #[serde(rename = "MISSING_PROPERTY")]
    MissingProperty,
    #[serde(rename = "INVALID_COMMAND_OBJECT")]
    InvalidCommandObject,
    #[serde(rename = "INVALID_COMMAND")]
    InvalidCommand,
    #[serde(rename = "INVALID_OPTIONS_OBJECT")]
    InvalidOptionsObject,
    #[serde(rename = "INVALID_MAIN_ARGUMENTS")]
    InvalidMainArguments,
    #[serde(rename = "MISSING_REQUIRED_MAIN_ARGUMENT(S)")]
    MissingRequiredMainArguments,
    #[serde(rename = "MISSING_REQUIRED_OPTION")]
    MissingRequiredOption,
    #[serde(rename = "INVALID_OPTION_TYPE")]
    InvalidOptionType,
    #[serde(rename = "INVALID_OPTION_VALUE")]
    InvalidOptionValue,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnknownCommand => "UNKNOWN_COMMAND",
            ErrorCode::MissingProperty => "MISSING_PROPERTY",
            ErrorCode::InvalidCommandObject => "INVALID_COMMAND_OBJECT",
            ErrorCode::InvalidCommand => "INVALID_COMMAND",
            ErrorCode::InvalidOptionsObject => "INVALID_OPTIONS_OBJECT",
            ErrorCode::InvalidMainArguments => "INVALID_MAIN_ARGUMENTS",
            ErrorCode::MissingRequiredMainArguments => "MISSING_REQUIRED_MAIN_ARGUMENT(S)",
            ErrorCode::MissingRequiredOption => "MISSING_REQUIRED_OPTION",
            ErrorCode::InvalidOptionType => "INVALID_OPTION_TYPE",
            ErrorCode::InvalidOptionValue => "INVALID_OPTION_VALUE",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validation fault produced while turning a raw invocation into a [Command](super::Command).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct NormalizeError {
    pub code: ErrorCode,
    pub message: String,
}

impl NormalizeError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
