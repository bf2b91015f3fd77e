//! Messages exchanged between the cli and the daemon. Every connection carries one [Request] line
//! and one [Response] line.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::{
    command::error::{ErrorCode, NormalizeError},
    timer::manager::Output,
};

pub const DEFAULT_ADDRESS: &str = "127.0.0.1:53117";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Request {
    Ping,
    Quit,
    /// Loosely typed invocation, see [crate::command::normalize].
    Command { command: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl Response {
    pub fn ok(data: Option<Value>) -> Self {
        Self {
            success: true,
            data,
            message: None,
            code: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            code: None,
        }
    }

    pub fn from_output(output: Output) -> Self {
        if output == Output::Done {
            return Self::ok(None);
        }
        match serde_json::to_value(output) {
            Ok(data) => Self::ok(Some(data)),
            Err(e) => {
                error!("Failed to serialize command output {e:?}");
                Self::failure(format!("Failed to serialize the result: {e}"))
            }
        }
    }
}

impl From<NormalizeError> for Response {
    fn from(NormalizeError { code, message }: NormalizeError) -> Self {
        Self {
            code: Some(code),
            ..Self::failure(message)
        }
    }
}
