//! The one JSON record each personality command prints on stdout.

use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Error,
}

/// `{"status", "command", "message", ...}` result record.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub status: Status,
    pub command: String,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,

    #[serde(skip)]
    exit_code: i32,
}

impl CommandResult {
    pub fn ok(command: impl Into<String>, message: impl Into<String>, data: Value) -> Self {
        Self {
            status: Status::Ok,
            command: command.into(),
            message: message.into(),
            data: Some(data),
            code: None,
            kind: None,
            hint: None,
            exit_code: 0,
        }
    }

    pub fn error(command: impl Into<String>, error: &Error) -> Self {
        Self {
            status: Status::Error,
            command: command.into(),
            message: error.to_string(),
            data: None,
            code: Some(error.code().as_str()),
            kind: Some(error.kind()),
            hint: error.suggestion(),
            exit_code: error.exit_code(),
        }
    }

    /// Attach data to a record (used for partial results on error).
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"status":"error","command":"{}","message":"failed to encode result: {}"}}"#,
                self.command, e
            )
        })
    }

    /// Print the record as a single line on stdout.
    pub fn print(&self) {
        println!("{}", self.to_json());
    }
}
