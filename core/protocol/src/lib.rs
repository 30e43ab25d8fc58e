//! Wire protocol types and validation for the Trailhead session engine.
//!
//! This crate is shared by the engine and its transports to prevent schema
//! drift. Every message is a JSON object of the form
//! `{"type": "...", "data": {...}}`: inbound messages are reports from the
//! process host, outbound messages are requests the engine makes of it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024; // 1MB
pub const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

// -----------------------------------------------------------------------------
// Inbound (process host -> engine)
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InboundMessage {
    #[serde(rename = "RUNNING")]
    Running(RunningData),
    #[serde(rename = "STDOUT")]
    Stdout(StdioData),
    #[serde(rename = "STDERR")]
    Stderr(StdioData),
    #[serde(rename = "EXIT")]
    Exit(ExitData),
    #[serde(rename = "file_modified")]
    FileModified(FileModifiedData),
    /// Inspector result. Carried opaquely; the engine does not consume it.
    #[serde(rename = "INSPECT")]
    Inspect(Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningData {
    pub request_id: String,
    pub pid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdioData {
    pub data: String,
    #[serde(default)]
    pub is_input_prompt: bool,
    /// Emitting process, when the host reports it. Used to drop output from a
    /// superseded run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitData {
    pub pid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileModifiedData {
    pub path: String,
}

impl InboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::Running(_) => "RUNNING",
            InboundMessage::Stdout(_) => "STDOUT",
            InboundMessage::Stderr(_) => "STDERR",
            InboundMessage::Exit(_) => "EXIT",
            InboundMessage::FileModified(_) => "file_modified",
            InboundMessage::Inspect(_) => "INSPECT",
        }
    }

    pub fn validate(&self) -> Result<(), ErrorInfo> {
        match self {
            InboundMessage::Running(data) => {
                require_string(&data.request_id, "request_id")?;
                if data.request_id.len() > MAX_REQUEST_ID_LEN {
                    return Err(ErrorInfo::new(
                        "invalid_request_id",
                        "request_id must be 128 characters or fewer",
                    ));
                }
                require_pid(data.pid)
            }
            InboundMessage::Stdout(data) | InboundMessage::Stderr(data) => match data.pid {
                Some(pid) => require_pid(pid),
                None => Ok(()),
            },
            InboundMessage::Exit(data) => require_pid(data.pid),
            InboundMessage::FileModified(data) => require_string(&data.path, "path"),
            InboundMessage::Inspect(_) => Ok(()),
        }
    }
}

/// Parses and validates a single inbound message line.
pub fn parse_message(line: &str) -> Result<InboundMessage, ErrorInfo> {
    if line.len() > MAX_MESSAGE_BYTES {
        return Err(ErrorInfo::new(
            "message_too_large",
            "message exceeded maximum size",
        ));
    }
    if line.trim().is_empty() {
        return Err(ErrorInfo::new("empty_message", "message body was empty"));
    }
    let value: Value = serde_json::from_str(line).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("message was not valid JSON: {}", err),
        )
    })?;
    parse_message_value(value)
}

/// Parses and validates an inbound message that was already decoded as JSON.
pub fn parse_message_value(value: Value) -> Result<InboundMessage, ErrorInfo> {
    let message: InboundMessage = serde_json::from_value(value).map_err(|err| {
        ErrorInfo::new(
            "invalid_message",
            format!("message does not match the protocol: {}", err),
        )
    })?;
    message.validate()?;
    Ok(message)
}

fn require_string(value: &str, field: &str) -> Result<(), ErrorInfo> {
    if value.trim().is_empty() {
        return Err(ErrorInfo::new(
            "missing_field",
            format!("{} is required", field),
        ));
    }
    Ok(())
}

fn require_pid(pid: u32) -> Result<(), ErrorInfo> {
    if pid == 0 {
        return Err(ErrorInfo::new("invalid_pid", "pid is required"));
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// Outbound (engine -> process host)
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OutboundMessage {
    /// Start `module`. The host echoes `request_id` in its RUNNING reply.
    #[serde(rename = "RUN")]
    Run { module: String, request_id: String },
    #[serde(rename = "KILL")]
    Kill { pid: u32 },
    #[serde(rename = "STDIN")]
    Stdin { data: String, pid: u32 },
    #[serde(rename = "INSPECT")]
    Inspect { path: String },
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::Run { .. } => "RUN",
            OutboundMessage::Kill { .. } => "KILL",
            OutboundMessage::Stdin { .. } => "STDIN",
            OutboundMessage::Inspect { .. } => "INSPECT",
        }
    }
}
