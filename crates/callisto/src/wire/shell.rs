/*
 * shell.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

//! Requests the client sends on the Shell channel and the kernel's replies.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::wire::jupyter_message::Status;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KernelInfoRequest {}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct KernelInfoReply {
    pub status: Status,

    #[serde(default)]
    pub protocol_version: String,

    /// Name of the kernel implementation, e.g. `ipython`
    #[serde(default)]
    pub implementation: String,

    #[serde(default)]
    pub implementation_version: String,

    pub language_info: LanguageInfo,

    #[serde(default)]
    pub banner: String,

    #[serde(default)]
    pub help_links: Vec<HelpLink>,
}

/// Language block of a `kernel_info_reply`. Also stored verbatim in the
/// `language_info` entry of notebook metadata.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LanguageInfo {
    pub name: String,

    #[serde(default)]
    pub version: String,

    pub mimetype: Option<String>,

    /// Includes the leading dot, e.g. `.py`
    pub file_extension: Option<String>,

    pub pygments_lexer: Option<String>,

    /// A mode name or an object of CodeMirror options
    pub codemirror_mode: Option<Value>,

    pub nbconvert_exporter: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HelpLink {
    pub text: String,
    pub url: String,
}

/// Asks the kernel to run `code`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExecuteRequest {
    pub code: String,

    /// Silent runs neither broadcast `execute_input` nor bump the counter
    pub silent: bool,

    pub store_history: bool,

    /// Expressions the kernel evaluates after `code`, keyed by name
    pub user_expressions: Value,

    /// The kernel may only send `input_request` when this is set
    pub allow_stdin: bool,

    /// Drop queued executions if this one fails
    pub stop_on_error: bool,
}

impl ExecuteRequest {
    /// An interactive, history-recording request that allows input prompts.
    pub fn new(code: &str) -> Self {
        Self {
            code: String::from(code),
            silent: false,
            store_history: true,
            user_expressions: Value::Object(Map::new()),
            allow_stdin: true,
            stop_on_error: false,
        }
    }
}

/// Outcome of an `execute_request`. A failed run still decodes as this type;
/// the exception name and value ride along when `status` is `error`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExecuteReply {
    pub status: Status,

    #[serde(default)]
    pub execution_count: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evalue: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CompleteRequest {
    pub code: String,

    /// Offset into `code` in unicode code points
    pub cursor_pos: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CompleteReply {
    pub matches: Vec<String>,

    /// `matches` replace the text between these two offsets
    pub cursor_start: u32,
    pub cursor_end: u32,

    #[serde(default)]
    pub metadata: Value,

    pub status: Status,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InspectRequest {
    pub code: String,
    pub cursor_pos: u32,

    /// 0 for a summary, 1 for everything the kernel knows
    pub detail_level: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InspectReply {
    pub status: Status,

    /// Whether anything was found under the cursor
    pub found: bool,

    /// MIME bundle describing the object
    #[serde(default)]
    pub data: Map<String, Value>,

    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IsCompleteRequest {
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IsCompleteReply {
    pub status: IsComplete,

    /// Suggested indentation for the next line when `status` is `incomplete`
    #[serde(default)]
    pub indent: String,
}

/// The kernel's verdict on whether a fragment can run as is.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IsComplete {
    Complete,
    Incomplete,
    Invalid,
    Unknown,
}

message_types! {
    KernelInfoRequest => "kernel_info_request",
    KernelInfoReply => "kernel_info_reply",
    ExecuteRequest => "execute_request",
    ExecuteReply => "execute_reply",
    CompleteRequest => "complete_request",
    CompleteReply => "complete_reply",
    InspectRequest => "inspect_request",
    InspectReply => "inspect_reply",
    IsCompleteRequest => "is_complete_request",
    IsCompleteReply => "is_complete_reply",
}
