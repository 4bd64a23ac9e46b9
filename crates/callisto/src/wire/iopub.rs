/*
 * iopub.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

//! Broadcasts the kernel publishes on IOPub. `status` lives in its own module
//! next to the shared execution state.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

/// Echo of the code the kernel is about to run.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExecuteInput {
    pub code: String,
    pub execution_count: u32,
}

/// Text written to one of the kernel's standard streams.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StreamOutput {
    pub name: Stream,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Stdout,
    Stderr,
}

/// The value of the last expression, as a MIME bundle.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExecuteResult {
    pub data: Map<String, Value>,
    pub execution_count: u32,

    #[serde(default)]
    pub metadata: Value,
}

/// Rich output that is not the value of an expression (plots, tables).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DisplayData {
    pub data: Map<String, Value>,

    #[serde(default)]
    pub metadata: Value,

    /// Not persisted; carries `display_id` among other things
    #[serde(default)]
    pub transient: Value,
}

/// Failure broadcast. The shell `execute_reply` for the same request reports
/// the failure separately.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExecuteError {
    #[serde(flatten)]
    pub exception: Exception,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Exception {
    pub ename: String,
    pub evalue: String,

    #[serde(default)]
    pub traceback: Vec<String>,
}

// Comm traffic is decoded so it is not reported as malformed. The client
// does not act on it.

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CommOpen {
    pub comm_id: String,
    pub target_name: String,

    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CommWireMsg {
    pub comm_id: String,

    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CommClose {
    pub comm_id: String,

    #[serde(default)]
    pub data: Value,
}

message_types! {
    ExecuteInput => "execute_input",
    StreamOutput => "stream",
    ExecuteResult => "execute_result",
    DisplayData => "display_data",
    ExecuteError => "error",
    CommOpen => "comm_open",
    CommWireMsg => "comm_msg",
    CommClose => "comm_close",
}
