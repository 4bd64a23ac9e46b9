/*
 * control.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::wire::jupyter_message::Status;

/// Only sent to kernels whose spec asks for message based interruption.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InterruptRequest {}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InterruptReply {
    #[serde(default = "Status::ok")]
    pub status: Status,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ShutdownRequest {
    /// Set when the kernel is expected to come back
    pub restart: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ShutdownReply {
    // Older kernels omit the status
    #[serde(default = "Status::ok")]
    pub status: Status,

    pub restart: bool,
}

message_types! {
    InterruptRequest => "interrupt_request",
    InterruptReply => "interrupt_reply",
    ShutdownRequest => "shutdown_request",
    ShutdownReply => "shutdown_reply",
}
