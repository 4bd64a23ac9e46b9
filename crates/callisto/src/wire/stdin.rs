/*
 * stdin.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

/// The kernel wants a line of text from the user.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InputRequest {
    pub prompt: String,

    /// The answer should be masked while typed
    pub password: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InputReply {
    pub value: String,
}

message_types! {
    InputRequest => "input_request",
    InputReply => "input_reply",
}
