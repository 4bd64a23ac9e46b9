/*
 * header.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

/// Version of the messaging protocol spoken by this client
pub const PROTOCOL_VERSION: &str = "5.0";

/// Represents the header of a Jupyter message
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JupyterHeader {
    /// The message identifier; must be unique per message
    pub msg_id: String,

    /// Session ID; must be unique per session
    pub session: String,

    /// Username; must be unique per user
    pub username: String,

    /// Date/time when message was created (ISO 8601)
    pub date: String,

    /// Message type
    pub msg_type: String,

    /// Message protocol version
    pub version: String,
}

impl JupyterHeader {
    /// Creates a header for a freshly originated message, stamped with the
    /// current time.
    pub fn create(msg_id: String, msg_type: String, session: String, username: String) -> Self {
        Self {
            msg_id,
            session,
            username,
            date: chrono::Utc::now().to_rfc3339(),
            msg_type,
            version: String::from(PROTOCOL_VERSION),
        }
    }
}
