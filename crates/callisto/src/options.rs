/*
 * options.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::time::Duration;

/// Policy constants for talking to a kernel. None of these are mandated by
/// the protocol.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// How long each channel is polled per round of the monitor loop
    pub poll_interval: Duration,

    /// How long a blocking call waits for its reply
    pub receive_timeout: Duration,

    /// How long unsent messages are kept when a socket is closed
    pub linger: Duration,

    /// How long to wait for a launched kernel to write its connection file
    pub connection_file_timeout: Duration,

    /// How often to check for the connection file while waiting
    pub connection_file_poll: Duration,

    /// Delay after the connection file first appears, since the kernel may
    /// still be writing it
    pub settle_delay: Duration,

    /// Username stamped into message headers
    pub username: String,

    /// Command (program and arguments) that lists installed kernels as JSON
    pub discovery_command: Vec<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            receive_timeout: Duration::from_secs(3),
            linger: Duration::from_secs(1),
            connection_file_timeout: Duration::from_secs(10),
            connection_file_poll: Duration::from_millis(250),
            settle_delay: Duration::from_millis(500),
            username: String::from("username"),
            discovery_command: vec![
                String::from("jupyter"),
                String::from("kernelspec"),
                String::from("list"),
                String::from("--json"),
            ],
        }
    }
}

impl ClientOptions {
    pub fn poll_interval_ms(&self) -> i64 {
        self.poll_interval.as_millis() as i64
    }
}
