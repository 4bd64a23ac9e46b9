/*
 * connection_file.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;

/// The record a kernel writes at startup with the ports and key needed to
/// attach to it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConnectionFile {
    // ZeroMQ ports
    pub control_port: u16,
    pub shell_port: u16,
    pub stdin_port: u16,
    pub iopub_port: u16,
    #[serde(default)]
    pub hb_port: u16,

    /// Usually "tcp"
    pub transport: String,

    /// Usually "hmac-sha256"
    #[serde(default = "default_signature_scheme")]
    pub signature_scheme: String,

    pub ip: String,
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_name: Option<String>,
}

fn default_signature_scheme() -> String {
    String::from("hmac-sha256")
}

impl ConnectionFile {
    /// Create a ConnectionFile by parsing the contents of a connection file.
    pub fn from_file<P: AsRef<Path>>(connection_file: P) -> crate::Result<ConnectionFile> {
        let path = connection_file.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => return Err(Error::ReadConnectionFile(path.to_path_buf(), err.to_string())),
        };
        let reader = BufReader::new(file);
        match serde_json::from_reader(reader) {
            Ok(control) => Ok(control),
            Err(err) => Err(Error::ReadConnectionFile(path.to_path_buf(), err.to_string())),
        }
    }

    /// Write the connection file to disk; the kernel side does this at
    /// startup.
    pub fn to_file<P: AsRef<Path>>(&self, file: P) -> crate::Result<()> {
        let path = file.as_ref();
        let contents = match serde_json::to_string_pretty(self) {
            Ok(contents) => contents,
            Err(err) => return Err(Error::CannotSerialize(err)),
        };
        if let Err(err) = std::fs::write(path, contents) {
            return Err(crate::anyhow!(
                "Can't write connection file {}: {err}",
                path.display()
            ));
        }
        Ok(())
    }

    /// Given a port, return a URI-like string that can be used to connect to
    /// the port, given the other parameters in the connection file.
    ///
    /// Example: `32` => `"tcp://127.0.0.1:32"`
    pub fn endpoint(&self, port: u16) -> String {
        format!("{}://{}:{}", self.transport, self.ip, port)
    }
}
