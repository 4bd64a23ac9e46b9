/*
 * error.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::fmt;
use std::path::PathBuf;

use crate::notebook::cell::CellId;

/// Type representing all errors that can occur inside the client
#[derive(Debug)]
pub enum Error {
    // Connection
    NoKernelsFound,
    UnknownKernel(String),
    ConnectionFileTimeout(PathBuf),
    ReadConnectionFile(PathBuf, String),
    MissingSigningKey,
    HmacKeyInvalid(String, String),
    CreateSocketFailed(String, zmq::Error),
    SocketBindError(String, String, zmq::Error),
    SocketConnectError(String, String, zmq::Error),
    ZmqError(String, zmq::Error),
    ReceiveTimeout(String, String),
    NotConnected,

    // Malformed messages
    MissingDelimiter,
    InsufficientParts(usize, usize),
    InvalidHmac(Vec<u8>, hex::FromHexError),
    BadSignature(Vec<u8>),
    Utf8Error(String, Vec<u8>, std::str::Utf8Error),
    JsonParseError(String, String, serde_json::Error),
    InvalidPart(String, serde_json::Value, serde_json::Error),
    InvalidMessage(String, serde_json::Value, serde_json::Error),
    CannotSerialize(serde_json::Error),
    UnknownMessageType(String),

    // Kernel process
    KernelDiscovery(String),
    KernelSpawn(String, std::io::Error),
    KernelSignal(String),
    KernelExited(String),
    KernelNotRunning,

    // Notebook document and persistence
    UnknownCell(CellId),
    NotCodeCell(CellId),
    UnexpectedOutputMessage(String),
    NotebookRead(PathBuf, std::io::Error),
    NotebookWrite(PathBuf, std::io::Error),
    NotebookFormat(PathBuf, serde_json::Error),
    InvalidCellJson(serde_json::Error),

    Anyhow(anyhow::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NoKernelsFound => {
                write!(f, "No Jupyter kernels are installed")
            },
            Error::UnknownKernel(name) => {
                write!(f, "No kernel named '{name}' is installed")
            },
            Error::ConnectionFileTimeout(path) => {
                write!(
                    f,
                    "Kernel failed to start: connection file {} was not written in time",
                    path.display()
                )
            },
            Error::ReadConnectionFile(path, err) => {
                write!(
                    f,
                    "Could not read connection file {}: {err}",
                    path.display()
                )
            },
            Error::MissingSigningKey => {
                write!(
                    f,
                    "Cannot sign message: no signing key has been established (not connected?)"
                )
            },
            Error::HmacKeyInvalid(key, err) => {
                write!(
                    f,
                    "The HMAC supplied signing key '{}' ({} bytes) cannot be used: {}",
                    key,
                    key.len(),
                    err
                )
            },
            Error::CreateSocketFailed(name, err) => {
                write!(f, "Could not create ZeroMQ socket '{name}': {err}")
            },
            Error::SocketBindError(name, endpoint, err) => {
                write!(f, "Could not bind ZeroMQ socket '{name}' to {endpoint}: {err}")
            },
            Error::SocketConnectError(name, endpoint, err) => {
                write!(
                    f,
                    "Could not connect ZeroMQ socket '{name}' to {endpoint}: {err}"
                )
            },
            Error::ZmqError(name, err) => {
                write!(f, "ZeroMQ protocol error on {name} socket: {err}")
            },
            Error::ReceiveTimeout(name, msg_type) => {
                write!(
                    f,
                    "Timed out waiting for a reply to '{msg_type}' on {name} socket"
                )
            },
            Error::NotConnected => {
                write!(f, "The client is not connected to a kernel")
            },
            Error::MissingDelimiter => {
                write!(
                    f,
                    "ZeroMQ message did not include expected <IDS|MSG> delimiter"
                )
            },
            Error::InsufficientParts(found, expected) => {
                write!(
                    f,
                    "ZeroMQ message did not contain sufficient parts (found {found}, expected {expected})"
                )
            },
            Error::InvalidHmac(data, err) => {
                write!(
                    f,
                    "ZeroMQ message HMAC signature {data:?} is not a valid hexadecimal value: {err}"
                )
            },
            Error::BadSignature(sig) => {
                write!(f, "ZeroMQ message HMAC signature {sig:?} is incorrect")
            },
            Error::Utf8Error(part, data, err) => {
                write!(
                    f,
                    "Message part '{part}' was not valid UTF-8: {err} (raw: {data:?})"
                )
            },
            Error::JsonParseError(part, str, err) => {
                write!(f, "Message part '{part}' is invalid JSON: {err} (raw: {str})")
            },
            Error::InvalidPart(part, json, err) => {
                write!(
                    f,
                    "Message part '{part}' does not match schema: {err} (raw: {json})"
                )
            },
            Error::InvalidMessage(kind, json, err) => {
                write!(f, "Invalid '{kind}' message: {err} (raw: {json})")
            },
            Error::CannotSerialize(err) => {
                write!(f, "Cannot serialize message: {err}")
            },
            Error::UnknownMessageType(kind) => {
                write!(f, "Unknown message type '{kind}'")
            },
            Error::KernelDiscovery(msg) => {
                write!(f, "Could not list installed kernels: {msg}")
            },
            Error::KernelSpawn(cmd, err) => {
                write!(f, "Could not start kernel process '{cmd}': {err}")
            },
            Error::KernelSignal(msg) => {
                write!(f, "Could not signal kernel process: {msg}")
            },
            Error::KernelExited(status) => {
                write!(f, "Kernel process exited during startup ({status})")
            },
            Error::KernelNotRunning => {
                write!(f, "No kernel process is running")
            },
            Error::UnknownCell(id) => {
                write!(f, "Cell {id} does not belong to this notebook")
            },
            Error::NotCodeCell(id) => {
                write!(f, "Cell {id} is not a code cell")
            },
            Error::UnexpectedOutputMessage(kind) => {
                write!(f, "Message of type '{kind}' cannot be stored as a cell output")
            },
            Error::NotebookRead(path, err) => {
                write!(f, "Could not read notebook {}: {err}", path.display())
            },
            Error::NotebookWrite(path, err) => {
                write!(f, "Could not write notebook {}: {err}", path.display())
            },
            Error::NotebookFormat(path, err) => {
                write!(f, "Notebook {} is not valid nbformat: {err}", path.display())
            },
            Error::InvalidCellJson(err) => {
                write!(f, "Could not parse cell JSON: {err}")
            },
            Error::Anyhow(err) => {
                write!(f, "{err:?}")
            },
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Whether the error describes an inbound frame that could not be
    /// decoded. Such frames are dropped without affecting the connection.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Error::MissingDelimiter |
                Error::InsufficientParts(..) |
                Error::InvalidHmac(..) |
                Error::BadSignature(..) |
                Error::Utf8Error(..) |
                Error::JsonParseError(..) |
                Error::InvalidPart(..) |
                Error::InvalidMessage(..) |
                Error::UnknownMessageType(..)
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        Self::Anyhow(error)
    }
}

#[macro_export]
macro_rules! anyhow {
    ($($rest: expr),*) => {{
        let message = anyhow::anyhow!($($rest, )*);
        $crate::error::Error::Anyhow(message)
    }}
}
