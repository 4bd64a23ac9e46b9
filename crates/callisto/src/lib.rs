/*
 * lib.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

pub mod client;
pub mod connection_file;
pub mod error;
pub mod events;
pub mod fixtures;
pub mod frontend;
pub mod kernel_dirs;
pub mod kernel_manager;
pub mod kernel_spec;
pub mod notebook;
pub mod options;
pub mod session;
pub mod socket;
pub mod transport;
pub mod wire;

pub use error::Error;
pub type Result<T> = std::result::Result<T, error::Error>;
