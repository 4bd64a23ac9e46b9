/*
 * mod.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

pub mod blocking_client;
pub mod connection;
pub mod jupyter_client;

pub use blocking_client::BlockingClient;
pub use jupyter_client::JupyterClient;
