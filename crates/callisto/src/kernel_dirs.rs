/*
 * kernel_dirs.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::env;
use std::path::PathBuf;

/// Returns the directory where kernels write their connection files; uses
/// the `JUPYTER_RUNTIME_DIR` environment variable if set.
pub fn jupyter_runtime_dir() -> Option<PathBuf> {
    if let Ok(path) = env::var("JUPYTER_RUNTIME_DIR") {
        return Some(PathBuf::from(path));
    }
    jupyter_data_dir().map(|dir| dir.join("runtime"))
}

/// Returns the Jupyter data directory; uses the `JUPYTER_DATA_DIR`
/// environment variable if set, platform defaults if not.
fn jupyter_data_dir() -> Option<PathBuf> {
    if let Ok(path) = env::var("JUPYTER_DATA_DIR") {
        return Some(PathBuf::from(path));
    }
    jupyter_platform_dir()
}

#[cfg(target_os = "macos")]
fn jupyter_platform_dir() -> Option<PathBuf> {
    // Jupyter uses ~/Library/Jupyter rather than Application Support
    dirs::home_dir().map(|home| home.join("Library").join("Jupyter"))
}

#[cfg(not(target_os = "macos"))]
fn jupyter_platform_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("jupyter"))
}

/// Path of the connection file for a kernel launched by the given session
pub fn connection_file_path(runtime_dir: &std::path::Path, session_id: &str) -> PathBuf {
    runtime_dir.join(format!("kernel-{session_id}.json"))
}
