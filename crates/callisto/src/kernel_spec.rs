/*
 * kernel_spec.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

/// Placeholder in a kernel's `argv` replaced by the connection file path
pub const CONNECTION_FILE_PLACEHOLDER: &str = "{connection_file}";

/// From the Jupyter documentation for [Kernel Specs](https://jupyter-client.readthedocs.io/en/stable/kernels.html#kernel-specs).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct KernelSpec {
    /// List of command line arguments to be used to start the kernel
    pub argv: Vec<String>,

    // The kernel name as it should be displayed in the UI
    pub display_name: String,

    // The kernel's language
    pub language: String,

    /// How the kernel expects to be interrupted
    #[serde(default)]
    pub interrupt_mode: InterruptMode,

    /// Environment variables to set for the kernel process
    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterruptMode {
    /// Deliver SIGINT to the kernel process
    #[default]
    Signal,

    /// Send an `interrupt_request` on the control channel
    Message,
}

impl KernelSpec {
    /// Render the launch command, substituting the connection file path.
    pub fn render_argv(&self, connection_file: &Path) -> Vec<String> {
        let path = connection_file.to_string_lossy();
        self.argv
            .iter()
            .map(|arg| arg.replace(CONNECTION_FILE_PLACEHOLDER, &path))
            .collect()
    }
}

/// An installed kernel as reported by the discovery listing
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct KernelSpecEntry {
    /// Directory holding `kernel.json` and resources such as logos
    pub resource_dir: PathBuf,

    pub spec: KernelSpec,
}

/// The output of `jupyter kernelspec list --json`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct KernelSpecList {
    pub kernelspecs: BTreeMap<String, KernelSpecEntry>,
}

impl KernelSpecList {
    pub fn parse(json: &str) -> crate::Result<Self> {
        match serde_json::from_str(json) {
            Ok(list) => Ok(list),
            Err(err) => Err(Error::KernelDiscovery(format!(
                "Unexpected kernel listing: {err}"
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kernelspecs.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&KernelSpecEntry> {
        self.kernelspecs.get(name)
    }

    /// Kernel names paired with their display names, sorted by name
    pub fn names(&self) -> Vec<(String, String)> {
        self.kernelspecs
            .iter()
            .map(|(name, entry)| (name.clone(), entry.spec.display_name.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
      "kernelspecs": {
        "python3": {
          "resource_dir": "/usr/share/jupyter/kernels/python3",
          "spec": {
            "argv": ["python", "-m", "ipykernel_launcher", "-f", "{connection_file}"],
            "env": {},
            "display_name": "Python 3 (ipykernel)",
            "language": "python",
            "interrupt_mode": "signal",
            "metadata": {"debugger": true}
          }
        },
        "ark": {
          "resource_dir": "/usr/share/jupyter/kernels/ark",
          "spec": {
            "argv": ["ark", "--connection_file", "{connection_file}"],
            "env": {"RUST_LOG": "error"},
            "display_name": "Ark R Kernel",
            "language": "R",
            "interrupt_mode": "message"
          }
        }
      }
    }"#;

    #[test]
    fn test_parse_listing() {
        let list = KernelSpecList::parse(LISTING).unwrap();
        assert_eq!(list.kernelspecs.len(), 2);

        let python = &list.get("python3").unwrap().spec;
        assert_eq!(python.language, "python");
        assert_eq!(python.interrupt_mode, InterruptMode::Signal);

        let ark = &list.get("ark").unwrap().spec;
        assert_eq!(ark.interrupt_mode, InterruptMode::Message);
        assert_eq!(ark.env.get("RUST_LOG").map(String::as_str), Some("error"));

        assert_eq!(list.names()[0].0, "ark");
    }

    #[test]
    fn test_interrupt_mode_defaults_to_signal() {
        let spec: KernelSpec = serde_json::from_str(
            r#"{"argv": ["k"], "display_name": "K", "language": "k"}"#,
        )
        .unwrap();
        assert_eq!(spec.interrupt_mode, InterruptMode::Signal);
        assert!(spec.env.is_empty());
    }

    #[test]
    fn test_render_argv() {
        let list = KernelSpecList::parse(LISTING).unwrap();
        let spec = &list.get("python3").unwrap().spec;
        let argv = spec.render_argv(Path::new("/run/kernel-1.json"));
        assert_eq!(argv, vec![
            "python",
            "-m",
            "ipykernel_launcher",
            "-f",
            "/run/kernel-1.json"
        ]);
    }

    #[test]
    fn test_bad_listing() {
        assert!(KernelSpecList::parse("not json").is_err());
    }
}
