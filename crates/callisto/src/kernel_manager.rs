/*
 * kernel_manager.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::path::Path;
use std::path::PathBuf;
use std::process::Child;
use std::process::Command;
use std::process::Stdio;
use std::time::Instant;

use log::debug;
use log::info;
use log::warn;
use stdext::ResultExt;

use crate::error::Error;
use crate::kernel_dirs;
use crate::kernel_spec::InterruptMode;
use crate::kernel_spec::KernelSpec;
use crate::kernel_spec::KernelSpecList;
use crate::options::ClientOptions;

/// Something that can deliver an `interrupt_request` to the kernel. The
/// transport implements this over its control channel.
pub trait InterruptChannel {
    fn send_interrupt(&self) -> crate::Result<()>;
}

/// How a running kernel gets interrupted, chosen from its spec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupter {
    /// Deliver an OS interrupt to the kernel process
    Signal { pid: u32 },

    /// Send an `interrupt_request` on the control channel
    Message,
}

impl Interrupter {
    pub fn interrupt(&self, channel: &dyn InterruptChannel) -> crate::Result<()> {
        match self {
            Interrupter::Signal { pid } => signal_interrupt(*pid),
            Interrupter::Message => channel.send_interrupt(),
        }
    }
}

#[cfg(unix)]
fn signal_interrupt(pid: u32) -> crate::Result<()> {
    use nix::sys::signal::Signal;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    debug!("Sending SIGINT to kernel process {pid}");
    match kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
        Ok(()) => Ok(()),
        Err(err) => Err(Error::KernelSignal(format!("SIGINT to {pid} failed: {err}"))),
    }
}

#[cfg(not(unix))]
fn signal_interrupt(pid: u32) -> crate::Result<()> {
    Err(Error::KernelSignal(format!(
        "Signal interrupts are not supported on this platform (process {pid})"
    )))
}

/// A kernel process we launched
struct KernelProcess {
    name: String,
    spec: KernelSpec,
    child: Child,
    connection_file: PathBuf,
}

/// Discovers installed kernels and manages the lifetime of the one we launch.
pub struct KernelManager {
    specs: KernelSpecList,
    options: ClientOptions,
    runtime_dir: Option<PathBuf>,
    process: Option<KernelProcess>,
}

impl std::fmt::Debug for KernelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelManager").finish_non_exhaustive()
    }
}

impl KernelManager {
    /// Discover installed kernels by running the discovery command.
    pub fn discover(options: ClientOptions) -> crate::Result<Self> {
        let specs = Self::list_kernels(&options.discovery_command)?;
        Self::with_specs(specs, options)
    }

    /// Create a manager over an already known set of kernels.
    pub fn with_specs(specs: KernelSpecList, options: ClientOptions) -> crate::Result<Self> {
        if specs.is_empty() {
            return Err(Error::NoKernelsFound);
        }
        Ok(Self {
            specs,
            options,
            runtime_dir: kernel_dirs::jupyter_runtime_dir(),
            process: None,
        })
    }

    fn list_kernels(command: &[String]) -> crate::Result<KernelSpecList> {
        let Some((program, args)) = command.split_first() else {
            return Err(Error::KernelDiscovery(String::from("Empty discovery command")));
        };

        debug!("Listing kernels with '{}'", command.join(" "));
        let output = match Command::new(program).args(args).stdin(Stdio::null()).output() {
            Ok(output) => output,
            Err(err) => return Err(Error::KernelDiscovery(format!("Can't run '{program}': {err}"))),
        };

        if !output.status.success() {
            return Err(Error::KernelDiscovery(format!(
                "'{program}' failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        KernelSpecList::parse(&String::from_utf8_lossy(&output.stdout))
    }

    pub fn kernel_specs(&self) -> &KernelSpecList {
        &self.specs
    }

    /// Override the directory connection files are written to.
    pub fn set_runtime_dir(&mut self, dir: PathBuf) {
        self.runtime_dir = Some(dir);
    }

    /// Spec of the running kernel, if any
    pub fn spec(&self) -> Option<&KernelSpec> {
        self.process.as_ref().map(|process| &process.spec)
    }

    pub fn kernel_name(&self) -> Option<&str> {
        self.process.as_ref().map(|process| process.name.as_str())
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(|process| process.child.id())
    }

    pub fn connection_file(&self) -> Option<&Path> {
        self.process
            .as_ref()
            .map(|process| process.connection_file.as_path())
    }

    /// Launch the named kernel and wait for it to write its connection file.
    /// Returns the path of that file.
    pub fn start(&mut self, session_id: &str, kernel_name: &str) -> crate::Result<PathBuf> {
        if self.process.is_some() {
            self.stop()?;
        }

        let spec = match self.specs.get(kernel_name) {
            Some(entry) => entry.spec.clone(),
            None => return Err(Error::UnknownKernel(String::from(kernel_name))),
        };

        let Some(runtime_dir) = self.runtime_dir.clone() else {
            return Err(crate::anyhow!("Can't determine the Jupyter runtime directory"));
        };
        if let Err(err) = std::fs::create_dir_all(&runtime_dir) {
            return Err(crate::anyhow!(
                "Can't create runtime directory {}: {err}",
                runtime_dir.display()
            ));
        }

        let connection_file = kernel_dirs::connection_file_path(&runtime_dir, session_id);
        if connection_file.exists() {
            // Stale file from an earlier run; we wait for the kernel's own
            if let Err(err) = std::fs::remove_file(&connection_file) {
                warn!("Can't remove stale connection file: {err}");
            }
        }

        let argv = spec.render_argv(&connection_file);
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::KernelSpawn(
                String::from(kernel_name),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty argv"),
            ));
        };

        info!("Starting kernel '{kernel_name}': {}", argv.join(" "));
        let child = Command::new(program)
            .args(args)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .spawn();
        let mut child = match child {
            Ok(child) => child,
            Err(err) => return Err(Error::KernelSpawn(argv.join(" "), err)),
        };

        if let Err(err) = self.wait_for_connection_file(&mut child, &connection_file) {
            child.kill().log_err("Can't kill kernel after failed start");
            child.wait().log_err("Can't reap kernel after failed start");
            return Err(err);
        }

        self.process = Some(KernelProcess {
            name: String::from(kernel_name),
            spec,
            child,
            connection_file: connection_file.clone(),
        });

        Ok(connection_file)
    }

    fn wait_for_connection_file(&self, child: &mut Child, path: &Path) -> crate::Result<()> {
        let start = Instant::now();

        loop {
            if path.exists() {
                debug!("Connection file {} found", path.display());
                std::thread::sleep(self.options.settle_delay);
                return Ok(());
            }

            match child.try_wait() {
                Ok(Some(status)) => return Err(Error::KernelExited(status.to_string())),
                Ok(None) => {},
                Err(err) => return Err(Error::KernelSpawn(String::from("try_wait"), err)),
            }

            if start.elapsed() >= self.options.connection_file_timeout {
                return Err(Error::ConnectionFileTimeout(path.to_path_buf()));
            }

            std::thread::sleep(self.options.connection_file_poll);
        }
    }

    /// Terminate the kernel process.
    pub fn stop(&mut self) -> crate::Result<()> {
        let Some(mut process) = self.process.take() else {
            return Err(Error::KernelNotRunning);
        };

        info!("Stopping kernel '{}'", process.name);

        // The kernel may already have exited after a shutdown request
        match process.child.try_wait() {
            Ok(Some(status)) => debug!("Kernel already exited ({status})"),
            _ => {
                if let Err(err) = process.child.kill() {
                    warn!("Can't kill kernel process: {err}");
                }
                if let Err(err) = process.child.wait() {
                    warn!("Can't wait for kernel process: {err}");
                }
            },
        }

        if let Err(err) = std::fs::remove_file(&process.connection_file) {
            debug!("Connection file not removed: {err}");
        }

        Ok(())
    }

    /// Whether the launched kernel process is still alive
    pub fn is_running(&mut self) -> bool {
        match &mut self.process {
            Some(process) => matches!(process.child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// The interrupt strategy for the running kernel
    pub fn interrupter(&self) -> crate::Result<Interrupter> {
        let Some(process) = &self.process else {
            return Err(Error::KernelNotRunning);
        };
        Ok(match process.spec.interrupt_mode {
            InterruptMode::Message => Interrupter::Message,
            InterruptMode::Signal => Interrupter::Signal {
                pid: process.child.id(),
            },
        })
    }

    /// Interrupt the running kernel, by message or by signal as its spec
    /// declares.
    pub fn interrupt(&self, channel: &dyn InterruptChannel) -> crate::Result<()> {
        self.interrupter()?.interrupt(channel)
    }
}

impl Drop for KernelManager {
    fn drop(&mut self) {
        if self.process.is_some() {
            self.stop().log_err("Can't stop kernel on drop");
        }
    }
}
