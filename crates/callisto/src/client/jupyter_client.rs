/*
 * jupyter_client.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;

use crossbeam::channel::Receiver;
use log::debug;
use log::warn;
use stdext::ResultExt;

use crate::client::connection::Connection;
use crate::client::connection::InputReplier;
use crate::error::Error;
use crate::events::ClientEvent;
use crate::events::ClientListeners;
use crate::kernel_manager::KernelManager;
use crate::kernel_spec::KernelSpec;
use crate::kernel_spec::KernelSpecList;
use crate::options::ClientOptions;
use crate::socket::channel::Channel;
use crate::transport::Correlation;
use crate::transport::Transport;
use crate::wire::control::ShutdownRequest;
use crate::wire::jupyter_message::Message;
use crate::wire::shell::CompleteRequest;
use crate::wire::shell::ExecuteRequest;
use crate::wire::shell::InspectRequest;
use crate::wire::shell::KernelInfoReply;
use crate::wire::status::AtomicExecutionState;
use crate::wire::status::ExecutionState;

/// State shared with the monitor thread
#[derive(Default)]
struct Shared {
    listeners: ClientListeners,
    state: AtomicExecutionState,
}

impl Shared {
    fn dispatch(&self, event: &ClientEvent) {
        if let ClientEvent::Status(status) = event {
            self.state.store(status.content.execution_state);
        }
        self.listeners.dispatch(event);
    }
}

struct Monitor {
    connection: Connection,
    cancel: Arc<AtomicBool>,
    done: Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

/// Event-driven client. Requests are sent without waiting; everything the
/// kernel sends back is delivered to the registered listeners on a
/// dedicated monitor thread.
///
/// Listeners run on that thread and must hand work over to any other
/// thread themselves.
pub struct JupyterClient {
    shared: Arc<Shared>,
    options: ClientOptions,
    monitor: Mutex<Option<Monitor>>,
}

impl JupyterClient {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            options,
            monitor: Mutex::new(None),
        }
    }

    pub fn listeners(&self) -> &ClientListeners {
        &self.shared.listeners
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The kernel's last reported execution state
    pub fn state(&self) -> ExecutionState {
        self.shared.state.load()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Monitor>> {
        match self.monitor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    fn transport(&self) -> crate::Result<Arc<Transport>> {
        match self.lock().as_ref() {
            Some(monitor) => Ok(monitor.connection.transport.clone()),
            None => Err(Error::NotConnected),
        }
    }

    /// Discover installed kernels and launch the named one.
    pub fn start(&self, kernel_name: &str) -> crate::Result<()> {
        let manager = KernelManager::discover(self.options.clone())?;
        self.start_with(manager, kernel_name)
    }

    /// Launch the named kernel through the given manager.
    pub fn start_with(&self, manager: KernelManager, kernel_name: &str) -> crate::Result<()> {
        if self.is_connected() {
            return Err(crate::anyhow!("Client is already connected"));
        }
        let connection = Connection::launch(manager, kernel_name, &self.options)?;
        self.run(connection);
        Ok(())
    }

    /// Connect to a running kernel through its connection file.
    pub fn connect(&self, connection_file: &Path) -> crate::Result<()> {
        if self.is_connected() {
            return Err(crate::anyhow!("Client is already connected"));
        }
        let connection = Connection::attach(connection_file, &self.options)?;
        self.run(connection);
        Ok(())
    }

    fn run(&self, connection: Connection) {
        let transport = connection.transport.clone();
        let kernel_info = transport.kernel_info().clone();

        let cancel = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = crossbeam::channel::bounded(1);

        let thread = {
            let cancel = cancel.clone();
            let shared = self.shared.clone();
            stdext::spawn!("jupyter-monitor", move || {
                transport.monitor(&cancel, done_tx, |event| shared.dispatch(&event));
            })
        };

        *self.lock() = Some(Monitor {
            connection,
            cancel,
            done: done_rx,
            thread: Some(thread),
        });

        self.shared.listeners.connected.notify(&kernel_info);
    }

    /// Kernels installed on this machine
    pub fn kernels(&self) -> crate::Result<KernelSpecList> {
        let manager = KernelManager::discover(self.options.clone())?;
        Ok(manager.kernel_specs().clone())
    }

    /// The kernel's answer to the `kernel_info_request` made on connect
    pub fn kernel_info(&self) -> Option<KernelInfoReply> {
        self.lock()
            .as_ref()
            .map(|monitor| monitor.connection.transport.kernel_info().clone())
    }

    /// Spec of the kernel, when this client launched it
    pub fn kernel_spec(&self) -> Option<KernelSpec> {
        self.lock()
            .as_ref()
            .and_then(|monitor| monitor.connection.kernel_spec().cloned())
    }

    /// Send code for execution. Returns the request's message id.
    pub fn execute(&self, code: &str) -> crate::Result<String> {
        self.transport()?.send_shell(ExecuteRequest::new(code), None)
    }

    /// Send code for execution, recording the request id through `tag`
    /// before the request leaves.
    pub fn execute_tagged(&self, code: &str, tag: &dyn Correlation) -> crate::Result<String> {
        self.transport()?
            .send_shell(ExecuteRequest::new(code), Some(tag))
    }

    pub fn complete(&self, code: &str, cursor_pos: u32) -> crate::Result<String> {
        self.transport()?.send_shell(
            CompleteRequest {
                code: String::from(code),
                cursor_pos,
            },
            None,
        )
    }

    pub fn inspect(&self, code: &str, cursor_pos: u32, detail_level: u32) -> crate::Result<String> {
        self.transport()?.send_shell(
            InspectRequest {
                code: String::from(code),
                cursor_pos,
                detail_level,
            },
            None,
        )
    }

    pub fn send_input_reply(&self, value: &str) -> crate::Result<()> {
        self.transport()?.send_input_reply(value)?;
        Ok(())
    }

    /// A handle input listeners can use to answer prompts
    pub fn input_replier(&self) -> crate::Result<InputReplier> {
        Ok(InputReplier::new(self.transport()?))
    }

    /// Interrupt the kernel, by signal or by message as its spec declares.
    /// A message interrupt is not waited for; its reply arrives as an
    /// output event.
    pub fn interrupt(&self) -> crate::Result<()> {
        let (interrupter, transport) = match self.lock().as_ref() {
            Some(monitor) => (
                monitor.connection.interrupter(),
                monitor.connection.transport.clone(),
            ),
            None => return Err(Error::NotConnected),
        };
        interrupter.interrupt(transport.as_ref())
    }

    /// Shut the kernel down.
    ///
    /// Listeners hear about the shutdown first. The monitor loop is then
    /// stopped and waited for before the `shutdown_request` goes out on the
    /// control channel, so nothing else is reading the sockets. If the loop
    /// does not stop in time, no request is sent; the connection is closed
    /// and an error returned.
    pub fn shutdown(&self, restart: bool) -> crate::Result<()> {
        let Some(mut monitor) = self.lock().take() else {
            return Err(Error::NotConnected);
        };

        self.shared.listeners.shutdown.notify(&());
        if let Err(err) = self.stop_monitor(&mut monitor) {
            monitor.connection.close();
            return Err(err);
        }

        let transport = monitor.connection.transport.clone();
        match transport.exchange(Channel::Control, ShutdownRequest { restart }) {
            Ok(Message::ShutdownReply(reply)) => {
                debug!("Kernel acknowledged shutdown (restart: {})", reply.content.restart)
            },
            Ok(other) => warn!("Unexpected reply to shutdown: '{}'", other.message_type()),
            Err(err) => warn!("Kernel did not acknowledge shutdown: {err}"),
        }

        drop(transport);
        monitor.connection.close();
        Ok(())
    }

    fn stop_monitor(&self, monitor: &mut Monitor) -> crate::Result<()> {
        monitor.cancel.store(true, Ordering::Release);

        // The loop notices within one poll round
        let wait = self.options.poll_interval * (Channel::POLL_ORDER.len() as u32 + 1) +
            self.options.receive_timeout;
        if let Err(err) = monitor.done.recv_timeout(wait) {
            return Err(crate::anyhow!("Monitor loop did not stop: {err}"));
        }

        if let Some(thread) = monitor.thread.take() {
            if thread.join().is_err() {
                warn!("Monitor thread panicked");
            }
        }
        Ok(())
    }
}

impl Drop for JupyterClient {
    fn drop(&mut self) {
        if let Some(mut monitor) = self.lock().take() {
            self.stop_monitor(&mut monitor)
                .log_err("Closing connection with the monitor still running");
            monitor.connection.close();
        }
    }
}
