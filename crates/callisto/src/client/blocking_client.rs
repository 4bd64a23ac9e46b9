/*
 * blocking_client.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use log::debug;
use log::trace;
use log::warn;

use crate::client::connection::Connection;
use crate::client::connection::InputReplier;
use crate::client::connection::is_idle_after;
use crate::error::Error;
use crate::events::ClientEvent;
use crate::events::ClientListeners;
use crate::kernel_manager::Interrupter;
use crate::kernel_manager::KernelManager;
use crate::kernel_spec::KernelSpec;
use crate::options::ClientOptions;
use crate::socket::channel::Channel;
use crate::transport::Transport;
use crate::wire::control::InterruptRequest;
use crate::wire::control::ShutdownReply;
use crate::wire::control::ShutdownRequest;
use crate::wire::jupyter_message::JupyterMessage;
use crate::wire::jupyter_message::Message;
use crate::wire::shell::CompleteReply;
use crate::wire::shell::CompleteRequest;
use crate::wire::shell::ExecuteReply;
use crate::wire::shell::ExecuteRequest;
use crate::wire::shell::InspectReply;
use crate::wire::shell::InspectRequest;
use crate::wire::shell::IsCompleteReply;
use crate::wire::shell::IsCompleteRequest;
use crate::wire::shell::KernelInfoReply;
use crate::wire::shell::KernelInfoRequest;
use crate::wire::status::AtomicExecutionState;
use crate::wire::status::ExecutionState;

/// A client where every call waits for its answer on the calling thread.
///
/// There is no background thread. While `execute` waits for the kernel to
/// go idle it drains the stdin and iopub channels, so status, output and
/// input requests still reach the listeners, on the caller's thread.
pub struct BlockingClient {
    connection: Connection,
    listeners: ClientListeners,
    state: AtomicExecutionState,
}

impl std::fmt::Debug for BlockingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingClient").finish_non_exhaustive()
    }
}

impl BlockingClient {
    /// Discover installed kernels, launch the named one and connect.
    pub fn start(kernel_name: &str, options: ClientOptions) -> crate::Result<Self> {
        let manager = KernelManager::discover(options.clone())?;
        Self::start_with(manager, kernel_name, options)
    }

    pub fn start_with(
        manager: KernelManager,
        kernel_name: &str,
        options: ClientOptions,
    ) -> crate::Result<Self> {
        let connection = Connection::launch(manager, kernel_name, &options)?;
        Ok(Self::new(connection))
    }

    /// Connect to a running kernel through its connection file.
    pub fn connect(connection_file: &Path, options: ClientOptions) -> crate::Result<Self> {
        let connection = Connection::attach(connection_file, &options)?;
        Ok(Self::new(connection))
    }

    fn new(connection: Connection) -> Self {
        Self {
            connection,
            listeners: ClientListeners::default(),
            state: AtomicExecutionState::default(),
        }
    }

    fn transport(&self) -> &Transport {
        self.connection.transport.as_ref()
    }

    pub fn listeners(&self) -> &ClientListeners {
        &self.listeners
    }

    pub fn state(&self) -> ExecutionState {
        self.state.load()
    }

    /// The kernel's answer to the `kernel_info_request` made on connect
    pub fn kernel_info(&self) -> &KernelInfoReply {
        self.transport().kernel_info()
    }

    pub fn kernel_spec(&self) -> Option<&KernelSpec> {
        self.connection.kernel_spec()
    }

    fn dispatch(&self, event: &ClientEvent) {
        if let ClientEvent::Status(status) = event {
            self.state.store(status.content.execution_state);
        }
        self.listeners.dispatch(event);
    }

    /// Execute code and wait for its `execute_reply`.
    ///
    /// Stale traffic is flushed first. Status and output for this request
    /// are dispatched to the listeners while waiting for the kernel to go
    /// idle; the shell reply is read after that.
    pub fn execute(&self, code: &str) -> crate::Result<JupyterMessage<ExecuteReply>> {
        let transport = self.transport();
        transport.flush(&[Channel::Stdin, Channel::IOPub, Channel::Shell]);

        let msg_id = transport.send_shell(ExecuteRequest::new(code), None)?;
        debug!("Waiting for kernel to finish executing {msg_id}");

        let interval = transport.options().poll_interval_ms();
        'busy: loop {
            for channel in [Channel::Stdin, Channel::IOPub] {
                let Some(event) = transport.poll_event(channel, interval) else {
                    continue;
                };
                let idle = matches!(&event, ClientEvent::Status(status) if is_idle_after(status, &msg_id));
                self.dispatch(&event);
                if idle {
                    break 'busy;
                }
            }
        }

        let deadline = Instant::now() + transport.options().receive_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::ReceiveTimeout(
                    Channel::Shell.to_string(),
                    String::from("execute_request"),
                ));
            }

            match transport.poll_once(Channel::Shell, remaining.as_millis().max(1) as i64) {
                Ok(Some(Message::ExecuteReply(reply))) if reply.is_reply_to(&msg_id) => {
                    return Ok(reply);
                },
                Ok(Some(other)) => {
                    warn!("Discarding '{}' while waiting for execute_reply", other.message_type());
                },
                Ok(None) => trace!("Still waiting for execute_reply to {msg_id}"),
                Err(err) if err.is_malformed() => {
                    warn!("Dropping malformed message on shell: {err}");
                },
                Err(err) => return Err(err),
            }
        }
    }

    pub fn is_complete(&self, code: &str) -> crate::Result<JupyterMessage<IsCompleteReply>> {
        let request = IsCompleteRequest {
            code: String::from(code),
        };
        match self.transport().exchange(Channel::Shell, request)? {
            Message::IsCompleteReply(reply) => Ok(reply),
            other => Err(unexpected_reply("is_complete_request", &other)),
        }
    }

    pub fn complete(&self, code: &str, cursor_pos: u32) -> crate::Result<JupyterMessage<CompleteReply>> {
        let request = CompleteRequest {
            code: String::from(code),
            cursor_pos,
        };
        match self.transport().exchange(Channel::Shell, request)? {
            Message::CompleteReply(reply) => Ok(reply),
            other => Err(unexpected_reply("complete_request", &other)),
        }
    }

    pub fn inspect(
        &self,
        code: &str,
        cursor_pos: u32,
        detail_level: u32,
    ) -> crate::Result<JupyterMessage<InspectReply>> {
        let request = InspectRequest {
            code: String::from(code),
            cursor_pos,
            detail_level,
        };
        match self.transport().exchange(Channel::Shell, request)? {
            Message::InspectReply(reply) => Ok(reply),
            other => Err(unexpected_reply("inspect_request", &other)),
        }
    }

    /// Ask the kernel for its info again, refreshing nothing cached.
    pub fn kernel_info_request(&self) -> crate::Result<JupyterMessage<KernelInfoReply>> {
        match self.transport().exchange(Channel::Shell, KernelInfoRequest {})? {
            Message::KernelInfoReply(reply) => Ok(reply),
            other => Err(unexpected_reply("kernel_info_request", &other)),
        }
    }

    pub fn send_input_reply(&self, value: &str) -> crate::Result<()> {
        self.transport().send_input_reply(value)?;
        Ok(())
    }

    pub fn input_replier(&self) -> InputReplier {
        InputReplier::new(Arc::clone(&self.connection.transport))
    }

    /// Interrupt the kernel. Message interrupts wait for the
    /// `interrupt_reply`.
    pub fn interrupt(&self) -> crate::Result<()> {
        match self.connection.interrupter() {
            Interrupter::Message => {
                match self.transport().exchange(Channel::Control, InterruptRequest {})? {
                    Message::InterruptReply(_) => Ok(()),
                    other => Err(unexpected_reply("interrupt_request", &other)),
                }
            },
            signal => signal.interrupt(self.transport()),
        }
    }

    /// Ask the kernel to shut down and close the connection. A kernel this
    /// client launched is stopped even when it does not answer.
    pub fn shutdown(self, restart: bool) -> crate::Result<JupyterMessage<ShutdownReply>> {
        self.listeners.shutdown.notify(&());

        let result = match self
            .transport()
            .exchange(Channel::Control, ShutdownRequest { restart })
        {
            Ok(Message::ShutdownReply(reply)) => Ok(reply),
            Ok(other) => Err(unexpected_reply("shutdown_request", &other)),
            Err(err) => Err(err),
        };

        self.connection.close();
        result
    }
}

fn unexpected_reply(request: &str, reply: &Message) -> Error {
    crate::anyhow!(
        "Unexpected '{}' in reply to '{request}'",
        reply.message_type()
    )
}
