/*
 * transport.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Instant;

use crossbeam::channel::Sender;
use log::debug;
use log::error;
use log::trace;
use log::warn;

use crate::connection_file::ConnectionFile;
use crate::error::Error;
use crate::events::ClientEvent;
use crate::kernel_manager::InterruptChannel;
use crate::options::ClientOptions;
use crate::session::Session;
use crate::socket::channel::Channel;
use crate::socket::socket::Socket;
use crate::wire::control::InterruptRequest;
use crate::wire::jupyter_message::Message;
use crate::wire::jupyter_message::ProtocolMessage;
use crate::wire::shell::KernelInfoReply;
use crate::wire::shell::KernelInfoRequest;
use crate::wire::stdin::InputReply;

/// Receives the id of an outbound message before it is sent, so that a reply
/// arriving immediately afterwards can already be correlated.
pub trait Correlation {
    fn assign(&self, msg_id: &str);
}

/// The four channels to one kernel.
///
/// Each socket sits behind its own lock. The monitor loop holds a socket's
/// lock only while polling and reading it, never while dispatching, so
/// senders on other threads wait at most one poll interval.
pub struct Transport {
    session: Session,
    options: ClientOptions,
    shell: Mutex<Socket>,
    control: Mutex<Socket>,
    stdin: Mutex<Socket>,
    iopub: Mutex<Socket>,
    kernel_info: KernelInfoReply,
    _ctx: zmq::Context,
}

impl Transport {
    /// Open the four channels described by the connection file and confirm
    /// the kernel answers with a `kernel_info_request`.
    pub fn connect(
        mut session: Session,
        connection_file: &ConnectionFile,
        options: &ClientOptions,
    ) -> crate::Result<Self> {
        session.set_key(&connection_file.key)?;

        let ctx = zmq::Context::new();

        // Shell and stdin must share an identity so the kernel can route
        // input requests to the client that sent the execution.
        let identity = session.session_id.clone().into_bytes();

        let open = |channel: Channel, port: u16| -> crate::Result<Mutex<Socket>> {
            let socket = Socket::client(
                session.clone(),
                &ctx,
                channel,
                &identity,
                &connection_file.endpoint(port),
                options.linger,
            )?;
            Ok(Mutex::new(socket))
        };

        let shell = open(Channel::Shell, connection_file.shell_port)?;
        let control = open(Channel::Control, connection_file.control_port)?;
        let stdin = open(Channel::Stdin, connection_file.stdin_port)?;
        let iopub = open(Channel::IOPub, connection_file.iopub_port)?;

        let mut transport = Self {
            session,
            options: options.clone(),
            shell,
            control,
            stdin,
            iopub,
            kernel_info: KernelInfoReply::default(),
            _ctx: ctx,
        };

        match transport.exchange(Channel::Shell, KernelInfoRequest {})? {
            Message::KernelInfoReply(reply) => {
                debug!(
                    "Connected to {} kernel ({} {})",
                    reply.content.language_info.name,
                    reply.content.implementation,
                    reply.content.implementation_version
                );
                transport.kernel_info = reply.content;
            },
            other => {
                return Err(crate::anyhow!(
                    "Expected 'kernel_info_reply', got '{}'",
                    other.message_type()
                ));
            },
        }

        Ok(transport)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The kernel's answer to the `kernel_info_request` made on connect
    pub fn kernel_info(&self) -> &KernelInfoReply {
        &self.kernel_info
    }

    fn lock(&self, channel: Channel) -> MutexGuard<'_, Socket> {
        let socket = match channel {
            Channel::Shell => &self.shell,
            Channel::Control => &self.control,
            Channel::Stdin => &self.stdin,
            Channel::IOPub => &self.iopub,
        };
        match socket.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Sign and send a message on a channel. Returns the new message's id.
    ///
    /// The correlation tag, if any, learns the id before the frame leaves.
    pub fn send<T: ProtocolMessage>(
        &self,
        channel: Channel,
        content: T,
        tag: Option<&dyn Correlation>,
    ) -> crate::Result<String> {
        if channel == Channel::IOPub {
            return Err(crate::anyhow!("Can't send on the IOPub channel"));
        }

        let msg = self.session.build(content);
        let msg_id = msg.header.msg_id.clone();

        if let Some(tag) = tag {
            tag.assign(&msg_id);
        }

        let socket = self.lock(channel);
        msg.send(&socket)?;
        Ok(msg_id)
    }

    pub fn send_shell<T: ProtocolMessage>(
        &self,
        content: T,
        tag: Option<&dyn Correlation>,
    ) -> crate::Result<String> {
        self.send(Channel::Shell, content, tag)
    }

    pub fn send_control<T: ProtocolMessage>(&self, content: T) -> crate::Result<String> {
        self.send(Channel::Control, content, None)
    }

    /// Answer an `input_request` on the stdin channel.
    pub fn send_input_reply(&self, value: &str) -> crate::Result<String> {
        self.send(
            Channel::Stdin,
            InputReply {
                value: String::from(value),
            },
            None,
        )
    }

    /// Send a request and block until its reply arrives on the same channel,
    /// or the receive timeout expires.
    ///
    /// Frames on that channel that do not answer this request are logged and
    /// discarded. Must not run concurrently with the monitor loop, which
    /// would otherwise consume the reply.
    pub fn exchange<T: ProtocolMessage>(&self, channel: Channel, content: T) -> crate::Result<Message> {
        let msg = self.session.build(content);
        let msg_id = msg.header.msg_id.clone();
        let msg_type = msg.header.msg_type.clone();

        let socket = self.lock(channel);
        msg.send(&socket)?;

        let deadline = Instant::now() + self.options.receive_timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::ReceiveTimeout(channel.to_string(), msg_type));
            }

            match socket.poll_incoming(remaining.as_millis().max(1) as i64) {
                Ok(true) => {},
                Ok(false) => continue,
                Err(err) => return Err(Error::ZmqError(channel.to_string(), err)),
            }

            match Message::read_from_socket(&socket) {
                Ok(reply) if reply.is_reply_to(&msg_id) => return Ok(reply),
                Ok(reply) => {
                    warn!(
                        "Discarding '{}' on {channel} while waiting for reply to '{msg_type}'",
                        reply.message_type()
                    );
                },
                Err(err) if err.is_malformed() => {
                    warn!("Dropping malformed message on {channel}: {err}");
                },
                Err(err) => return Err(err),
            }
        }
    }

    /// Wait up to `timeout_ms` for one message on a channel.
    pub fn poll_once(&self, channel: Channel, timeout_ms: i64) -> crate::Result<Option<Message>> {
        let socket = self.lock(channel);

        match socket.poll_incoming(timeout_ms) {
            Ok(false) => return Ok(None),
            Ok(true) => {},
            Err(err) => return Err(Error::ZmqError(channel.to_string(), err)),
        }

        let msg = Message::read_from_socket(&socket)?;
        trace!("Received '{}' on {channel}", msg.message_type());
        Ok(Some(msg))
    }

    /// Read and classify one message, logging anything that can't be
    /// delivered.
    pub fn poll_event(&self, channel: Channel, timeout_ms: i64) -> Option<ClientEvent> {
        match self.poll_once(channel, timeout_ms) {
            Ok(Some(msg)) => route(msg),
            Ok(None) => None,
            Err(err) if err.is_malformed() => {
                warn!("Dropping malformed message on {channel}: {err}");
                None
            },
            Err(err) => {
                error!("Can't receive on {channel}: {err}");
                None
            },
        }
    }

    /// Poll all channels round-robin, dispatching each event, until `cancel`
    /// is set. Signals `done` on exit.
    pub fn monitor<F>(&self, cancel: &AtomicBool, done: Sender<()>, dispatch: F)
    where
        F: Fn(ClientEvent),
    {
        let interval = self.options.poll_interval_ms();
        debug!("Monitor loop started");

        'outer: while !cancel.load(Ordering::Acquire) {
            for channel in Channel::POLL_ORDER {
                if cancel.load(Ordering::Acquire) {
                    break 'outer;
                }

                if let Some(event) = self.poll_event(channel, interval) {
                    dispatch(event);
                }

                if cancel.load(Ordering::Acquire) {
                    break 'outer;
                }
            }
        }

        debug!("Monitor loop stopped");
        if let Err(err) = done.send(()) {
            warn!("Nobody waits for the monitor loop: {err}");
        }
    }

    /// Discard anything waiting on the given channels.
    pub fn flush(&self, channels: &[Channel]) {
        let interval = self.options.poll_interval_ms();
        for channel in channels {
            loop {
                match self.poll_once(*channel, interval) {
                    Ok(Some(msg)) => trace!("Flushed '{}' from {channel}", msg.message_type()),
                    Ok(None) => break,
                    Err(err) => warn!("Flushed unreadable message from {channel}: {err}"),
                }
            }
        }
    }
}

impl InterruptChannel for Transport {
    fn send_interrupt(&self) -> crate::Result<()> {
        self.send_control(InterruptRequest {})?;
        Ok(())
    }
}

/// Classify an inbound message for the client listeners. Messages that have
/// no listener are logged and dropped.
pub fn route(msg: Message) -> Option<ClientEvent> {
    match msg {
        Message::InputRequest(request) => Some(ClientEvent::InputRequest(request)),
        Message::Status(status) => Some(ClientEvent::Status(status)),
        Message::ExecuteResult(_) |
        Message::ExecuteInput(_) |
        Message::Stream(_) |
        Message::DisplayData(_) |
        Message::ExecuteError(_) |
        Message::ExecuteReply(_) |
        Message::ShutdownReply(_) |
        Message::InterruptReply(_) |
        Message::InspectReply(_) |
        Message::CompleteReply(_) |
        Message::CommOpen(_) |
        Message::CommMsg(_) |
        Message::CommClose(_) => Some(ClientEvent::Output(msg)),
        other => {
            warn!("Dropping unexpected '{}' message", other.message_type());
            None
        },
    }
}
