/*
 * dummy_kernel.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::path::Path;
use std::time::Duration;

use assert_matches::assert_matches;

use crate::connection_file::ConnectionFile;
use crate::session::Session;
use crate::socket::channel::Channel;
use crate::socket::socket::Socket;
use crate::wire::jupyter_message::JupyterMessage;
use crate::wire::jupyter_message::Message;
use crate::wire::jupyter_message::ProtocolMessage;
use crate::wire::jupyter_message::Status;
use crate::wire::shell::ExecuteRequest;
use crate::wire::shell::KernelInfoReply;
use crate::wire::shell::KernelInfoRequest;
use crate::wire::shell::LanguageInfo;
use crate::wire::status::ExecutionState;
use crate::wire::status::KernelStatus;
use crate::wire::stdin::InputRequest;

/// How long the fake kernel waits for a client message before failing the
/// test
const RECV_TIMEOUT_MS: i64 = 5000;

/// The kernel side of the protocol, bound to ephemeral local ports. Tests
/// drive it by hand from their own thread.
pub struct DummyKernel {
    pub shell_socket: Socket,
    pub control_socket: Socket,
    pub stdin_socket: Socket,
    pub iopub_socket: Socket,
    session: Session,
    key: String,
    _ctx: zmq::Context,
}

impl DummyKernel {
    pub fn new() -> Self {
        Self::with_key(&crate::session::new_id())
    }

    /// A kernel signing with the given key; an empty key disables signing.
    pub fn with_key(key: &str) -> Self {
        let session = Session::create(key, "kernel").unwrap();
        let ctx = zmq::Context::new();

        let socket = |channel: Channel| {
            Socket::kernel(session.clone(), &ctx, channel, "tcp://127.0.0.1:*").unwrap()
        };

        Self {
            shell_socket: socket(Channel::Shell),
            control_socket: socket(Channel::Control),
            stdin_socket: socket(Channel::Stdin),
            iopub_socket: socket(Channel::IOPub),
            session,
            key: String::from(key),
            _ctx: ctx,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn connection_file(&self) -> ConnectionFile {
        ConnectionFile {
            control_port: self.control_socket.bound_port().unwrap(),
            shell_port: self.shell_socket.bound_port().unwrap(),
            stdin_port: self.stdin_socket.bound_port().unwrap(),
            iopub_port: self.iopub_socket.bound_port().unwrap(),
            hb_port: 0,
            transport: String::from("tcp"),
            signature_scheme: String::from("hmac-sha256"),
            ip: String::from("127.0.0.1"),
            key: self.key.clone(),
            kernel_name: Some(String::from("dummy")),
        }
    }

    pub fn write_connection_file(&self, path: &Path) {
        self.connection_file().to_file(path).unwrap();
    }

    pub fn socket(&self, channel: Channel) -> &Socket {
        match channel {
            Channel::Shell => &self.shell_socket,
            Channel::Control => &self.control_socket,
            Channel::Stdin => &self.stdin_socket,
            Channel::IOPub => &self.iopub_socket,
        }
    }

    pub fn recv(&self, channel: Channel) -> Message {
        // Time out rather than hang the test when the client never sends
        let socket = self.socket(channel);
        if socket.poll_incoming(RECV_TIMEOUT_MS).unwrap() {
            return Message::read_from_socket(socket).unwrap();
        }
        panic!("Timeout while expecting message on socket {}", socket.channel);
    }

    pub fn recv_shell(&self) -> Message {
        self.recv(Channel::Shell)
    }

    pub fn recv_control(&self) -> Message {
        self.recv(Channel::Control)
    }

    pub fn recv_stdin(&self) -> Message {
        self.recv(Channel::Stdin)
    }

    /// Receive from Shell and assert an `ExecuteRequest`.
    pub fn recv_execute_request(&self) -> JupyterMessage<ExecuteRequest> {
        assert_matches!(self.recv_shell(), Message::ExecuteRequest(request) => request)
    }

    /// Answer a request on the channel it came in on.
    pub fn reply<R, T: ProtocolMessage>(&self, channel: Channel, request: &JupyterMessage<R>, content: T) {
        JupyterMessage::<T> {
            zmq_identities: request.zmq_identities.clone(),
            parent_header: Some(request.header.clone()),
            ..self.session.build(content)
        }
        .send(self.socket(channel))
        .unwrap();
    }

    /// Broadcast a message on IOPub caused by `parent`.
    pub fn publish<R, T: ProtocolMessage>(&self, parent: &JupyterMessage<R>, content: T) {
        let mut msg = self.session.build(content);
        msg.parent_header = Some(parent.header.clone());
        msg.send(&self.iopub_socket).unwrap();
    }

    pub fn publish_status<R>(&self, parent: &JupyterMessage<R>, execution_state: ExecutionState) {
        self.publish(parent, KernelStatus { execution_state });
    }

    /// Prompt the client for input on behalf of `parent`.
    pub fn send_input_request<R>(&self, parent: &JupyterMessage<R>, prompt: &str, password: bool) {
        self.reply(Channel::Stdin, parent, InputRequest {
            prompt: String::from(prompt),
            password,
        });
    }

    /// Send arbitrary frames on Shell to the peer that sent `request`,
    /// bypassing signing.
    pub fn send_raw_shell<R>(&self, request: &JupyterMessage<R>, parts: &[&[u8]]) {
        let mut frames = request.zmq_identities.clone();
        frames.extend(parts.iter().map(|part| part.to_vec()));
        self.shell_socket.send_multipart(&frames).unwrap();
    }

    /// Answer the `kernel_info_request` every client opens with. Returns the
    /// request.
    pub fn serve_kernel_info(&self) -> JupyterMessage<KernelInfoRequest> {
        let request = assert_matches!(self.recv_shell(), Message::KernelInfoRequest(request) => request);
        self.reply(Channel::Shell, &request, Self::kernel_info_reply());

        // Let the client's IOPub subscription reach us before anything is
        // published
        std::thread::sleep(Duration::from_millis(300));
        request
    }

    pub fn kernel_info_reply() -> KernelInfoReply {
        KernelInfoReply {
            status: Status::Ok,
            protocol_version: String::from("5.3"),
            implementation: String::from("dummy"),
            implementation_version: String::from("1.0.0"),
            language_info: LanguageInfo {
                name: String::from("python"),
                version: String::from("3.12.0"),
                ..LanguageInfo::default()
            },
            banner: String::from("Dummy kernel"),
            help_links: Vec::new(),
        }
    }
}

impl Default for DummyKernel {
    fn default() -> Self {
        Self::new()
    }
}
