/*
 * socket.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::time::Duration;

use log::trace;

use crate::error::Error;
use crate::session::Session;
use crate::socket::channel::Channel;

/// One end of a Jupyter channel. Frames sent and received through it are
/// signed and verified with `session`.
pub struct Socket {
    pub session: Session,

    /// Which channel this socket carries; used for routing and in logs
    pub channel: Channel,

    pub socket: zmq::Socket,
}

impl Socket {
    /// Open the client end of `channel` and connect it to the kernel.
    ///
    /// The kernel routes stdin traffic by socket identity, so shell and stdin
    /// must be opened with the same `identity`. IOPub is subscribed to every
    /// topic.
    pub fn client(
        session: Session,
        ctx: &zmq::Context,
        channel: Channel,
        identity: &[u8],
        endpoint: &str,
        linger: Duration,
    ) -> Result<Self, Error> {
        let socket = Self::create(ctx, channel, channel.client_socket_type())?;
        let name = channel.to_string();

        socket
            .set_identity(identity)
            .map_err(|err| Error::CreateSocketFailed(name.clone(), err))?;
        socket
            .set_linger(linger.as_millis() as i32)
            .map_err(|err| Error::CreateSocketFailed(name.clone(), err))?;

        trace!("Connecting {channel} socket to {endpoint}");
        socket
            .connect(endpoint)
            .map_err(|err| Error::SocketConnectError(name.clone(), endpoint.to_string(), err))?;

        if channel == Channel::IOPub {
            socket
                .set_subscribe(b"")
                .map_err(|err| Error::ZmqError(name, err))?;
        }

        Ok(Self {
            session,
            channel,
            socket,
        })
    }

    /// Bind the kernel end of `channel`. Only the test kernel needs this.
    pub fn kernel(
        session: Session,
        ctx: &zmq::Context,
        channel: Channel,
        endpoint: &str,
    ) -> Result<Self, Error> {
        let socket = Self::create(ctx, channel, channel.kernel_socket_type())?;

        trace!("Binding {channel} socket to {endpoint}");
        socket.bind(endpoint).map_err(|err| {
            Error::SocketBindError(channel.to_string(), endpoint.to_string(), err)
        })?;

        Ok(Self {
            session,
            channel,
            socket,
        })
    }

    fn create(
        ctx: &zmq::Context,
        channel: Channel,
        kind: zmq::SocketType,
    ) -> Result<zmq::Socket, Error> {
        ctx.socket(kind)
            .map_err(|err| Error::CreateSocketFailed(channel.to_string(), err))
    }

    /// Blocks until a complete multipart message arrives.
    pub fn recv_multipart(&self) -> Result<Vec<Vec<u8>>, Error> {
        self.socket
            .recv_multipart(0)
            .map_err(|err| Error::ZmqError(self.channel.to_string(), err))
    }

    pub fn send_multipart(&self, frames: &[Vec<u8>]) -> Result<(), Error> {
        self.socket
            .send_multipart(frames, 0)
            .map_err(|err| Error::ZmqError(self.channel.to_string(), err))
    }

    /// Waits up to `timeout_ms` for something to read. A timeout of 0 checks
    /// without waiting.
    pub fn poll_incoming(&self, timeout_ms: i64) -> zmq::Result<bool> {
        Ok(self.socket.poll(zmq::PollEvents::POLLIN, timeout_ms)? != 0)
    }

    /// The TCP port picked by the OS after binding to a `*` port.
    pub fn bound_port(&self) -> Result<u16, Error> {
        let endpoint = match self.socket.get_last_endpoint() {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(_)) => {
                return Err(crate::anyhow!(
                    "{} socket has a non UTF-8 endpoint",
                    self.channel
                ))
            },
            Err(err) => return Err(Error::ZmqError(self.channel.to_string(), err)),
        };

        endpoint
            .rsplit(':')
            .next()
            .and_then(|port| port.parse::<u16>().ok())
            .ok_or_else(|| crate::anyhow!("Can't parse port from endpoint {endpoint}"))
    }
}
