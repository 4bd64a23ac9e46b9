/*
 * channel.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

/// The four channels of a Jupyter connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumIter)]
pub enum Channel {
    /// Interactive input prompts from the kernel
    Stdin,

    /// Broadcast of status and outputs
    IOPub,

    /// Requests for code execution, completion, and the like
    Shell,

    /// Interrupt and shutdown requests
    Control,
}

impl Channel {
    /// Order in which the monitor loop polls the channels each round
    pub const POLL_ORDER: [Channel; 4] = [
        Channel::Stdin,
        Channel::IOPub,
        Channel::Shell,
        Channel::Control,
    ];

    /// Socket type of the client end of this channel
    pub fn client_socket_type(&self) -> zmq::SocketType {
        match self {
            Channel::IOPub => zmq::SUB,
            _ => zmq::DEALER,
        }
    }

    /// Socket type of the kernel end of this channel
    pub fn kernel_socket_type(&self) -> zmq::SocketType {
        match self {
            Channel::IOPub => zmq::PUB,
            _ => zmq::ROUTER,
        }
    }
}
