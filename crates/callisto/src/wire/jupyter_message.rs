/*
 * jupyter_message.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::session::Session;
use crate::socket::socket::Socket;
use crate::wire::control::InterruptReply;
use crate::wire::control::InterruptRequest;
use crate::wire::control::ShutdownReply;
use crate::wire::control::ShutdownRequest;
use crate::wire::header::JupyterHeader;
use crate::wire::iopub::CommClose;
use crate::wire::iopub::CommOpen;
use crate::wire::iopub::CommWireMsg;
use crate::wire::iopub::DisplayData;
use crate::wire::iopub::ExecuteError;
use crate::wire::iopub::ExecuteInput;
use crate::wire::iopub::ExecuteResult;
use crate::wire::iopub::StreamOutput;
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
use crate::wire::status::KernelStatus;
use crate::wire::stdin::InputReply;
use crate::wire::stdin::InputRequest;
use crate::wire::wire_message::WireMessage;

/// A message whose content has been decoded into `T`.
#[derive(Debug, Clone)]
pub struct JupyterMessage<T> {
    /// Routing prefix; only non-empty on the kernel's ROUTER sockets
    pub zmq_identities: Vec<Vec<u8>>,

    pub header: JupyterHeader,

    /// Header of the request that caused this message. `None` for requests
    /// and unsolicited broadcasts.
    pub parent_header: Option<JupyterHeader>,

    pub content: T,
}

/// The `msg_type` string of a content type.
pub trait MessageType {
    fn message_type() -> String;
}

/// Everything a content type needs to be framed and sent.
pub trait ProtocolMessage: MessageType + Serialize + std::fmt::Debug + Clone {}
impl<T> ProtocolMessage for T where T: MessageType + Serialize + std::fmt::Debug + Clone {}

/// Represents status returned from kernel inside messages.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Ok,
    Error,

    /// Sent for queued requests skipped after an earlier failure
    #[serde(rename = "aborted", alias = "abort")]
    Aborted,

    /// Any status this client does not know; treated like `error`
    #[serde(other)]
    Unknown,
}

impl Status {
    /// Serde default for replies from kernels that omit the status
    pub fn ok() -> Self {
        Status::Ok
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

/// Declares `Message` with one variant per content type, along with the
/// decoding table keyed on `msg_type`.
macro_rules! messages {
    ($($variant:ident($content:ty)),* $(,)?) => {
        /// Every message the client can decode. Anything else on the wire is
        /// reported as `Error::UnknownMessageType`.
        #[derive(Debug, Clone)]
        pub enum Message {
            $($variant(JupyterMessage<$content>),)*
        }

        impl Message {
            pub fn header(&self) -> &JupyterHeader {
                match self {
                    $(Message::$variant(msg) => &msg.header,)*
                }
            }

            pub fn parent_header(&self) -> Option<&JupyterHeader> {
                match self {
                    $(Message::$variant(msg) => msg.parent_header.as_ref(),)*
                }
            }
        }

        impl TryFrom<&Message> for WireMessage {
            type Error = Error;

            fn try_from(msg: &Message) -> Result<Self, Error> {
                match msg {
                    $(Message::$variant(msg) => WireMessage::try_from(msg),)*
                }
            }
        }

        impl TryFrom<&WireMessage> for Message {
            type Error = Error;

            fn try_from(msg: &WireMessage) -> Result<Self, Error> {
                let kind = msg.header.msg_type.as_str();
                $(
                    if kind == <$content as MessageType>::message_type() {
                        return Ok(Message::$variant(JupyterMessage::try_from(msg)?));
                    }
                )*
                Err(Error::UnknownMessageType(String::from(kind)))
            }
        }
    };
}

messages! {
    // Shell
    KernelInfoRequest(KernelInfoRequest),
    KernelInfoReply(KernelInfoReply),
    ExecuteRequest(ExecuteRequest),
    ExecuteReply(ExecuteReply),
    CompleteRequest(CompleteRequest),
    CompleteReply(CompleteReply),
    InspectRequest(InspectRequest),
    InspectReply(InspectReply),
    IsCompleteRequest(IsCompleteRequest),
    IsCompleteReply(IsCompleteReply),

    // Stdin
    InputRequest(InputRequest),
    InputReply(InputReply),

    // Control
    InterruptRequest(InterruptRequest),
    InterruptReply(InterruptReply),
    ShutdownRequest(ShutdownRequest),
    ShutdownReply(ShutdownReply),

    // IOPub
    Status(KernelStatus),
    ExecuteInput(ExecuteInput),
    ExecuteResult(ExecuteResult),
    ExecuteError(ExecuteError),
    Stream(StreamOutput),
    DisplayData(DisplayData),
    CommOpen(CommOpen),
    CommMsg(CommWireMsg),
    CommClose(CommClose),
}

impl Message {
    pub fn read_from_socket(socket: &Socket) -> Result<Self, Error> {
        let msg = WireMessage::read_from_socket(socket)?;
        Message::try_from(&msg)
    }

    pub fn send(&self, socket: &Socket) -> Result<(), Error> {
        WireMessage::try_from(self)?.send(socket)
    }

    pub fn message_type(&self) -> &str {
        &self.header().msg_type
    }

    /// The id of the request this message answers, if any
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_header().map(|parent| parent.msg_id.as_str())
    }

    /// Whether this message was caused by the request with the given id
    pub fn is_reply_to(&self, msg_id: &str) -> bool {
        self.parent_id() == Some(msg_id)
    }
}

impl<T> JupyterMessage<T> {
    /// Whether this message was caused by the request with the given id
    pub fn is_reply_to(&self, msg_id: &str) -> bool {
        self.parent_header
            .as_ref()
            .is_some_and(|parent| parent.msg_id == msg_id)
    }
}

impl<T> JupyterMessage<T>
where
    T: ProtocolMessage,
{
    pub fn send(self, socket: &Socket) -> Result<(), Error> {
        WireMessage::try_from(&self)?.send(socket)
    }

    /// Create a reply to this message, addressed to the same peer. Used by
    /// the kernel side of the test fixtures.
    pub fn create_reply<R: ProtocolMessage>(&self, content: R, session: &Session) -> JupyterMessage<R> {
        JupyterMessage::<R> {
            zmq_identities: self.zmq_identities.clone(),
            parent_header: Some(self.header.clone()),
            ..session.build(content)
        }
    }
}
