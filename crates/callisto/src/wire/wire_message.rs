/*
 * wire_message.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use log::trace;
use serde::de::DeserializeOwned;
use serde_json::json;
use serde_json::value::Value;

use crate::error::Error;
use crate::session::Session;
use crate::socket::socket::Socket;
use crate::wire::header::JupyterHeader;
use crate::wire::jupyter_message::JupyterMessage;
use crate::wire::jupyter_message::ProtocolMessage;

/// Separates the routing identities from the signed body of a frame.
pub const MSG_DELIM: &[u8] = b"<IDS|MSG>";

/// Signature, header, parent header, metadata and content. Anything after
/// these is a binary buffer, which the client ignores.
const MSG_PARTS: usize = 5;

/// A decoded but untyped message. `Message::try_from` picks the content type
/// from `header.msg_type`.
#[derive(Debug)]
pub struct WireMessage {
    /// Routing prefix. Empty for everything a DEALER or SUB socket receives.
    pub zmq_identities: Vec<Vec<u8>>,
    pub header: JupyterHeader,
    pub parent_header: Option<JupyterHeader>,
    pub metadata: Value,
    pub content: Value,
}

impl WireMessage {
    pub fn read_from_socket(socket: &Socket) -> Result<WireMessage, Error> {
        let frames = socket.recv_multipart()?;
        Self::from_buffers(frames, &socket.session)
    }

    pub fn message_type(&self) -> String {
        self.header.msg_type.clone()
    }

    /// Split a multipart frame at the delimiter, check its signature and
    /// decode the JSON parts.
    pub fn from_buffers(mut frames: Vec<Vec<u8>>, session: &Session) -> Result<WireMessage, Error> {
        let delim = frames
            .iter()
            .position(|frame| frame.as_slice() == MSG_DELIM)
            .ok_or(Error::MissingDelimiter)?;

        let parts: Vec<Vec<u8>> = frames.split_off(delim + 1);
        frames.truncate(delim);

        if parts.len() < MSG_PARTS {
            return Err(Error::InsufficientParts(parts.len(), MSG_PARTS));
        }
        session.verify(&parts[0], &parts[1..MSG_PARTS])?;

        let header = decode_part(&parts[1], "header")?;
        let header = serde_json::from_value(header.clone())
            .map_err(|err| Error::InvalidPart(String::from("header"), header, err))?;

        // Orphans carry `{}` as their parent; some kernels send `null`
        let parent = decode_part(&parts[2], "parent header")?;
        let parent_header = match parent {
            Value::Null => None,
            Value::Object(ref map) if map.is_empty() => None,
            _ => Some(
                serde_json::from_value(parent.clone()).map_err(|err| {
                    Error::InvalidPart(String::from("parent header"), parent, err)
                })?,
            ),
        };

        Ok(Self {
            zmq_identities: frames,
            header,
            parent_header,
            metadata: decode_part(&parts[3], "metadata")?,
            content: decode_part(&parts[4], "content")?,
        })
    }

    /// Identities, delimiter, signature, then the four JSON parts.
    pub fn to_frames(&self, session: &Session) -> Result<Vec<Vec<u8>>, Error> {
        let body = self.encode_body().map_err(Error::CannotSerialize)?;
        let signature = session.sign(&body)?;

        let mut frames = self.zmq_identities.clone();
        frames.push(MSG_DELIM.to_vec());
        frames.push(signature.into_bytes());
        frames.extend(body);
        Ok(frames)
    }

    pub fn send(&self, socket: &Socket) -> Result<(), Error> {
        match &self.parent_header {
            Some(parent) => trace!(
                "{}: sending '{}' in reply to '{}'",
                socket.channel,
                self.describe(),
                parent.msg_type
            ),
            None => trace!("{}: sending '{}'", socket.channel, self.describe()),
        }

        let frames = self.to_frames(&socket.session)?;
        socket.send_multipart(&frames)
    }

    fn encode_body(&self) -> Result<Vec<Vec<u8>>, serde_json::Error> {
        let parent = match &self.parent_header {
            Some(parent) => serde_json::to_vec(parent)?,
            None => b"{}".to_vec(),
        };

        Ok(vec![
            serde_json::to_vec(&self.header)?,
            parent,
            serde_json::to_vec(&self.metadata)?,
            serde_json::to_vec(&self.content)?,
        ])
    }

    // `status/idle` reads better than `status` in traces
    fn describe(&self) -> String {
        match self.content.get("execution_state") {
            Some(Value::String(state)) if self.header.msg_type == "status" => {
                format!("status/{state}")
            },
            _ => self.header.msg_type.clone(),
        }
    }
}

fn decode_part(buf: &[u8], what: &str) -> Result<Value, Error> {
    let text = std::str::from_utf8(buf)
        .map_err(|err| Error::Utf8Error(String::from(what), buf.to_vec(), err))?;
    serde_json::from_str(text)
        .map_err(|err| Error::JsonParseError(String::from(what), String::from(text), err))
}

impl<T: ProtocolMessage + DeserializeOwned> TryFrom<&WireMessage> for JupyterMessage<T> {
    type Error = Error;

    fn try_from(msg: &WireMessage) -> Result<JupyterMessage<T>, Error> {
        let content = serde_json::from_value(msg.content.clone())
            .map_err(|err| Error::InvalidMessage(T::message_type(), msg.content.clone(), err))?;

        Ok(JupyterMessage {
            zmq_identities: msg.zmq_identities.clone(),
            header: msg.header.clone(),
            parent_header: msg.parent_header.clone(),
            content,
        })
    }
}

impl<T: ProtocolMessage> TryFrom<&JupyterMessage<T>> for WireMessage {
    type Error = Error;

    fn try_from(msg: &JupyterMessage<T>) -> Result<Self, Error> {
        Ok(Self {
            zmq_identities: msg.zmq_identities.clone(),
            header: msg.header.clone(),
            parent_header: msg.parent_header.clone(),
            metadata: json!({}),
            content: serde_json::to_value(&msg.content).map_err(Error::CannotSerialize)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::wire::jupyter_message::Message;
    use crate::wire::jupyter_message::Status;
    use crate::wire::shell::ExecuteReply;
    use crate::wire::shell::KernelInfoRequest;

    use super::*;

    fn session() -> Session {
        Session::create("key", "username").unwrap()
    }

    #[test]
    fn test_short_frame_is_rejected() {
        let bufs = vec![MSG_DELIM.to_vec(), b"".to_vec(), b"{}".to_vec()];
        assert_matches!(
            WireMessage::from_buffers(bufs, &session()),
            Err(Error::InsufficientParts(2, 5))
        );
    }

    #[test]
    fn test_frame_without_delimiter_is_rejected() {
        let bufs = vec![b"{}".to_vec(); 6];
        assert_matches!(
            WireMessage::from_buffers(bufs, &session()),
            Err(Error::MissingDelimiter)
        );
    }

    #[test]
    fn test_identities_are_preserved() {
        let session = session();
        let mut msg = session.build(KernelInfoRequest {});
        msg.zmq_identities = vec![b"peer".to_vec()];

        let frames = session.frame(&msg).unwrap();
        assert_eq!(frames[0], b"peer".to_vec());

        let wire = WireMessage::from_buffers(frames, &session).unwrap();
        assert_eq!(wire.zmq_identities, vec![b"peer".to_vec()]);
        assert!(wire.parent_header.is_none());
    }

    #[test]
    fn test_reply_carries_parent() {
        let session = session();
        let request = session.build(KernelInfoRequest {});
        let reply = request.create_reply(
            ExecuteReply {
                status: Status::Ok,
                execution_count: 3,
                ename: None,
                evalue: None,
            },
            &session,
        );

        let frames = session.frame(&reply).unwrap();
        let wire = WireMessage::from_buffers(frames, &session).unwrap();
        let msg = Message::try_from(&wire).unwrap();

        assert!(msg.is_reply_to(&request.header.msg_id));
        assert_matches!(msg, Message::ExecuteReply(reply) => {
            assert_eq!(reply.content.execution_count, 3);
        });
    }

    #[test]
    fn test_unknown_type_is_reported() {
        let session = session();
        let mut wire = WireMessage::try_from(&session.build(KernelInfoRequest {})).unwrap();
        wire.header.msg_type = String::from("history_request");
        assert_matches!(
            Message::try_from(&wire),
            Err(Error::UnknownMessageType(kind)) if kind == "history_request"
        );
    }

    #[test]
    fn test_undecodable_content_is_reported() {
        let session = session();
        let mut wire = WireMessage::try_from(&session.build(KernelInfoRequest {})).unwrap();
        wire.header.msg_type = String::from("execute_reply");
        wire.content = json!({"status": "weird"});
        assert_matches!(Message::try_from(&wire), Err(Error::InvalidMessage(..)));
    }
}
