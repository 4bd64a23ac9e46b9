/*
 * session.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use hmac::Hmac;
use hmac::Mac;
use hmac::digest::KeyInit;
use sha2::Sha256;

use crate::error::Error;
use crate::wire::header::JupyterHeader;
use crate::wire::jupyter_message::JupyterMessage;
use crate::wire::jupyter_message::ProtocolMessage;
use crate::wire::wire_message::WireMessage;

/// How outbound frames are signed and inbound frames verified
#[derive(Clone)]
enum Signer {
    /// The connection file carried an empty key; frames carry an empty
    /// signature and nothing is verified.
    Unsigned,

    /// HMAC-SHA256 keyed with the connection file's key
    HmacSha256(Hmac<Sha256>),
}

/// The client side of a Jupyter session: identity plus signing key.
///
/// A session is created before any kernel is known; the key is only
/// established once a connection file has been read, and until then any
/// attempt to sign a frame fails with `Error::MissingSigningKey`.
#[derive(Clone)]
pub struct Session {
    /// Unique identifier for this session, stamped into every header
    pub session_id: String,

    /// Name of the user, stamped into every header
    pub username: String,

    signer: Option<Signer>,
}

impl Session {
    pub fn new(username: &str) -> Self {
        Self {
            session_id: new_id(),
            username: String::from(username),
            signer: None,
        }
    }

    /// Create a session with its signing key already established.
    pub fn create(key: &str, username: &str) -> crate::Result<Self> {
        let mut session = Self::new(username);
        session.set_key(key)?;
        Ok(session)
    }

    /// Establish the signing key, typically copied from a connection file.
    /// An empty key means messages are not signed.
    pub fn set_key(&mut self, key: &str) -> crate::Result<()> {
        let signer = if key.is_empty() {
            Signer::Unsigned
        } else {
            match <Hmac<Sha256> as KeyInit>::new_from_slice(key.as_bytes()) {
                Ok(hmac) => Signer::HmacSha256(hmac),
                Err(err) => return Err(Error::HmacKeyInvalid(key.to_string(), err.to_string())),
            }
        };
        self.signer = Some(signer);
        Ok(())
    }

    /// Build a freshly originated message: new id, current timestamp, no
    /// parent.
    pub fn build<T: ProtocolMessage>(&self, content: T) -> JupyterMessage<T> {
        JupyterMessage {
            zmq_identities: Vec::new(),
            header: JupyterHeader::create(
                new_id(),
                T::message_type(),
                self.session_id.clone(),
                self.username.clone(),
            ),
            parent_header: None,
            content,
        }
    }

    /// Produce the signed frame list for a message:
    /// `[ids.., delimiter, signature, header, parent, metadata, content]`.
    pub fn frame<T: ProtocolMessage>(&self, msg: &JupyterMessage<T>) -> crate::Result<Vec<Vec<u8>>> {
        let wire = WireMessage::try_from(msg)?;
        wire.to_frames(self)
    }

    /// Compute the lowercase hex signature of the given payload parts.
    pub fn sign(&self, parts: &[Vec<u8>]) -> crate::Result<String> {
        match &self.signer {
            None => Err(Error::MissingSigningKey),
            Some(Signer::Unsigned) => Ok(String::new()),
            Some(Signer::HmacSha256(key)) => {
                let mut mac = key.clone();
                for part in parts {
                    mac.update(part);
                }
                Ok(hex::encode(mac.finalize().into_bytes().as_slice()))
            },
        }
    }

    /// Check a hex signature received on the wire against the payload parts.
    pub fn verify(&self, signature: &[u8], parts: &[Vec<u8>]) -> crate::Result<()> {
        let key = match &self.signer {
            None => return Err(Error::MissingSigningKey),
            Some(Signer::Unsigned) => return Ok(()),
            Some(Signer::HmacSha256(key)) => key,
        };

        let decoded = match hex::decode(signature) {
            Ok(decoded) => decoded,
            Err(err) => return Err(Error::InvalidHmac(signature.to_vec(), err)),
        };

        let mut mac = key.clone();
        for part in parts {
            mac.update(part);
        }
        if mac.verify_slice(&decoded).is_err() {
            return Err(Error::BadSignature(decoded));
        }

        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let signer = match &self.signer {
            None => "none",
            Some(Signer::Unsigned) => "unsigned",
            Some(Signer::HmacSha256(_)) => "hmac-sha256",
        };
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("username", &self.username)
            .field("signer", &signer)
            .finish()
    }
}

/// Generate a message id: 16 random bytes as lowercase hex, with a `-` after
/// the first four bytes.
pub fn new_id() -> String {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    let hex = hex::encode(bytes);
    format!("{}-{}", &hex[..8], &hex[8..])
}
