/*
 * connection.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::path::Path;
use std::sync::Arc;

use log::info;
use stdext::ResultExt;

use crate::connection_file::ConnectionFile;
use crate::kernel_manager::Interrupter;
use crate::kernel_manager::KernelManager;
use crate::kernel_spec::KernelSpec;
use crate::options::ClientOptions;
use crate::session::Session;
use crate::transport::Transport;
use crate::wire::jupyter_message::JupyterMessage;
use crate::wire::status::ExecutionState;
use crate::wire::status::KernelStatus;

/// A live connection to one kernel, shared by both client shapes
pub struct Connection {
    pub transport: Arc<Transport>,

    /// Present when we launched the kernel ourselves
    manager: Option<KernelManager>,
}

impl Connection {
    /// Launch a kernel through the manager and connect to it.
    pub fn launch(
        mut manager: KernelManager,
        kernel_name: &str,
        options: &ClientOptions,
    ) -> crate::Result<Self> {
        let session = Session::new(&options.username);
        let path = manager.start(&session.session_id, kernel_name)?;
        let connection_file = ConnectionFile::from_file(&path)?;

        // On failure the manager is dropped, which stops the kernel
        let transport = Transport::connect(session, &connection_file, options)?;
        info!("Connected to kernel '{kernel_name}'");

        Ok(Self {
            transport: Arc::new(transport),
            manager: Some(manager),
        })
    }

    /// Connect to a kernel someone else launched.
    pub fn attach(path: &Path, options: &ClientOptions) -> crate::Result<Self> {
        let session = Session::new(&options.username);
        let connection_file = ConnectionFile::from_file(path)?;
        let transport = Transport::connect(session, &connection_file, options)?;
        info!("Attached to kernel at {}", path.display());

        Ok(Self {
            transport: Arc::new(transport),
            manager: None,
        })
    }

    pub fn kernel_spec(&self) -> Option<&KernelSpec> {
        self.manager.as_ref().and_then(|manager| manager.spec())
    }

    /// Kernels we did not launch can only be interrupted by message.
    pub fn interrupter(&self) -> Interrupter {
        match &self.manager {
            Some(manager) => manager.interrupter().unwrap_or(Interrupter::Message),
            None => Interrupter::Message,
        }
    }

    /// Stop the kernel process if we own it. The sockets close when the last
    /// reference to the transport goes away.
    pub fn close(mut self) {
        if let Some(mut manager) = self.manager.take() {
            manager.stop().log_err("Can't stop kernel");
        }
    }
}

/// Whether a status message reports that the kernel went idle after the
/// given request
pub fn is_idle_after(status: &JupyterMessage<KernelStatus>, msg_id: &str) -> bool {
    status.content.execution_state == ExecutionState::Idle && status.is_reply_to(msg_id)
}

/// Sends answers to `input_request`s; can be captured by an input listener.
#[derive(Clone)]
pub struct InputReplier {
    transport: Arc<Transport>,
}

impl InputReplier {
    pub(crate) fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub fn reply(&self, value: &str) -> crate::Result<()> {
        self.transport.send_input_reply(value)?;
        Ok(())
    }
}
