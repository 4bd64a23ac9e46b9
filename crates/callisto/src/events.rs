/*
 * events.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::sync::Arc;
use std::sync::Mutex;

use crate::wire::jupyter_message::JupyterMessage;
use crate::wire::jupyter_message::Message;
use crate::wire::shell::KernelInfoReply;
use crate::wire::status::KernelStatus;
use crate::wire::stdin::InputRequest;

/// An inbound message, classified for delivery to client listeners
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The kernel asks the user for input
    InputRequest(JupyterMessage<InputRequest>),

    /// The kernel changed its execution state
    Status(JupyterMessage<KernelStatus>),

    /// Any output-class message: results, streams, errors, and replies
    Output(Message),
}

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// An ordered list of callbacks for one kind of event. Callbacks run
/// synchronously on the notifying thread, in registration order.
pub struct Listeners<T> {
    listeners: Mutex<Vec<Listener<T>>>,
}

impl<T> Listeners<T> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn add<F>(&self, listener: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.lock().push(Arc::new(listener));
    }

    pub fn notify(&self, event: &T) {
        // Snapshot so listeners may register further listeners
        let listeners: Vec<Listener<T>> = self.lock().clone();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Listener<T>>> {
        match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Listeners for every event a client raises
#[derive(Default)]
pub struct ClientListeners {
    /// Raised once the connection is established, with the kernel's info
    pub connected: Listeners<KernelInfoReply>,

    /// Raised when the client begins shutting down
    pub shutdown: Listeners<()>,

    pub status: Listeners<JupyterMessage<KernelStatus>>,
    pub output: Listeners<Message>,
    pub input_request: Listeners<JupyterMessage<InputRequest>>,
}

impl ClientListeners {
    pub fn dispatch(&self, event: &ClientEvent) {
        match event {
            ClientEvent::InputRequest(request) => self.input_request.notify(request),
            ClientEvent::Status(status) => self.status.notify(status),
            ClientEvent::Output(message) => self.output.notify(message),
        }
    }
}
