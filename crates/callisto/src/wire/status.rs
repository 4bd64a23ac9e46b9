/*
 * status.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;

/// Represents a message the kernel sends to all clients to indicate its
/// execution status.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KernelStatus {
    /// The kernel's current status
    pub execution_state: ExecutionState,
}

message_types! {
    KernelStatus => "status",
}

/// The execution state of the kernel
#[derive(
    Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq, strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum ExecutionState {
    /// The kernel is currently processing a request or executing code.
    Busy = 0,

    /// The kernel is waiting for instructions.
    Idle = 1,

    /// The kernel is starting up (sent only once!)
    Starting = 2,
}

impl ExecutionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ExecutionState::Busy,
            1 => ExecutionState::Idle,
            _ => ExecutionState::Starting,
        }
    }
}

/// Kernel state shared between the thread that observes status broadcasts
/// and any thread that reads it.
#[derive(Debug)]
pub struct AtomicExecutionState(AtomicU8);

impl AtomicExecutionState {
    pub fn new(state: ExecutionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> ExecutionState {
        ExecutionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: ExecutionState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for AtomicExecutionState {
    fn default() -> Self {
        Self::new(ExecutionState::Starting)
    }
}
