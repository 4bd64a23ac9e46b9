/*
 * pending.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::notebook::cell::CellId;
use crate::transport::Correlation;

/// Maps code cells to the id of their most recent `execute_request`.
///
/// Shared between the document and the thread that sends requests; the lock
/// is held only for one lookup or assignment.
#[derive(Debug, Clone, Default)]
pub struct PendingIndex {
    entries: Arc<Mutex<Vec<(CellId, String)>>>,
}

impl PendingIndex {
    fn lock(&self) -> MutexGuard<'_, Vec<(CellId, String)>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Record a new request for the cell, replacing the previous one.
    pub fn assign(&self, cell: CellId, msg_id: &str) {
        let mut entries = self.lock();
        match entries.iter_mut().find(|(id, _)| *id == cell) {
            Some(entry) => entry.1 = String::from(msg_id),
            None => entries.push((cell, String::from(msg_id))),
        }
    }

    pub fn get(&self, cell: CellId) -> Option<String> {
        self.lock()
            .iter()
            .find(|(id, _)| *id == cell)
            .map(|(_, msg_id)| msg_id.clone())
    }

    pub fn find(&self, msg_id: &str) -> Option<CellId> {
        self.lock()
            .iter()
            .find(|(_, pending)| pending == msg_id)
            .map(|(id, _)| *id)
    }

    pub fn remove(&self, cell: CellId) {
        self.lock().retain(|(id, _)| *id != cell);
    }

    pub fn tag(&self, cell: CellId) -> PendingTag {
        PendingTag {
            index: self.clone(),
            cell,
        }
    }
}

/// Correlation tag for one cell: records the request id in the index
/// before the request is sent.
#[derive(Debug, Clone)]
pub struct PendingTag {
    index: PendingIndex,
    cell: CellId,
}

impl Correlation for PendingTag {
    fn assign(&self, msg_id: &str) {
        self.index.assign(self.cell, msg_id);
    }
}
