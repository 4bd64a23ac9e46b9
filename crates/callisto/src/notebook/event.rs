/*
 * event.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use crate::notebook::cell::CellId;

/// A structural change to a notebook, carrying enough identity for a view
/// to apply the change incrementally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotebookEvent {
    InsertedCell {
        cell: CellId,
        index: usize,
    },

    /// Source, execution count, or execution state changed
    UpdatedCell {
        cell: CellId,
        index: usize,
    },

    DeletedCell {
        cell: CellId,
        index: usize,
    },

    MovedCell {
        cell: CellId,
        old_index: usize,
        new_index: usize,
    },

    InsertedOutput {
        cell: CellId,
        index: usize,
    },

    /// One output was removed, or all of them when `index` is `None`
    DeletedOutput {
        cell: CellId,
        index: Option<usize>,
    },
}

impl NotebookEvent {
    pub fn cell(&self) -> CellId {
        match self {
            NotebookEvent::InsertedCell { cell, .. } |
            NotebookEvent::UpdatedCell { cell, .. } |
            NotebookEvent::DeletedCell { cell, .. } |
            NotebookEvent::MovedCell { cell, .. } |
            NotebookEvent::InsertedOutput { cell, .. } |
            NotebookEvent::DeletedOutput { cell, .. } => *cell,
        }
    }
}
