/*
 * mod.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

pub mod cell;
pub mod document;
pub mod event;
pub mod nbformat;
pub mod output;
pub mod pending;

pub use cell::Cell;
pub use cell::CellId;
pub use cell::CellKind;
pub use cell::CellState;
pub use document::Notebook;
pub use event::NotebookEvent;
pub use output::Output;
