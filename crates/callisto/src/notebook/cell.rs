/*
 * cell.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::fmt;

use serde_json::Map;
use serde_json::Value;

use crate::notebook::nbformat::CellRecord;
use crate::notebook::output::Output;

/// Identifies a cell within its notebook. Ids are never reused by a
/// notebook, so a stale id can't alias a newer cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CellKind {
    Code,
    Markdown,
    Raw,
}

/// Execution state of a code cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
pub enum CellState {
    #[default]
    NotStarted,
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CodeCell {
    pub execution_count: Option<u32>,
    pub outputs: Vec<Output>,
    pub state: CellState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Code(CodeCell),
    Markdown,
    Raw,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    id: CellId,
    pub(crate) source: String,
    pub(crate) metadata: Map<String, Value>,
    pub(crate) content: CellContent,

    /// The nbformat `id`, required from format 4.5 on
    pub(crate) file_id: Option<String>,
    pub(crate) attachments: Option<Value>,
}

impl Cell {
    pub(crate) fn new(id: CellId, kind: CellKind, source: &str) -> Self {
        let content = match kind {
            CellKind::Code => CellContent::Code(CodeCell::default()),
            CellKind::Markdown => CellContent::Markdown,
            CellKind::Raw => CellContent::Raw,
        };
        Self {
            id,
            source: String::from(source),
            metadata: Map::new(),
            content,
            file_id: None,
            attachments: None,
        }
    }

    pub(crate) fn from_record(id: CellId, record: CellRecord) -> Self {
        match record {
            CellRecord::Code {
                id: file_id,
                metadata,
                source,
                execution_count,
                outputs,
            } => Self {
                id,
                source,
                metadata,
                content: CellContent::Code(CodeCell {
                    execution_count,
                    outputs,
                    state: CellState::NotStarted,
                }),
                file_id,
                attachments: None,
            },
            CellRecord::Markdown {
                id: file_id,
                metadata,
                source,
                attachments,
            } => Self {
                id,
                source,
                metadata,
                content: CellContent::Markdown,
                file_id,
                attachments,
            },
            CellRecord::Raw {
                id: file_id,
                metadata,
                source,
                attachments,
            } => Self {
                id,
                source,
                metadata,
                content: CellContent::Raw,
                file_id,
                attachments,
            },
        }
    }

    pub(crate) fn to_record(&self) -> CellRecord {
        let id = self.file_id.clone();
        let metadata = self.metadata.clone();
        let source = self.source.clone();
        let attachments = self.attachments.clone();
        match &self.content {
            CellContent::Code(code) => CellRecord::Code {
                id,
                metadata,
                source,
                execution_count: code.execution_count,
                outputs: code.outputs.clone(),
            },
            CellContent::Markdown => CellRecord::Markdown {
                id,
                metadata,
                source,
                attachments,
            },
            CellContent::Raw => CellRecord::Raw {
                id,
                metadata,
                source,
                attachments,
            },
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    pub fn kind(&self) -> CellKind {
        match self.content {
            CellContent::Code(_) => CellKind::Code,
            CellContent::Markdown => CellKind::Markdown,
            CellContent::Raw => CellKind::Raw,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn code(&self) -> Option<&CodeCell> {
        match &self.content {
            CellContent::Code(code) => Some(code),
            _ => None,
        }
    }

    pub(crate) fn code_mut(&mut self) -> Option<&mut CodeCell> {
        match &mut self.content {
            CellContent::Code(code) => Some(code),
            _ => None,
        }
    }

    /// Outputs of a code cell; empty for other cells
    pub fn outputs(&self) -> &[Output] {
        match &self.content {
            CellContent::Code(code) => &code.outputs,
            _ => &[],
        }
    }

    pub fn execution_count(&self) -> Option<u32> {
        self.code().and_then(|code| code.execution_count)
    }

    pub fn state(&self) -> Option<CellState> {
        self.code().map(|code| code.state)
    }
}
