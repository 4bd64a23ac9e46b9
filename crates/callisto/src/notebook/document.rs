/*
 * document.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use log::debug;

use crate::error::Error;
use crate::events::Listeners;
use crate::notebook::cell::Cell;
use crate::notebook::cell::CellId;
use crate::notebook::cell::CellKind;
use crate::notebook::cell::CellState;
use crate::notebook::event::NotebookEvent;
use crate::notebook::nbformat::CELL_ID_MINOR;
use crate::notebook::nbformat::CellRecord;
use crate::notebook::nbformat::KernelInfoMetadata;
use crate::notebook::nbformat::LanguageInfoMetadata;
use crate::notebook::nbformat::NBFORMAT;
use crate::notebook::nbformat::NBFORMAT_MINOR;
use crate::notebook::nbformat::NotebookFile;
use crate::notebook::nbformat::NotebookMetadata;
use crate::notebook::output::Output;
use crate::notebook::pending::PendingIndex;
use crate::notebook::pending::PendingTag;
use crate::session::new_id;
use crate::wire::iopub::ExecuteInput;
use crate::wire::jupyter_message::Message;
use crate::wire::shell::ExecuteReply;

/// A notebook: an ordered list of cells owned by value, addressed by
/// `CellId`.
///
/// Every structural mutation marks the notebook dirty and raises exactly one
/// `NotebookEvent` to the registered listeners, synchronously.
pub struct Notebook {
    cells: Vec<Cell>,
    next_id: u64,
    metadata: NotebookMetadata,
    nbformat: u32,
    nbformat_minor: u32,
    dirty: bool,
    path: Option<PathBuf>,
    pending: PendingIndex,
    listeners: Listeners<NotebookEvent>,
}

impl Default for Notebook {
    fn default() -> Self {
        Self {
            cells: Vec::new(),
            next_id: 1,
            metadata: NotebookMetadata::default(),
            nbformat: NBFORMAT,
            nbformat_minor: NBFORMAT_MINOR,
            dirty: false,
            path: None,
            pending: PendingIndex::default(),
            listeners: Listeners::new(),
        }
    }
}

impl fmt::Debug for Notebook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notebook")
            .field("path", &self.path)
            .field("cells", &self.cells.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Notebook {
    /// An empty notebook for the given kernel and language
    pub fn new(kernel_name: &str, language_name: &str, language_version: &str) -> Self {
        let mut notebook = Self::default();
        notebook.set_kernel_metadata(kernel_name, language_name, language_version);
        notebook
    }

    pub fn set_kernel_metadata(&mut self, kernel_name: &str, language_name: &str, language_version: &str) {
        self.metadata.kernel_info = Some(KernelInfoMetadata {
            name: String::from(kernel_name),
        });
        self.metadata.language_info = Some(LanguageInfoMetadata {
            name: String::from(language_name),
            version: String::from(language_version),
        });
    }

    pub fn metadata(&self) -> &NotebookMetadata {
        &self.metadata
    }

    /// Register a listener for mutation events.
    pub fn on_event<F>(&self, listener: F)
    where
        F: Fn(&NotebookEvent) + Send + Sync + 'static,
    {
        self.listeners.add(listener);
    }

    fn mutated(&mut self, event: NotebookEvent) {
        self.dirty = true;
        self.listeners.notify(&event);
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.iter().find(|cell| cell.id() == id)
    }

    pub fn position(&self, id: CellId) -> Option<usize> {
        self.cells.iter().position(|cell| cell.id() == id)
    }

    fn index_of(&self, id: CellId) -> crate::Result<usize> {
        self.position(id).ok_or(Error::UnknownCell(id))
    }

    fn code_cell_index(&self, id: CellId) -> crate::Result<usize> {
        let index = self.index_of(id)?;
        match self.cells[index].kind() {
            CellKind::Code => Ok(index),
            _ => Err(Error::NotCodeCell(id)),
        }
    }

    fn next_cell_id(&mut self) -> CellId {
        let id = CellId::from_raw(self.next_id);
        self.next_id += 1;
        id
    }

    // Files at 4.5 and later need an id on every cell
    fn assign_file_id(&self, cell: &mut Cell) {
        if self.nbformat_minor >= CELL_ID_MINOR && cell.file_id.is_none() {
            cell.file_id = Some(new_id());
        }
    }

    fn insert(&mut self, index: usize, mut cell: Cell) -> CellId {
        self.assign_file_id(&mut cell);
        let index = index.min(self.cells.len());
        let id = cell.id();
        self.cells.insert(index, cell);
        self.mutated(NotebookEvent::InsertedCell { cell: id, index });
        id
    }

    /// Insert a new cell at `index`, or at the end when `index` is past it.
    pub fn insert_cell(&mut self, index: usize, kind: CellKind, source: &str) -> CellId {
        let id = self.next_cell_id();
        self.insert(index, Cell::new(id, kind, source))
    }

    pub fn add_code(&mut self, source: &str) -> CellId {
        self.insert_cell(self.cells.len(), CellKind::Code, source)
    }

    pub fn add_markdown(&mut self, text: &str) -> CellId {
        self.insert_cell(self.cells.len(), CellKind::Markdown, text)
    }

    pub fn add_raw(&mut self, text: &str) -> CellId {
        self.insert_cell(self.cells.len(), CellKind::Raw, text)
    }

    pub fn delete_cell(&mut self, id: CellId) -> crate::Result<()> {
        let index = self.index_of(id)?;
        self.cells.remove(index);
        self.pending.remove(id);
        self.mutated(NotebookEvent::DeletedCell { cell: id, index });
        Ok(())
    }

    /// Move a cell one position up (`-1`) or down (`+1`). Moving past either
    /// end leaves the notebook untouched.
    pub fn move_cell(&mut self, id: CellId, delta: isize) -> crate::Result<()> {
        let old_index = self.index_of(id)?;
        let new_index = match old_index.checked_add_signed(delta) {
            Some(index) if index < self.cells.len() => index,
            _ => return Ok(()),
        };
        if new_index == old_index {
            return Ok(());
        }

        let cell = self.cells.remove(old_index);
        self.cells.insert(new_index, cell);
        self.mutated(NotebookEvent::MovedCell {
            cell: id,
            old_index,
            new_index,
        });
        Ok(())
    }

    pub fn update_cell_source(&mut self, id: CellId, source: &str) -> crate::Result<()> {
        let index = self.index_of(id)?;
        self.cells[index].source = String::from(source);
        self.mutated(NotebookEvent::UpdatedCell { cell: id, index });
        Ok(())
    }

    pub fn append_output(&mut self, id: CellId, output: Output) -> crate::Result<()> {
        let index = self.code_cell_index(id)?;
        let Some(code) = self.cells[index].code_mut() else {
            return Err(Error::NotCodeCell(id));
        };
        code.outputs.push(output);
        let index = code.outputs.len() - 1;
        self.mutated(NotebookEvent::InsertedOutput { cell: id, index });
        Ok(())
    }

    pub fn append_output_from_message(&mut self, id: CellId, msg: &Message) -> crate::Result<()> {
        let output = Output::from_message(msg)?;
        self.append_output(id, output)
    }

    /// Remove one output, or all of them when `index` is `None`.
    pub fn delete_output(&mut self, id: CellId, index: Option<usize>) -> crate::Result<()> {
        let cell_index = self.code_cell_index(id)?;
        let Some(code) = self.cells[cell_index].code_mut() else {
            return Err(Error::NotCodeCell(id));
        };

        match index {
            Some(index) if index < code.outputs.len() => {
                code.outputs.remove(index);
            },
            Some(index) => {
                return Err(crate::anyhow!(
                    "Cell {id} has no output at index {index}"
                ));
            },
            None => code.outputs.clear(),
        }

        self.mutated(NotebookEvent::DeletedOutput { cell: id, index });
        Ok(())
    }

    pub fn clear_outputs(&mut self, id: CellId) -> crate::Result<()> {
        self.delete_output(id, None)
    }

    /// A correlation tag that records the next request id for a code cell.
    pub fn pending_tag(&self, id: CellId) -> crate::Result<PendingTag> {
        self.code_cell_index(id)?;
        Ok(self.pending.tag(id))
    }

    pub fn pending_message_id(&self, id: CellId) -> Option<String> {
        self.pending.get(id)
    }

    /// The code cell whose most recent request has the given id
    pub fn find_cell_by_pending_message_id(&self, msg_id: &str) -> Option<CellId> {
        self.pending.find(msg_id)
    }

    /// Mark a code cell as running. Execution state is not persisted, so
    /// this raises an update without dirtying the notebook.
    ///
    /// The id of the cell's previous request is forgotten, so late output
    /// from that run no longer lands in the cell.
    pub fn begin_execution(&mut self, id: CellId) -> crate::Result<()> {
        let index = self.code_cell_index(id)?;
        self.pending.remove(id);
        if let Some(code) = self.cells[index].code_mut() {
            code.state = CellState::Running;
        }
        self.listeners
            .notify(&NotebookEvent::UpdatedCell { cell: id, index });
        Ok(())
    }

    /// Record the kernel's `execute_reply` for a cell.
    pub fn complete_execution(&mut self, id: CellId, reply: &ExecuteReply) -> crate::Result<()> {
        let index = self.code_cell_index(id)?;
        if let Some(code) = self.cells[index].code_mut() {
            code.state = if reply.status.is_ok() {
                CellState::Completed
            } else {
                CellState::Error
            };
            if reply.execution_count > 0 {
                code.execution_count = Some(reply.execution_count);
            }
        }
        self.mutated(NotebookEvent::UpdatedCell { cell: id, index });
        Ok(())
    }

    /// Take the execution count and code the kernel announced for a cell.
    pub fn update_from_execute_input(&mut self, id: CellId, input: &ExecuteInput) -> crate::Result<()> {
        let index = self.code_cell_index(id)?;
        let cell = &mut self.cells[index];
        cell.source = input.code.clone();
        if let Some(code) = cell.code_mut() {
            code.execution_count = Some(input.execution_count);
        }
        self.mutated(NotebookEvent::UpdatedCell { cell: id, index });
        Ok(())
    }

    /// Apply a kernel message to the cell whose pending request caused it.
    /// Returns the cell, or `None` when the message concerns no cell here.
    pub fn apply_message(&mut self, msg: &Message) -> crate::Result<Option<CellId>> {
        let Some(parent_id) = msg.parent_id() else {
            return Ok(None);
        };
        let Some(cell) = self.find_cell_by_pending_message_id(parent_id) else {
            return Ok(None);
        };

        match msg {
            Message::ExecuteInput(input) => self.update_from_execute_input(cell, &input.content)?,
            Message::ExecuteReply(reply) => self.complete_execution(cell, &reply.content)?,
            msg if Output::is_output_message(msg) => self.append_output_from_message(cell, msg)?,
            _ => return Ok(None),
        }

        Ok(Some(cell))
    }

    /// Insert a cell parsed from its nbformat JSON, as when pasting. Raises
    /// one inserted-cell event and one inserted-output event per output.
    pub fn add_cell_from_json(&mut self, index: Option<usize>, json: &str) -> crate::Result<CellId> {
        let record: CellRecord = match serde_json::from_str(json) {
            Ok(record) => record,
            Err(err) => return Err(Error::InvalidCellJson(err)),
        };

        let id = self.next_cell_id();
        let mut cell = Cell::from_record(id, record);
        // A pasted copy must not share the original's id
        cell.file_id = None;
        let outputs = cell.outputs().len();
        self.insert(index.unwrap_or(self.cells.len()), cell);

        for index in 0..outputs {
            self.mutated(NotebookEvent::InsertedOutput { cell: id, index });
        }
        Ok(id)
    }

    /// The nbformat JSON of one cell, as when copying
    pub fn cell_to_json(&self, id: CellId) -> crate::Result<String> {
        let index = self.index_of(id)?;
        match serde_json::to_string(&self.cells[index].to_record()) {
            Ok(json) => Ok(json),
            Err(err) => Err(Error::CannotSerialize(err)),
        }
    }

    pub fn to_file_format(&self) -> NotebookFile {
        NotebookFile {
            metadata: self.metadata.clone(),
            nbformat: self.nbformat,
            nbformat_minor: self.nbformat_minor,
            cells: self.cells.iter().map(Cell::to_record).collect(),
        }
    }

    /// Write the notebook to `path`. On failure the notebook is left as it
    /// was, still dirty and still pointing at its previous path.
    pub fn save(&mut self, path: &Path) -> crate::Result<()> {
        let contents = match serde_json::to_string_pretty(&self.to_file_format()) {
            Ok(contents) => contents,
            Err(err) => return Err(Error::CannotSerialize(err)),
        };

        if let Err(err) = std::fs::write(path, contents) {
            return Err(Error::NotebookWrite(path.to_path_buf(), err));
        }

        debug!("Saved notebook to {}", path.display());
        self.path = Some(path.to_path_buf());
        self.dirty = false;
        Ok(())
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => return Err(Error::NotebookRead(path.to_path_buf(), err)),
        };
        let file: NotebookFile = match serde_json::from_str(&contents) {
            Ok(file) => file,
            Err(err) => return Err(Error::NotebookFormat(path.to_path_buf(), err)),
        };

        let mut notebook = Self {
            metadata: file.metadata,
            nbformat: file.nbformat,
            nbformat_minor: file.nbformat_minor,
            path: Some(path.to_path_buf()),
            ..Self::default()
        };
        for record in file.cells {
            let id = notebook.next_cell_id();
            let mut cell = Cell::from_record(id, record);
            notebook.assign_file_id(&mut cell);
            notebook.cells.push(cell);
        }

        debug!(
            "Loaded notebook {} with {} cells",
            path.display(),
            notebook.cells.len()
        );
        Ok(notebook)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn file_name(&self) -> Option<String> {
        self.path
            .as_ref()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// The file name, or "Untitled" for a notebook never saved
    pub fn title(&self) -> String {
        self.file_name().unwrap_or_else(|| String::from("Untitled"))
    }
}
