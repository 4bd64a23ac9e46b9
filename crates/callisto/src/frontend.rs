/*
 * frontend.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::Weak;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use log::debug;
use log::info;

use crate::client::JupyterClient;
use crate::error::Error;
use crate::events::Listeners;
use crate::kernel_manager::KernelManager;
use crate::kernel_spec::KernelSpecList;
use crate::notebook::CellId;
use crate::notebook::CellKind;
use crate::notebook::Notebook;
use crate::notebook::NotebookEvent;
use crate::options::ClientOptions;
use crate::wire::jupyter_message::JupyterMessage;
use crate::wire::jupyter_message::Message;
use crate::wire::shell::KernelInfoReply;
use crate::wire::stdin::InputRequest;

/// Answer to "save changes before continuing?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveDecision {
    Save,
    Discard,
    Cancel,
}

/// A kernel offered for selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelChoice {
    pub name: String,
    pub display_name: String,
}

/// What the presentation layer provides to a notebook session.
///
/// `ask_string` and `offer_completion` are called from the client's monitor
/// thread; everything else is called from whichever thread drives the
/// session.
pub trait FrontendServices: Send + Sync {
    fn show_error(&self, message: &str);

    fn ask_save(&self, document_title: &str) -> SaveDecision;

    /// Prompt for a line of input. An empty string answers a cancelled
    /// prompt.
    fn ask_string(&self, prompt: &str, secret: bool) -> String;

    fn pick_file_open(&self) -> Option<PathBuf>;

    fn pick_file_save(&self) -> Option<PathBuf>;

    /// A script for the kernel to run; `None` when the user cancels.
    fn pick_script_file(&self) -> Option<PathBuf>;

    /// The text currently typed into the input area
    fn pending_input_text(&self) -> String;

    fn set_input_text(&self, text: &str);

    fn enter_cell_edit_mode(&self, source: &str);

    fn exit_cell_edit_mode(&self);

    fn offer_completion(&self, matches: &[String], cursor_start: u32, cursor_end: u32);

    /// Pick one of several installed kernels; `None` abandons the start.
    fn choose_kernel(&self, candidates: &[KernelChoice]) -> Option<String>;
}

/// A notebook editing session: one document, one kernel, and the routing of
/// kernel events into the document.
pub struct NotebookSession {
    client: Arc<JupyterClient>,
    services: Arc<dyn FrontendServices>,
    notebook: Arc<Mutex<Notebook>>,
    notebook_listeners: Arc<Listeners<NotebookEvent>>,
    kernel_display_name: String,
    interrupted: AtomicBool,
}

impl NotebookSession {
    /// Discover kernels, let the user pick one when there are several, and
    /// start it with an empty notebook.
    pub fn start(services: Arc<dyn FrontendServices>, options: ClientOptions) -> crate::Result<Self> {
        let manager = KernelManager::discover(options.clone())?;
        let Some(name) = choose_kernel(manager.kernel_specs(), services.as_ref()) else {
            return Err(crate::anyhow!("No kernel selected"));
        };
        Self::start_with(manager, &name, services, options)
    }

    /// Start the named kernel through an existing manager.
    pub fn start_with(
        manager: KernelManager,
        kernel_name: &str,
        services: Arc<dyn FrontendServices>,
        options: ClientOptions,
    ) -> crate::Result<Self> {
        let session = Self::new(services, options);
        session.client.start_with(manager, kernel_name)?;
        session.connected()
    }

    /// Work against a kernel someone else launched.
    pub fn attach(
        connection_file: &Path,
        services: Arc<dyn FrontendServices>,
        options: ClientOptions,
    ) -> crate::Result<Self> {
        let session = Self::new(services, options);
        session.client.connect(connection_file)?;
        session.connected()
    }

    fn new(services: Arc<dyn FrontendServices>, options: ClientOptions) -> Self {
        let client = Arc::new(JupyterClient::new(options));
        let notebook = Arc::new(Mutex::new(Notebook::default()));

        {
            let notebook = Arc::clone(&notebook);
            let services = Arc::clone(&services);
            client
                .listeners()
                .output
                .add(move |msg| route_output(&notebook, services.as_ref(), msg));
        }

        {
            // Weak, since the client owns its listeners
            let weak = Arc::downgrade(&client);
            let services = Arc::clone(&services);
            client
                .listeners()
                .input_request
                .add(move |request| answer_input_request(&weak, services.as_ref(), request));
        }

        Self {
            client,
            services,
            notebook,
            notebook_listeners: Arc::new(Listeners::new()),
            kernel_display_name: String::new(),
            interrupted: AtomicBool::new(false),
        }
    }

    fn connected(mut self) -> crate::Result<Self> {
        self.kernel_display_name = match self.client.kernel_spec() {
            Some(spec) => spec.display_name,
            None => self
                .client
                .kernel_info()
                .map(|info| info.implementation)
                .unwrap_or_default(),
        };
        info!("Notebook session started with '{}'", self.kernel_display_name);
        self.replace_notebook(self.blank_notebook());
        Ok(self)
    }

    pub fn client(&self) -> &JupyterClient {
        &self.client
    }

    pub fn kernel_display_name(&self) -> &str {
        &self.kernel_display_name
    }

    /// Listen to mutations of the current notebook, including notebooks
    /// opened later. Listeners run while the notebook is locked and must not
    /// call back into the session.
    pub fn on_notebook_event<F>(&self, listener: F)
    where
        F: Fn(&NotebookEvent) + Send + Sync + 'static,
    {
        self.notebook_listeners.add(listener);
    }

    /// Exclusive access to the current notebook. Kernel events wait while
    /// the guard is held.
    pub fn notebook(&self) -> MutexGuard<'_, Notebook> {
        lock(&self.notebook)
    }

    fn blank_notebook(&self) -> Notebook {
        let language = self
            .client
            .kernel_info()
            .map(|info: KernelInfoReply| info.language_info)
            .unwrap_or_default();
        Notebook::new(&self.kernel_display_name, &language.name, &language.version)
    }

    fn replace_notebook(&self, notebook: Notebook) {
        let listeners = Arc::clone(&self.notebook_listeners);
        notebook.on_event(move |event| listeners.notify(event));
        *self.notebook() = notebook;
    }

    /// Add a code cell from the input area and run it.
    pub fn insert_code(&self) -> crate::Result<Option<CellId>> {
        let code = self.services.pending_input_text();
        if code.is_empty() {
            return Ok(None);
        }
        let id = self.notebook().add_code(&code);
        self.run_cell(id)?;
        Ok(Some(id))
    }

    /// Add a markdown cell from the input area.
    pub fn insert_markdown(&self) -> Option<CellId> {
        let text = self.services.pending_input_text();
        if text.is_empty() {
            return None;
        }
        Some(self.notebook().add_markdown(&text))
    }

    /// Clear a code cell's outputs and send its source for execution.
    pub fn run_cell(&self, id: CellId) -> crate::Result<()> {
        let (code, tag) = {
            let mut notebook = self.notebook();
            let tag = notebook.pending_tag(id)?;
            notebook.begin_execution(id)?;
            notebook.clear_outputs(id)?;
            let code = match notebook.cell(id) {
                Some(cell) => cell.source().to_string(),
                None => return Err(Error::UnknownCell(id)),
            };
            (code, tag)
        };

        // The reply may arrive before `execute_tagged` returns; the tag has
        // recorded the request id by then.
        self.client.execute_tagged(&code, &tag)?;
        Ok(())
    }

    /// Ask for a script file and run it through `%run` in a new code cell,
    /// placed after `after` or at the end.
    pub fn run_script(&self, after: Option<CellId>) -> crate::Result<Option<CellId>> {
        let Some(path) = self.services.pick_script_file() else {
            return Ok(None);
        };
        let source = format!("%run \"{}\"", path.display());

        let id = {
            let mut notebook = self.notebook();
            let index = match after {
                Some(after) => match notebook.position(after) {
                    Some(position) => position + 1,
                    None => return Err(Error::UnknownCell(after)),
                },
                None => notebook.len(),
            };
            notebook.insert_cell(index, CellKind::Code, &source)
        };

        self.run_cell(id)?;
        Ok(Some(id))
    }

    /// Run every code cell in order, until an interrupt.
    pub fn run_all(&self) -> crate::Result<()> {
        self.interrupted.store(false, Ordering::Release);

        let cells: Vec<CellId> = self
            .notebook()
            .cells()
            .iter()
            .filter(|cell| cell.kind() == CellKind::Code)
            .map(|cell| cell.id())
            .collect();

        for id in cells {
            if self.interrupted.load(Ordering::Acquire) {
                debug!("Run all stopped by interrupt before {id}");
                break;
            }
            self.run_cell(id)?;
        }
        Ok(())
    }

    pub fn interrupt(&self) -> crate::Result<()> {
        self.interrupted.store(true, Ordering::Release);
        self.client.interrupt()
    }

    /// Ask the kernel to complete the text in the input area. Matches are
    /// offered when the reply arrives.
    pub fn complete_code(&self) -> crate::Result<()> {
        let code = self.services.pending_input_text();
        let cursor_pos = code.chars().count() as u32;
        self.client.complete(&code, cursor_pos)?;
        Ok(())
    }

    pub fn begin_edit(&self, id: CellId) -> crate::Result<()> {
        let source = match self.notebook().cell(id) {
            Some(cell) => cell.source().to_string(),
            None => return Err(Error::UnknownCell(id)),
        };
        self.services.enter_cell_edit_mode(&source);
        Ok(())
    }

    /// Take the edited source from the input area; code cells are run again.
    pub fn complete_edit(&self, id: CellId) -> crate::Result<()> {
        let source = self.services.pending_input_text();
        let kind = {
            let mut notebook = self.notebook();
            notebook.update_cell_source(id, &source)?;
            notebook.cell(id).map(|cell| cell.kind())
        };
        self.services.exit_cell_edit_mode();

        if kind == Some(CellKind::Code) {
            self.run_cell(id)?;
        }
        Ok(())
    }

    pub fn cancel_edit(&self) {
        self.services.exit_cell_edit_mode();
    }

    pub fn delete_cell(&self, id: CellId) -> crate::Result<()> {
        self.notebook().delete_cell(id)
    }

    pub fn delete_output(&self, id: CellId, index: usize) -> crate::Result<()> {
        self.notebook().delete_output(id, Some(index))
    }

    pub fn move_cell_up(&self, id: CellId) -> crate::Result<()> {
        self.notebook().move_cell(id, -1)
    }

    pub fn move_cell_down(&self, id: CellId) -> crate::Result<()> {
        self.notebook().move_cell(id, 1)
    }

    /// The cell as nbformat JSON, for the clipboard
    pub fn copy_cell(&self, id: CellId) -> crate::Result<String> {
        self.notebook().cell_to_json(id)
    }

    /// Copy the cell for the clipboard, then remove it.
    pub fn cut_cell(&self, id: CellId) -> crate::Result<String> {
        let mut notebook = self.notebook();
        let json = notebook.cell_to_json(id)?;
        notebook.delete_cell(id)?;
        Ok(json)
    }

    /// Paste clipboard text: a copied cell is inserted after `after` (or at
    /// the end), anything else goes to the input area.
    pub fn paste(&self, text: &str, after: Option<CellId>) -> Option<CellId> {
        let mut notebook = self.notebook();
        let index = after
            .and_then(|id| notebook.position(id))
            .map(|position| position + 1);

        let pasted = notebook.add_cell_from_json(index, text);
        drop(notebook);

        match pasted {
            Ok(id) => Some(id),
            Err(_) => {
                self.services.set_input_text(text);
                None
            },
        }
    }

    /// Save to the notebook's own path, asking for one if it has none.
    /// Returns false when the user declined to pick a file.
    pub fn save(&self) -> crate::Result<bool> {
        let path = self.notebook().path().map(Path::to_path_buf);
        match path {
            Some(path) => {
                self.notebook().save(&path)?;
                Ok(true)
            },
            None => self.save_as(),
        }
    }

    pub fn save_as(&self) -> crate::Result<bool> {
        let Some(path) = self.services.pick_file_save() else {
            return Ok(false);
        };
        self.notebook().save(&path)?;
        Ok(true)
    }

    /// Offer to save unsaved changes. Returns false when the user cancels,
    /// in which case the caller should abandon what it was doing.
    pub fn save_if_required(&self) -> bool {
        let (dirty, title) = {
            let notebook = self.notebook();
            (notebook.is_dirty(), notebook.title())
        };
        if !dirty {
            return true;
        }

        match self.services.ask_save(&title) {
            SaveDecision::Save => match self.save() {
                Ok(saved) => saved,
                Err(err) => {
                    self.services.show_error(&format!("Can't save '{title}': {err}"));
                    false
                },
            },
            SaveDecision::Discard => true,
            SaveDecision::Cancel => false,
        }
    }

    /// Replace the notebook with an empty one.
    pub fn new_notebook(&self) -> bool {
        if !self.save_if_required() {
            return false;
        }
        self.replace_notebook(self.blank_notebook());
        true
    }

    /// Replace the notebook with one read from a file the user picks.
    pub fn open(&self) -> bool {
        if !self.save_if_required() {
            return false;
        }
        let Some(path) = self.services.pick_file_open() else {
            return false;
        };
        self.open_path(&path)
    }

    pub fn open_path(&self, path: &Path) -> bool {
        match Notebook::load(path) {
            Ok(notebook) => {
                self.replace_notebook(notebook);
                true
            },
            Err(err) => {
                self.services.show_error(&err.to_string());
                false
            },
        }
    }

    /// End the session, unless the user cancels saving changes.
    pub fn close(&self) -> bool {
        if !self.save_if_required() {
            return false;
        }
        stdext::log_error!(self.client.shutdown(false));
        true
    }
}

fn answer_input_request(
    client: &Weak<JupyterClient>,
    services: &dyn FrontendServices,
    request: &JupyterMessage<InputRequest>,
) {
    let value = services.ask_string(&request.content.prompt, request.content.password);
    let Some(client) = client.upgrade() else {
        return;
    };
    if let Err(err) = client.send_input_reply(&value) {
        services.show_error(&format!("Can't answer the kernel's prompt: {err}"));
    }
}

/// Apply one output-class message to the notebook, or hand completions to
/// the presentation layer.
fn route_output(notebook: &Mutex<Notebook>, services: &dyn FrontendServices, msg: &Message) {
    if let Message::CompleteReply(reply) = msg {
        let reply = &reply.content;
        services.offer_completion(&reply.matches, reply.cursor_start, reply.cursor_end);
        return;
    }

    match lock(notebook).apply_message(msg) {
        Ok(Some(cell)) => debug!("Applied '{}' to cell {cell}", msg.message_type()),
        Ok(None) => debug!("No cell for '{}'", msg.message_type()),
        Err(err) => services.show_error(&err.to_string()),
    }
}

fn choose_kernel(specs: &KernelSpecList, services: &dyn FrontendServices) -> Option<String> {
    let candidates: Vec<KernelChoice> = specs
        .names()
        .into_iter()
        .map(|(name, display_name)| KernelChoice { name, display_name })
        .collect();

    match candidates.as_slice() {
        [only] => Some(only.name.clone()),
        _ => services.choose_kernel(&candidates),
    }
}

fn lock(notebook: &Mutex<Notebook>) -> MutexGuard<'_, Notebook> {
    match notebook.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
