/*
 * notebook_session.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use assert_matches::assert_matches;
use callisto::fixtures::dummy_kernel::DummyKernel;
use callisto::frontend::FrontendServices;
use callisto::frontend::KernelChoice;
use callisto::frontend::NotebookSession;
use callisto::frontend::SaveDecision;
use callisto::notebook::CellState;
use callisto::notebook::NotebookEvent;
use callisto::notebook::Output;
use callisto::options::ClientOptions;
use callisto::socket::channel::Channel;
use callisto::wire::control::ShutdownReply;
use callisto::wire::iopub::ExecuteInput;
use callisto::wire::iopub::ExecuteResult;
use callisto::wire::jupyter_message::Message;
use callisto::wire::jupyter_message::Status;
use callisto::wire::shell::CompleteReply;
use callisto::wire::shell::ExecuteReply;
use callisto::wire::status::ExecutionState;
use serde_json::json;

/// Scripted answers for the presentation layer, with a log of what the
/// session asked
#[derive(Default)]
struct FakeServices {
    input_text: Mutex<String>,
    save_decision: Mutex<Option<SaveDecision>>,
    save_path: Mutex<Option<PathBuf>>,
    script_path: Mutex<Option<PathBuf>>,
    errors: Mutex<Vec<String>>,
    completions: Mutex<Vec<(Vec<String>, u32, u32)>>,
    prompts: Mutex<Vec<(String, bool)>>,
}

impl FrontendServices for FakeServices {
    fn show_error(&self, message: &str) {
        self.errors.lock().unwrap().push(String::from(message));
    }

    fn ask_save(&self, _document_title: &str) -> SaveDecision {
        self.save_decision.lock().unwrap().unwrap_or(SaveDecision::Cancel)
    }

    fn ask_string(&self, prompt: &str, secret: bool) -> String {
        self.prompts.lock().unwrap().push((String::from(prompt), secret));
        String::from("hunter2")
    }

    fn pick_file_open(&self) -> Option<PathBuf> {
        None
    }

    fn pick_file_save(&self) -> Option<PathBuf> {
        self.save_path.lock().unwrap().clone()
    }

    fn pick_script_file(&self) -> Option<PathBuf> {
        self.script_path.lock().unwrap().clone()
    }

    fn pending_input_text(&self) -> String {
        self.input_text.lock().unwrap().clone()
    }

    fn set_input_text(&self, text: &str) {
        *self.input_text.lock().unwrap() = String::from(text);
    }

    fn enter_cell_edit_mode(&self, _source: &str) {}

    fn exit_cell_edit_mode(&self) {}

    fn offer_completion(&self, matches: &[String], cursor_start: u32, cursor_end: u32) {
        self.completions
            .lock()
            .unwrap()
            .push((matches.to_vec(), cursor_start, cursor_end));
    }

    fn choose_kernel(&self, candidates: &[KernelChoice]) -> Option<String> {
        candidates.first().map(|choice| choice.name.clone())
    }
}

fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "Timed out waiting for condition");
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn test_session_runs_code_and_saves_notebook() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let connection_path = dir.path().join("kernel-session.json");
    let notebook_path = dir.path().join("analysis.ipynb");

    let kernel = DummyKernel::new();
    kernel.write_connection_file(&connection_path);

    let kernel = stdext::spawn!("dummy-kernel", move || {
        kernel.serve_kernel_info();

        let request = kernel.recv_execute_request();
        assert_eq!(request.content.code, "name = input('Who? ')\n40 + 2");
        kernel.publish_status(&request, ExecutionState::Busy);
        kernel.publish(&request, ExecuteInput {
            code: request.content.code.clone(),
            execution_count: 1,
        });

        kernel.send_input_request(&request, "Who? ", true);
        let reply = assert_matches!(kernel.recv_stdin(), Message::InputReply(reply) => reply);
        assert_eq!(reply.content.value, "hunter2");

        let mut data = serde_json::Map::new();
        data.insert(String::from("text/plain"), json!("42"));
        kernel.publish(&request, ExecuteResult {
            data,
            execution_count: 1,
            metadata: json!({}),
        });
        kernel.publish_status(&request, ExecutionState::Idle);
        kernel.reply(Channel::Shell, &request, ExecuteReply {
            status: Status::Ok,
            execution_count: 1,
            ename: None,
            evalue: None,
        });

        let request = assert_matches!(kernel.recv_shell(), Message::CompleteRequest(request) => request);
        assert_eq!(request.content.cursor_pos, 3);
        kernel.reply(Channel::Shell, &request, CompleteReply {
            matches: vec![String::from("print"), String::from("property")],
            cursor_start: 0,
            cursor_end: 3,
            metadata: json!({}),
            status: Status::Ok,
        });

        let request = assert_matches!(kernel.recv_control(), Message::ShutdownRequest(request) => request);
        kernel.reply(Channel::Control, &request, ShutdownReply {
            status: Status::Ok,
            restart: false,
        });
    });

    let services = Arc::new(FakeServices::default());
    let session =
        NotebookSession::attach(&connection_path, services.clone(), ClientOptions::default()).unwrap();
    assert_eq!(session.kernel_display_name(), "dummy");
    assert_eq!(session.notebook().title(), "Untitled");
    assert_eq!(
        session.notebook().metadata().language_info.as_ref().unwrap().name,
        "python"
    );

    let events = Arc::new(Mutex::new(Vec::new()));
    {
        let events = events.clone();
        session.on_notebook_event(move |event| events.lock().unwrap().push(event.clone()));
    }

    services.set_input_text("name = input('Who? ')\n40 + 2");
    let cell = session.insert_code().unwrap().unwrap();

    // The shell reply may overtake the result on IOPub
    wait_until(|| {
        let notebook = session.notebook();
        let cell = notebook.cell(cell).unwrap();
        cell.state() == Some(CellState::Completed) && cell.outputs().len() == 1
    });

    {
        let notebook = session.notebook();
        let cell = notebook.cell(cell).unwrap();
        assert_eq!(cell.execution_count(), Some(1));
        assert_matches!(cell.outputs(), [Output::ExecuteResult { execution_count, data, .. }] => {
            assert_eq!(*execution_count, Some(1));
            assert_eq!(data["text/plain"], json!("42"));
        });
    }
    assert_eq!(*services.prompts.lock().unwrap(), vec![(String::from("Who? "), true)]);
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|event| matches!(event, NotebookEvent::InsertedOutput { index: 0, .. })));

    services.set_input_text("pro");
    session.complete_code().unwrap();
    wait_until(|| !services.completions.lock().unwrap().is_empty());
    assert_eq!(services.completions.lock().unwrap()[0], (
        vec![String::from("print"), String::from("property")],
        0,
        3
    ));

    // Declining to pick a file keeps the notebook dirty
    *services.save_decision.lock().unwrap() = Some(SaveDecision::Save);
    assert!(!session.save_if_required());
    assert!(session.notebook().is_dirty());

    *services.save_path.lock().unwrap() = Some(notebook_path.clone());
    assert!(session.save_if_required());
    assert!(!session.notebook().is_dirty());
    assert_eq!(session.notebook().title(), "analysis.ipynb");
    assert!(notebook_path.exists());

    assert!(session.close());
    assert!(!session.client().is_connected());
    assert!(services.errors.lock().unwrap().is_empty());

    kernel.join().unwrap();
}

#[test]
fn test_session_paste_falls_back_to_input_area() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let connection_path = dir.path().join("kernel-paste.json");

    let kernel = DummyKernel::new();
    kernel.write_connection_file(&connection_path);
    let kernel = stdext::spawn!("dummy-kernel", move || {
        kernel.serve_kernel_info();
    });

    let services = Arc::new(FakeServices::default());
    let session =
        NotebookSession::attach(&connection_path, services.clone(), ClientOptions::default()).unwrap();
    kernel.join().unwrap();

    let first = session.notebook().add_markdown("# Title");
    let copied = session.copy_cell(first).unwrap();

    let pasted = session.paste(&copied, Some(first)).unwrap();
    assert_eq!(session.notebook().position(pasted), Some(1));
    assert_eq!(session.notebook().cell(pasted).unwrap().source(), "# Title");

    assert_eq!(session.paste("plain text", None), None);
    assert_eq!(services.pending_input_text(), "plain text");
    assert_eq!(session.notebook().len(), 2);

    let code = session.notebook().add_code("x = 1");
    let clipboard = session.cut_cell(code).unwrap();
    assert_eq!(session.notebook().len(), 2);
    assert_eq!(session.notebook().position(code), None);
    assert_matches!(session.cut_cell(code), Err(callisto::Error::UnknownCell(_)));

    let restored = session.paste(&clipboard, None).unwrap();
    assert_eq!(session.notebook().position(restored), Some(2));
    assert_eq!(session.notebook().cell(restored).unwrap().source(), "x = 1");
}

#[test]
fn test_session_runs_picked_script_in_new_cell() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let connection_path = dir.path().join("kernel-script.json");
    let script_path = dir.path().join("setup.py");
    let expected = format!("%run \"{}\"", script_path.display());

    let kernel = DummyKernel::new();
    kernel.write_connection_file(&connection_path);
    let kernel = {
        let expected = expected.clone();
        stdext::spawn!("dummy-kernel", move || {
            kernel.serve_kernel_info();

            let request = kernel.recv_execute_request();
            assert_eq!(request.content.code, expected);
            kernel.reply(Channel::Shell, &request, ExecuteReply {
                status: Status::Ok,
                execution_count: 1,
                ename: None,
                evalue: None,
            });
        })
    };

    let services = Arc::new(FakeServices::default());
    let session =
        NotebookSession::attach(&connection_path, services.clone(), ClientOptions::default()).unwrap();

    let first = session.notebook().add_markdown("# Setup");
    let last = session.notebook().add_markdown("# Results");

    // Cancelling the picker adds nothing
    assert_eq!(session.run_script(Some(first)).unwrap(), None);
    assert_eq!(session.notebook().len(), 2);

    *services.script_path.lock().unwrap() = Some(script_path.clone());
    let cell = session.run_script(Some(first)).unwrap().unwrap();

    {
        let notebook = session.notebook();
        assert_eq!(notebook.position(cell), Some(1));
        assert_eq!(notebook.position(last), Some(2));
        assert_eq!(notebook.cell(cell).unwrap().source(), expected);
    }

    wait_until(|| session.notebook().cell(cell).unwrap().state() == Some(CellState::Completed));
    assert_eq!(session.notebook().cell(cell).unwrap().execution_count(), Some(1));

    kernel.join().unwrap();
}
