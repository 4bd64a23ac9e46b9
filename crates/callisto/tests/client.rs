/*
 * client.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use assert_matches::assert_matches;
use callisto::client::BlockingClient;
use callisto::client::JupyterClient;
use callisto::fixtures::dummy_kernel::DummyKernel;
use callisto::notebook::CellState;
use callisto::notebook::Notebook;
use callisto::options::ClientOptions;
use callisto::socket::channel::Channel;
use callisto::wire::control::InterruptReply;
use callisto::wire::control::ShutdownReply;
use callisto::wire::iopub::ExecuteInput;
use callisto::wire::iopub::Stream;
use callisto::wire::iopub::StreamOutput;
use callisto::wire::jupyter_message::Message;
use callisto::wire::jupyter_message::Status;
use callisto::wire::shell::CompleteReply;
use callisto::wire::shell::ExecuteReply;
use callisto::wire::shell::InspectReply;
use callisto::wire::shell::IsComplete;
use callisto::wire::shell::IsCompleteReply;
use callisto::wire::status::ExecutionState;
use callisto::wire::wire_message::MSG_DELIM;
use crossbeam::channel::bounded;
use crossbeam::channel::unbounded;
use serde_json::json;
use tempfile::TempDir;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Bind a dummy kernel, write its connection file and hand the kernel to a
/// thread running `script`.
fn spawn_kernel<F>(script: F) -> (TempDir, std::path::PathBuf, std::thread::JoinHandle<()>)
where
    F: FnOnce(DummyKernel) + Send + 'static,
{
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kernel-test.json");

    let kernel = DummyKernel::new();
    kernel.write_connection_file(&path);

    let handle = stdext::spawn!("dummy-kernel", move || script(kernel));
    (dir, path, handle)
}

fn ok_reply(execution_count: u32) -> ExecuteReply {
    ExecuteReply {
        status: Status::Ok,
        execution_count,
        ename: None,
        evalue: None,
    }
}

fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = Instant::now() + EVENT_TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "Timed out waiting for condition");
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn test_async_client_delivers_status_output_and_reply() {
    init_logging();

    let (_dir, path, kernel) = spawn_kernel(|kernel| {
        kernel.serve_kernel_info();

        let request = kernel.recv_execute_request();
        assert_eq!(request.content.code, "print('hello')");

        kernel.publish_status(&request, ExecutionState::Busy);
        kernel.publish(&request, StreamOutput {
            name: Stream::Stdout,
            text: String::from("hello\n"),
        });
        kernel.publish_status(&request, ExecutionState::Idle);
        kernel.reply(Channel::Shell, &request, ok_reply(1));
    });

    let client = JupyterClient::new(ClientOptions::default());

    let connected = Arc::new(Mutex::new(None));
    {
        let connected = connected.clone();
        client
            .listeners()
            .connected
            .add(move |info| *connected.lock().unwrap() = Some(info.implementation.clone()));
    }

    let (output_tx, output_rx) = unbounded();
    client.listeners().output.add(move |msg: &Message| {
        output_tx.send(msg.clone()).unwrap();
    });

    client.connect(&path).unwrap();
    assert!(client.is_connected());
    assert_eq!(connected.lock().unwrap().as_deref(), Some("dummy"));
    assert_eq!(client.kernel_info().unwrap().language_info.name, "python");

    let msg_id = client.execute("print('hello')").unwrap();

    // IOPub and Shell are not ordered relative to each other
    let mut received: Vec<Message> = (0..2)
        .map(|_| output_rx.recv_timeout(EVENT_TIMEOUT).unwrap())
        .collect();
    received.sort_by_key(|msg| msg.message_type().to_string());

    assert_matches!(&received[0], Message::ExecuteReply(reply) => {
        assert_eq!(reply.content.execution_count, 1);
        assert!(reply.is_reply_to(&msg_id));
    });
    assert_matches!(&received[1], Message::Stream(stream) => {
        assert_eq!(stream.content.text, "hello\n");
        assert!(stream.is_reply_to(&msg_id));
    });

    wait_until(|| client.state() == ExecutionState::Idle);
    kernel.join().unwrap();
}

#[test]
fn test_malformed_frame_does_not_stop_the_monitor() {
    init_logging();

    let (_dir, path, kernel) = spawn_kernel(|kernel| {
        kernel.serve_kernel_info();

        let request = kernel.recv_execute_request();
        kernel.send_raw_shell(&request, &[MSG_DELIM, b"".as_slice(), b"{}".as_slice()]);
        kernel.reply(Channel::Shell, &request, ok_reply(7));
    });

    let client = JupyterClient::new(ClientOptions::default());
    let (output_tx, output_rx) = unbounded();
    client.listeners().output.add(move |msg: &Message| {
        output_tx.send(msg.clone()).unwrap();
    });

    client.connect(&path).unwrap();
    let msg_id = client.execute("1").unwrap();

    let reply = output_rx.recv_timeout(EVENT_TIMEOUT).unwrap();
    assert_matches!(reply, Message::ExecuteReply(reply) => {
        assert_eq!(reply.content.execution_count, 7);
        assert!(reply.is_reply_to(&msg_id));
    });

    kernel.join().unwrap();
}

#[test]
fn test_replies_in_reverse_order_reach_their_cells() {
    init_logging();

    let (_dir, path, kernel) = spawn_kernel(|kernel| {
        kernel.serve_kernel_info();

        let first = kernel.recv_execute_request();
        let second = kernel.recv_execute_request();

        kernel.publish(&second, ExecuteInput {
            code: second.content.code.clone(),
            execution_count: 2,
        });
        kernel.reply(Channel::Shell, &second, ExecuteReply {
            status: Status::Error,
            execution_count: 2,
            ename: Some(String::from("NameError")),
            evalue: Some(String::from("name 'y' is not defined")),
        });
        kernel.reply(Channel::Shell, &first, ok_reply(1));
    });

    let notebook = Arc::new(Mutex::new(Notebook::new("Dummy", "python", "3.12.0")));
    let (a, b) = {
        let mut notebook = notebook.lock().unwrap();
        (notebook.add_code("x = 1"), notebook.add_code("y"))
    };

    let client = JupyterClient::new(ClientOptions::default());
    {
        let notebook = notebook.clone();
        client.listeners().output.add(move |msg: &Message| {
            notebook.lock().unwrap().apply_message(msg).unwrap();
        });
    }
    client.connect(&path).unwrap();

    for cell in [a, b] {
        let (code, tag) = {
            let mut notebook = notebook.lock().unwrap();
            notebook.begin_execution(cell).unwrap();
            let code = notebook.cell(cell).unwrap().source().to_string();
            (code, notebook.pending_tag(cell).unwrap())
        };
        client.execute_tagged(&code, &tag).unwrap();
    }

    wait_until(|| {
        let notebook = notebook.lock().unwrap();
        notebook.cell(a).unwrap().state() == Some(CellState::Completed) &&
            notebook.cell(b).unwrap().state() == Some(CellState::Error)
    });

    let notebook = notebook.lock().unwrap();
    assert_eq!(notebook.cell(a).unwrap().execution_count(), Some(1));
    assert_eq!(notebook.cell(b).unwrap().execution_count(), Some(2));
    assert!(notebook.pending_message_id(a).is_some());
    assert_ne!(notebook.pending_message_id(a), notebook.pending_message_id(b));

    kernel.join().unwrap();
}

#[test]
fn test_input_request_is_answered_on_stdin() {
    init_logging();

    let (_dir, path, kernel) = spawn_kernel(|kernel| {
        kernel.serve_kernel_info();

        let request = kernel.recv_execute_request();
        kernel.send_input_request(&request, "Name: ", false);

        let reply = assert_matches!(kernel.recv_stdin(), Message::InputReply(reply) => reply);
        assert_eq!(reply.content.value, "Ada");
        kernel.reply(Channel::Shell, &request, ok_reply(1));
    });

    let client = JupyterClient::new(ClientOptions::default());
    client.connect(&path).unwrap();

    let replier = client.input_replier().unwrap();
    let (prompt_tx, prompt_rx) = unbounded();
    client.listeners().input_request.add(move |request| {
        prompt_tx.send(request.content.prompt.clone()).unwrap();
        replier.reply("Ada").unwrap();
    });

    client.execute("input('Name: ')").unwrap();
    assert_eq!(prompt_rx.recv_timeout(EVENT_TIMEOUT).unwrap(), "Name: ");

    kernel.join().unwrap();
}

#[test]
fn test_shutdown_stops_monitor_before_request() {
    init_logging();

    let (_dir, path, kernel) = spawn_kernel(|kernel| {
        kernel.serve_kernel_info();

        let request = assert_matches!(kernel.recv_control(), Message::ShutdownRequest(request) => request);
        assert!(!request.content.restart);
        kernel.reply(Channel::Control, &request, ShutdownReply {
            status: Status::Ok,
            restart: false,
        });
    });

    let client = JupyterClient::new(ClientOptions::default());
    let notified = Arc::new(Mutex::new(0));
    {
        let notified = notified.clone();
        client
            .listeners()
            .shutdown
            .add(move |_| *notified.lock().unwrap() += 1);
    }

    client.connect(&path).unwrap();
    client.shutdown(false).unwrap();

    assert_eq!(*notified.lock().unwrap(), 1);
    assert!(!client.is_connected());
    assert_matches!(client.execute("1"), Err(callisto::Error::NotConnected));

    kernel.join().unwrap();
}

#[test]
fn test_blocking_execute_drains_iopub_until_idle() {
    init_logging();

    let (_dir, path, kernel) = spawn_kernel(|kernel| {
        kernel.serve_kernel_info();

        let request = kernel.recv_execute_request();
        kernel.publish_status(&request, ExecutionState::Busy);
        kernel.publish(&request, StreamOutput {
            name: Stream::Stderr,
            text: String::from("warning\n"),
        });
        kernel.publish_status(&request, ExecutionState::Idle);
        kernel.reply(Channel::Shell, &request, ok_reply(3));
    });

    let client = BlockingClient::connect(&path, ClientOptions::default()).unwrap();
    assert_eq!(client.kernel_info().implementation, "dummy");

    let streams = Arc::new(Mutex::new(Vec::new()));
    {
        let streams = streams.clone();
        client.listeners().output.add(move |msg: &Message| {
            if let Message::Stream(stream) = msg {
                streams.lock().unwrap().push(stream.content.text.clone());
            }
        });
    }

    let reply = client.execute("import warnings").unwrap();
    assert_eq!(reply.content.status, Status::Ok);
    assert_eq!(reply.content.execution_count, 3);

    // Output was dispatched before the call returned
    assert_eq!(*streams.lock().unwrap(), vec![String::from("warning\n")]);
    assert_eq!(client.state(), ExecutionState::Idle);

    kernel.join().unwrap();
}

#[test]
fn test_blocking_shutdown_returns_reply() {
    init_logging();

    let (_dir, path, kernel) = spawn_kernel(|kernel| {
        kernel.serve_kernel_info();

        let request = assert_matches!(kernel.recv_control(), Message::ShutdownRequest(request) => request);
        kernel.reply(Channel::Control, &request, ShutdownReply {
            status: Status::Ok,
            restart: request.content.restart,
        });
    });

    let client = BlockingClient::connect(&path, ClientOptions::default()).unwrap();
    let reply = client.shutdown(true).unwrap();
    assert!(reply.content.restart);

    kernel.join().unwrap();
}

#[test]
fn test_connect_times_out_without_kernel_info_reply() {
    init_logging();

    let (_dir, path, kernel) = spawn_kernel(|kernel| {
        assert_matches!(kernel.recv_shell(), Message::KernelInfoRequest(_));
    });

    let options = ClientOptions {
        receive_timeout: Duration::from_millis(300),
        ..ClientOptions::default()
    };
    let result = BlockingClient::connect(&path, options);
    assert_matches!(result, Err(callisto::Error::ReceiveTimeout(_, msg_type)) => {
        assert_eq!(msg_type, "kernel_info_request");
    });

    kernel.join().unwrap();
}

#[test]
fn test_aborted_reply_marks_cell_as_failed() {
    init_logging();

    let (_dir, path, kernel) = spawn_kernel(|kernel| {
        kernel.serve_kernel_info();

        let request = kernel.recv_execute_request();
        kernel.reply(Channel::Shell, &request, ExecuteReply {
            status: Status::Aborted,
            execution_count: 0,
            ename: None,
            evalue: None,
        });
    });

    let notebook = Arc::new(Mutex::new(Notebook::new("Dummy", "python", "3.12.0")));
    let cell = notebook.lock().unwrap().add_code("skipped()");

    let client = JupyterClient::new(ClientOptions::default());
    {
        let notebook = notebook.clone();
        client.listeners().output.add(move |msg: &Message| {
            notebook.lock().unwrap().apply_message(msg).unwrap();
        });
    }
    client.connect(&path).unwrap();

    let tag = {
        let mut notebook = notebook.lock().unwrap();
        notebook.begin_execution(cell).unwrap();
        notebook.pending_tag(cell).unwrap()
    };
    client.execute_tagged("skipped()", &tag).unwrap();

    wait_until(|| notebook.lock().unwrap().cell(cell).unwrap().state() == Some(CellState::Error));

    kernel.join().unwrap();
}

#[test]
fn test_blocking_execute_returns_non_ok_status() {
    init_logging();

    let (_dir, path, kernel) = spawn_kernel(|kernel| {
        kernel.serve_kernel_info();

        let request = kernel.recv_execute_request();
        kernel.publish_status(&request, ExecutionState::Busy);
        kernel.publish_status(&request, ExecutionState::Idle);
        kernel.reply(Channel::Shell, &request, ExecuteReply {
            status: Status::Error,
            execution_count: 4,
            ename: Some(String::from("ZeroDivisionError")),
            evalue: Some(String::from("division by zero")),
        });
    });

    let client = BlockingClient::connect(&path, ClientOptions::default()).unwrap();
    let reply = client.execute("1 / 0").unwrap();

    assert_eq!(reply.content.status, Status::Error);
    assert!(!reply.content.status.is_ok());
    assert_eq!(reply.content.execution_count, 4);
    assert_eq!(reply.content.ename.as_deref(), Some("ZeroDivisionError"));
    assert_eq!(reply.content.evalue.as_deref(), Some("division by zero"));

    kernel.join().unwrap();
}

#[test]
fn test_blocking_shell_requests_decode_replies() {
    init_logging();

    let (ids_tx, ids_rx) = unbounded();
    let (_dir, path, kernel) = spawn_kernel(move |kernel| {
        kernel.serve_kernel_info();

        let request = assert_matches!(kernel.recv_shell(), Message::IsCompleteRequest(request) => request);
        assert_eq!(request.content.code, "for i in x:");
        ids_tx.send(request.header.msg_id.clone()).unwrap();
        kernel.reply(Channel::Shell, &request, IsCompleteReply {
            status: IsComplete::Incomplete,
            indent: String::from("    "),
        });

        let request = assert_matches!(kernel.recv_shell(), Message::CompleteRequest(request) => request);
        assert_eq!(request.content.code, "pri");
        assert_eq!(request.content.cursor_pos, 3);
        ids_tx.send(request.header.msg_id.clone()).unwrap();
        kernel.reply(Channel::Shell, &request, CompleteReply {
            matches: vec![String::from("print"), String::from("property")],
            cursor_start: 0,
            cursor_end: 3,
            metadata: json!({}),
            status: Status::Ok,
        });

        let request = assert_matches!(kernel.recv_shell(), Message::InspectRequest(request) => request);
        assert_eq!(request.content.code, "len");
        assert_eq!(request.content.cursor_pos, 2);
        assert_eq!(request.content.detail_level, 1);
        ids_tx.send(request.header.msg_id.clone()).unwrap();

        let mut data = serde_json::Map::new();
        data.insert(String::from("text/plain"), json!("len(obj, /)"));
        kernel.reply(Channel::Shell, &request, InspectReply {
            status: Status::Ok,
            found: true,
            data,
            metadata: json!({}),
        });

        // Non-ok replies still decode; the status is for the caller
        let request = assert_matches!(kernel.recv_shell(), Message::CompleteRequest(request) => request);
        ids_tx.send(request.header.msg_id.clone()).unwrap();
        kernel.reply(Channel::Shell, &request, CompleteReply {
            matches: vec![],
            cursor_start: 0,
            cursor_end: 0,
            metadata: json!({}),
            status: Status::Error,
        });
    });

    let client = BlockingClient::connect(&path, ClientOptions::default()).unwrap();

    let reply = client.is_complete("for i in x:").unwrap();
    assert!(reply.is_reply_to(&ids_rx.recv_timeout(EVENT_TIMEOUT).unwrap()));
    assert_eq!(reply.content.status, IsComplete::Incomplete);
    assert_eq!(reply.content.indent, "    ");

    let reply = client.complete("pri", 3).unwrap();
    assert!(reply.is_reply_to(&ids_rx.recv_timeout(EVENT_TIMEOUT).unwrap()));
    assert_eq!(reply.content.matches, vec!["print", "property"]);
    assert_eq!((reply.content.cursor_start, reply.content.cursor_end), (0, 3));
    assert!(reply.content.status.is_ok());

    let reply = client.inspect("len", 2, 1).unwrap();
    assert!(reply.is_reply_to(&ids_rx.recv_timeout(EVENT_TIMEOUT).unwrap()));
    assert!(reply.content.found);
    assert_eq!(reply.content.data["text/plain"], json!("len(obj, /)"));

    let reply = client.complete("x.", 2).unwrap();
    assert!(reply.is_reply_to(&ids_rx.recv_timeout(EVENT_TIMEOUT).unwrap()));
    assert_eq!(reply.content.status, Status::Error);
    assert!(reply.content.matches.is_empty());

    kernel.join().unwrap();
}

#[test]
fn test_blocking_interrupt_waits_for_control_reply() {
    init_logging();

    let (id_tx, id_rx) = unbounded();
    let (_dir, path, kernel) = spawn_kernel(move |kernel| {
        kernel.serve_kernel_info();

        // Interrupts travel on control, never on shell
        let request = assert_matches!(kernel.recv_control(), Message::InterruptRequest(request) => request);
        assert!(!kernel.socket(Channel::Shell).poll_incoming(0).unwrap());
        id_tx.send(request.header.msg_id.clone()).unwrap();
        kernel.reply(Channel::Control, &request, InterruptReply { status: Status::Ok });
    });

    let client = BlockingClient::connect(&path, ClientOptions::default()).unwrap();
    client.interrupt().unwrap();
    assert!(!id_rx.recv_timeout(EVENT_TIMEOUT).unwrap().is_empty());

    kernel.join().unwrap();
}

#[test]
fn test_async_interrupt_reply_reaches_output_listeners() {
    init_logging();

    let (id_tx, id_rx) = unbounded();
    let (_dir, path, kernel) = spawn_kernel(move |kernel| {
        kernel.serve_kernel_info();

        let request = assert_matches!(kernel.recv_control(), Message::InterruptRequest(request) => request);
        id_tx.send(request.header.msg_id.clone()).unwrap();
        kernel.reply(Channel::Control, &request, InterruptReply { status: Status::Ok });
    });

    let client = JupyterClient::new(ClientOptions::default());
    let (output_tx, output_rx) = unbounded();
    client.listeners().output.add(move |msg: &Message| {
        output_tx.send(msg.clone()).unwrap();
    });

    assert_matches!(client.interrupt(), Err(callisto::Error::NotConnected));
    client.connect(&path).unwrap();
    client.interrupt().unwrap();

    let msg_id = id_rx.recv_timeout(EVENT_TIMEOUT).unwrap();
    let reply = output_rx.recv_timeout(EVENT_TIMEOUT).unwrap();
    assert_matches!(reply, Message::InterruptReply(reply) => {
        assert!(reply.is_reply_to(&msg_id));
        assert!(reply.content.status.is_ok());
    });

    kernel.join().unwrap();
}

#[test]
fn test_shutdown_with_stuck_monitor_sends_nothing() {
    init_logging();

    let (_dir, path, kernel) = spawn_kernel(|kernel| {
        let info = kernel.serve_kernel_info();

        kernel.publish(&info, StreamOutput {
            name: Stream::Stdout,
            text: String::from("block\n"),
        });

        // The client gives up on its monitor and never asks for shutdown
        assert!(!kernel.socket(Channel::Control).poll_incoming(3000).unwrap());
    });

    let options = ClientOptions {
        receive_timeout: Duration::from_millis(300),
        ..ClientOptions::default()
    };
    let client = JupyterClient::new(options);

    let (entered_tx, entered_rx) = bounded(1);
    let (release_tx, release_rx) = bounded::<()>(1);
    client.listeners().output.add(move |msg: &Message| {
        if matches!(msg, Message::Stream(_)) {
            entered_tx.send(()).unwrap();
            let _ = release_rx.recv_timeout(Duration::from_secs(10));
        }
    });

    client.connect(&path).unwrap();
    entered_rx.recv_timeout(EVENT_TIMEOUT).unwrap();

    assert!(client.shutdown(false).is_err());
    assert!(!client.is_connected());
    release_tx.send(()).unwrap();

    kernel.join().unwrap();
}
