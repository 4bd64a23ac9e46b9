/*
 * output.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_with::serde_as;

use crate::error::Error;
use crate::notebook::nbformat::MimeBundle;
use crate::notebook::nbformat::MultilineString;
use crate::wire::iopub::Stream;
use crate::wire::jupyter_message::Message;

/// One recorded output of a code cell, in its nbformat shape.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    Stream {
        name: Stream,
        #[serde_as(as = "MultilineString")]
        text: String,
    },
    DisplayData {
        #[serde_as(as = "MimeBundle")]
        data: Map<String, Value>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    ExecuteResult {
        execution_count: Option<u32>,
        #[serde_as(as = "MimeBundle")]
        data: Map<String, Value>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    Error {
        ename: String,
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

impl Output {
    /// Convert an output-bearing kernel message into a cell output.
    pub fn from_message(msg: &Message) -> crate::Result<Self> {
        match msg {
            Message::Stream(msg) => Ok(Output::Stream {
                name: msg.content.name,
                text: msg.content.text.clone(),
            }),
            Message::DisplayData(msg) => Ok(Output::DisplayData {
                data: msg.content.data.clone(),
                metadata: as_map(&msg.content.metadata),
            }),
            Message::ExecuteResult(msg) => Ok(Output::ExecuteResult {
                execution_count: Some(msg.content.execution_count),
                data: msg.content.data.clone(),
                metadata: as_map(&msg.content.metadata),
            }),
            Message::ExecuteError(msg) => Ok(Output::Error {
                ename: msg.content.exception.ename.clone(),
                evalue: msg.content.exception.evalue.clone(),
                traceback: msg.content.exception.traceback.clone(),
            }),
            other => Err(Error::UnexpectedOutputMessage(String::from(
                other.message_type(),
            ))),
        }
    }

    /// Whether a message of this type produces a cell output
    pub fn is_output_message(msg: &Message) -> bool {
        matches!(
            msg,
            Message::Stream(_) |
                Message::DisplayData(_) |
                Message::ExecuteResult(_) |
                Message::ExecuteError(_)
        )
    }

    /// Plain text rendering, when the output has one
    pub fn text(&self) -> Option<String> {
        match self {
            Output::Stream { text, .. } => Some(text.clone()),
            Output::DisplayData { data, .. } | Output::ExecuteResult { data, .. } => {
                data.get("text/plain").and_then(|value| match value {
                    Value::String(text) => Some(text.clone()),
                    _ => None,
                })
            },
            Output::Error { ename, evalue, .. } => Some(format!("{ename}: {evalue}")),
        }
    }
}

fn as_map(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use crate::session::Session;
    use crate::wire::iopub::ExecuteResult;
    use crate::wire::iopub::StreamOutput;
    use crate::wire::shell::KernelInfoRequest;
    use super::*;

    #[test]
    fn test_from_stream_message() {
        let session = Session::create("k", "u").unwrap();
        let msg = Message::Stream(session.build(StreamOutput {
            name: Stream::Stdout,
            text: String::from("hello\n"),
        }));
        assert_eq!(Output::from_message(&msg).unwrap(), Output::Stream {
            name: Stream::Stdout,
            text: String::from("hello\n"),
        });
    }

    #[test]
    fn test_from_result_message() {
        let session = Session::create("k", "u").unwrap();
        let data = json!({"text/plain": "4"}).as_object().unwrap().clone();
        let msg = Message::ExecuteResult(session.build(ExecuteResult {
            data,
            execution_count: 2,
            metadata: Value::Null,
        }));
        let output = Output::from_message(&msg).unwrap();
        assert_eq!(output.text().as_deref(), Some("4"));
        assert_matches!(output, Output::ExecuteResult { execution_count: Some(2), .. });
    }

    #[test]
    fn test_non_output_message() {
        let session = Session::create("k", "u").unwrap();
        let msg = Message::KernelInfoRequest(session.build(KernelInfoRequest {}));
        assert_matches!(
            Output::from_message(&msg),
            Err(Error::UnexpectedOutputMessage(kind)) if kind == "kernel_info_request"
        );
    }

    #[test]
    fn test_nbformat_shape() {
        let output = Output::Stream {
            name: Stream::Stderr,
            text: String::from("a\nb"),
        };
        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            json!({"output_type": "stream", "name": "stderr", "text": ["a\n", "b"]})
        );

        let parsed: Output = serde_json::from_value(json!({
            "output_type": "display_data",
            "data": {"text/plain": ["x\n", "y"], "application/json": {"a": 1}},
            "metadata": {}
        }))
        .unwrap();
        assert_matches!(parsed, Output::DisplayData { data, .. } => {
            assert_eq!(data["text/plain"], json!("x\ny"));
            assert_eq!(data["application/json"], json!({"a": 1}));
        });
    }
}
