/*
 * nbformat.rs
 *
 * Copyright (C) 2026 Posit Software, PBC. All rights reserved.
 *
 */

//! On-disk notebook format (nbformat 4). Multiline strings are written as
//! arrays of lines and accepted either as arrays or as plain strings.

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde_json::Map;
use serde_json::Value;
use serde_with::DeserializeAs;
use serde_with::SerializeAs;
use serde_with::serde_as;

use crate::notebook::output::Output;

pub const NBFORMAT: u32 = 4;
pub const NBFORMAT_MINOR: u32 = 2;

/// First minor version that requires every cell to carry an `id`
pub const CELL_ID_MINOR: u32 = 5;

/// Split text into lines that keep their terminators, so that joining them
/// gives back the original text.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(String::from).collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrLines {
    One(String),
    Lines(Vec<String>),
}

/// A string stored as an array of lines
pub struct MultilineString;

impl SerializeAs<String> for MultilineString {
    fn serialize_as<S>(source: &String, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        split_lines(source).serialize(serializer)
    }
}

impl<'de> DeserializeAs<'de, String> for MultilineString {
    fn deserialize_as<D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match OneOrLines::deserialize(deserializer)? {
            OneOrLines::One(text) => text,
            OneOrLines::Lines(lines) => lines.concat(),
        })
    }
}

/// A MIME bundle whose textual representations are stored as arrays of
/// lines. JSON representations are stored as they are.
pub struct MimeBundle;

fn is_json_mime_type(mime_type: &str) -> bool {
    mime_type == "application/json" || mime_type.ends_with("+json")
}

impl SerializeAs<Map<String, Value>> for MimeBundle {
    fn serialize_as<S>(source: &Map<String, Value>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bundle: Map<String, Value> = source
            .iter()
            .map(|(mime_type, value)| {
                let value = match value {
                    Value::String(text) if !is_json_mime_type(mime_type) => Value::Array(
                        split_lines(text).into_iter().map(Value::String).collect(),
                    ),
                    other => other.clone(),
                };
                (mime_type.clone(), value)
            })
            .collect();
        bundle.serialize(serializer)
    }
}

impl<'de> DeserializeAs<'de, Map<String, Value>> for MimeBundle {
    fn deserialize_as<D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bundle = Map::<String, Value>::deserialize(deserializer)?;
        Ok(bundle
            .into_iter()
            .map(|(mime_type, value)| {
                let value = match value {
                    Value::Array(lines) if !is_json_mime_type(&mime_type) => {
                        join_lines(lines)
                    },
                    other => other,
                };
                (mime_type, value)
            })
            .collect())
    }
}

fn join_lines(lines: Vec<Value>) -> Value {
    let mut text = String::new();
    for line in &lines {
        match line {
            Value::String(line) => text.push_str(line),
            _ => return Value::Array(lines),
        }
    }
    Value::String(text)
}

/// A cell as stored on disk
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "snake_case")]
pub enum CellRecord {
    Code {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        metadata: Map<String, Value>,
        #[serde_as(as = "MultilineString")]
        source: String,
        execution_count: Option<u32>,
        #[serde(default)]
        outputs: Vec<Output>,
    },
    Markdown {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        metadata: Map<String, Value>,
        #[serde_as(as = "MultilineString")]
        source: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attachments: Option<Value>,
    },
    Raw {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        metadata: Map<String, Value>,
        #[serde_as(as = "MultilineString")]
        source: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attachments: Option<Value>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelInfoMetadata {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageInfoMetadata {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Notebook level metadata. Keys we don't model are kept as they are.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotebookMetadata {
    pub kernel_info: Option<KernelInfoMetadata>,
    pub language_info: Option<LanguageInfoMetadata>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// The whole notebook file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotebookFile {
    #[serde(default)]
    pub metadata: NotebookMetadata,
    pub nbformat: u32,
    pub nbformat_minor: u32,
    pub cells: Vec<CellRecord>,
}
