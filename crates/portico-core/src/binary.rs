// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Binary payload transport.
//
// Binary data crosses the boundary as a tagged JSON object:
//
//   { "tag": "binary", "data": "<base64>", "mimeType": "image/jpeg",
//     "name": "photo.jpg", "size": 48213 }
//
// Inbound payloads are walked once.  Each tagged sub-object is indexed by its
// JSON pointer as a `BinaryPayload` descriptor; the base64 text is only
// decoded when a handler asks for the bytes.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{BridgeError, Result};

/// Value of the `tag` field marking a binary sub-object.
pub const BINARY_TAG: &str = "binary";

/// MIME type assumed when a tagged object omits `mimeType`.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Standard alphabet; accepts input with or without padding.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A binary blob carried as base64 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryPayload {
    tag: &'static str,
    data: String,
    mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
}

impl BinaryPayload {
    /// Encode raw bytes for sending across the boundary.
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>, name: Option<String>) -> Self {
        Self {
            tag: BINARY_TAG,
            data: BASE64.encode(bytes),
            mime_type: mime_type.into(),
            name,
            size: Some(bytes.len() as u64),
        }
    }

    /// Recognise a tagged object. Anything else is `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if object.get("tag").and_then(Value::as_str) != Some(BINARY_TAG) {
            return None;
        }
        let data = object.get("data")?.as_str()?;
        Some(Self {
            tag: BINARY_TAG,
            data: data.to_owned(),
            mime_type: object
                .get("mimeType")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_MIME_TYPE)
                .to_owned(),
            name: object.get("name").and_then(Value::as_str).map(str::to_owned),
            size: object.get("size").and_then(Value::as_u64),
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Declared size in bytes, if the sender supplied one.
    pub fn declared_size(&self) -> Option<u64> {
        self.size
    }

    /// Length of the base64 text.
    pub fn encoded_len(&self) -> usize {
        self.data.len()
    }

    /// Decode the base64 data.
    ///
    /// Fails if the text is not valid base64 or does not match the declared
    /// size.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        let bytes = BASE64
            .decode(self.data.trim())
            .map_err(|e| BridgeError::Binary(e.to_string()))?;
        match self.size {
            Some(size) if size != bytes.len() as u64 => Err(BridgeError::Binary(format!(
                "declared size {size} but decoded {} bytes",
                bytes.len()
            ))),
            _ => Ok(bytes),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// An inbound payload after transcoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    value: Value,
    binaries: BTreeMap<String, BinaryPayload>,
}

impl Default for Payload {
    fn default() -> Self {
        Self::plain(Value::Object(Map::new()))
    }
}

impl Payload {
    /// Wrap a value without looking for binary sub-objects.
    pub fn plain(value: Value) -> Self {
        Self {
            value,
            binaries: BTreeMap::new(),
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Field lookup on an object payload.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value.get(key)
    }

    /// Deserialize the payload into a typed argument struct.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.value)?)
    }

    /// Binary sub-object at a JSON pointer (`""` for the root, `/photo`,
    /// `/files/0`, ...).
    pub fn binary(&self, pointer: &str) -> Option<&BinaryPayload> {
        self.binaries.get(pointer)
    }

    /// All binary sub-objects, keyed by JSON pointer.
    pub fn binaries(&self) -> impl Iterator<Item = (&str, &BinaryPayload)> {
        self.binaries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn has_binary(&self) -> bool {
        !self.binaries.is_empty()
    }
}

/// Walk an inbound payload and index its binary sub-objects.
///
/// The walk stops descending at `max_depth`; deeper subtrees are kept as-is
/// but not searched.
pub fn transcode(value: Value, max_depth: usize) -> Payload {
    let mut binaries = BTreeMap::new();
    let mut pointer = String::new();
    collect(&value, 0, max_depth, &mut pointer, &mut binaries);
    Payload { value, binaries }
}

fn collect(
    value: &Value,
    depth: usize,
    max_depth: usize,
    pointer: &mut String,
    out: &mut BTreeMap<String, BinaryPayload>,
) {
    if let Some(binary) = BinaryPayload::from_value(value) {
        out.insert(pointer.clone(), binary);
        return;
    }
    let has_children = matches!(value, Value::Array(a) if !a.is_empty())
        || matches!(value, Value::Object(o) if !o.is_empty());
    if !has_children {
        return;
    }
    if depth >= max_depth {
        debug!(pointer = %pointer, max_depth, "payload deeper than transcode limit; not searched");
        return;
    }

    let base_len = pointer.len();
    match value {
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                pointer.push('/');
                pointer.push_str(&index.to_string());
                collect(item, depth + 1, max_depth, pointer, out);
                pointer.truncate(base_len);
            }
        }
        Value::Object(fields) => {
            for (key, item) in fields {
                pointer.push('/');
                push_escaped(pointer, key);
                collect(item, depth + 1, max_depth, pointer, out);
                pointer.truncate(base_len);
            }
        }
        _ => {}
    }
}

/// RFC 6901 escaping of a reference token.
fn push_escaped(pointer: &mut String, key: &str) {
    for ch in key.chars() {
        match ch {
            '~' => pointer.push_str("~0"),
            '/' => pointer.push_str("~1"),
            other => pointer.push(other),
        }
    }
}

/// Whether a value contains a binary tag anywhere within `max_depth`.
pub fn contains_binary(value: &Value, max_depth: usize) -> bool {
    if BinaryPayload::from_value(value).is_some() {
        return true;
    }
    if max_depth == 0 {
        return false;
    }
    match value {
        Value::Array(items) => items.iter().any(|v| contains_binary(v, max_depth - 1)),
        Value::Object(fields) => fields.values().any(|v| contains_binary(v, max_depth - 1)),
        _ => false,
    }
}
