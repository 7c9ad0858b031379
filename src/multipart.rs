//! Flatten a request payload plus an optional file into a multipart body.
//!
//! Every upload endpoint (picture upload, avatar, test upload) goes through
//! [`build_multipart`], so a field is encoded the same way wherever it is
//! sent:
//!
//! | value              | emitted as                                    |
//! |--------------------|-----------------------------------------------|
//! | `Null`             | nothing                                       |
//! | text/number/bool   | one text part                                 |
//! | `Sequence`         | one part per element, same field name         |
//! | `Struct`           | one text part holding the JSON encoding       |
//! | `Binary`           | one file part                                 |
//!
//! The top-level attachment is always emitted first, under `file`.

use std::path::Path;

use serde::Serialize;

use crate::error::{ClientError, Result};

/// Field name the backend reads the uploaded file from.
pub const FILE_FIELD: &str = "file";

/// A named byte payload sent as a file part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
            mime: None,
        }
    }

    /// Set the part's content type (e.g. `image/png`).
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Read a file from disk, using its file name as the part's filename.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(filename, bytes))
    }
}

/// A payload field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent. The field is not transmitted at all.
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Repeated field, one part per element.
    Sequence(Vec<Value>),
    /// Nested object, sent as a single JSON string.
    Struct(Payload),
    Binary(Attachment),
}

impl Value {
    /// JSON form used for nested structs and sequence elements.
    ///
    /// Binary values have no JSON form and encode as `{}`.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        use serde_json::Value as J;
        Ok(match self {
            Value::Null => J::Null,
            Value::Text(s) => J::String(s.clone()),
            Value::Int(i) => J::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(J::Number)
                .ok_or_else(|| {
                    ClientError::Serialization(format!("{} has no JSON representation", f))
                })?,
            Value::Bool(b) => J::Bool(*b),
            Value::Sequence(items) => J::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Struct(fields) => {
                let mut map = serde_json::Map::new();
                for (name, value) in fields.iter() {
                    map.insert(name.to_string(), value.to_json()?);
                }
                J::Object(map)
            }
            Value::Binary(_) => J::Object(serde_json::Map::new()),
        })
    }

    /// Map a JSON value onto the payload variants.
    pub fn from_json(json: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match json {
            J::Null => Value::Null,
            J::Bool(b) => Value::Bool(b),
            J::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            J::String(s) => Value::Text(s),
            J::Array(items) => Value::Sequence(items.into_iter().map(Value::from_json).collect()),
            J::Object(map) => Value::Struct(Payload {
                fields: map
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            }),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Attachment> for Value {
    fn from(a: Attachment) -> Self {
        Value::Binary(a)
    }
}

impl From<Payload> for Value {
    fn from(p: Payload) -> Self {
        Value::Struct(p)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Insertion-ordered field map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    fields: Vec<(String, Value)>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a field. Re-setting an existing name keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a payload from a typed request struct.
    ///
    /// The value must serialize to a JSON object. `Option::None` fields
    /// become `Null` and are skipped by the serializer.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        match serde_json::to_value(value)
            .map_err(|e| ClientError::Serialization(e.to_string()))?
        {
            serde_json::Value::Object(map) => Ok(Self {
                fields: map
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            }),
            other => Err(ClientError::Serialization(format!(
                "Payload must be an object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Content of one multipart part.
#[derive(Debug, Clone, PartialEq)]
pub enum PartValue {
    Text(String),
    File(Attachment),
}

/// One named multipart part.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub name: String,
    pub value: PartValue,
}

/// Ordered multipart parts, ready to turn into a request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartBody {
    parts: Vec<Part>,
}

impl MultipartBody {
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Text values emitted under `name`, in emission order.
    pub fn texts(&self, name: &str) -> Vec<&str> {
        self.parts
            .iter()
            .filter(|p| p.name == name)
            .filter_map(|p| match &p.value {
                PartValue::Text(s) => Some(s.as_str()),
                PartValue::File(_) => None,
            })
            .collect()
    }

    /// Part names in emission order (repeats included).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    fn text(&mut self, name: &str, value: String) {
        self.parts.push(Part {
            name: name.to_string(),
            value: PartValue::Text(value),
        });
    }

    fn file(&mut self, name: &str, attachment: Attachment) {
        self.parts.push(Part {
            name: name.to_string(),
            value: PartValue::File(attachment),
        });
    }

    /// Convert into a `reqwest` multipart form.
    pub fn into_form(self) -> Result<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for part in self.parts {
            form = match part.value {
                PartValue::Text(text) => form.text(part.name, text),
                PartValue::File(att) => {
                    let mut file_part =
                        reqwest::multipart::Part::bytes(att.bytes).file_name(att.filename);
                    if let Some(mime) = att.mime {
                        file_part = file_part.mime_str(&mime).map_err(|e| {
                            ClientError::Serialization(format!("Bad MIME type {}: {}", mime, e))
                        })?;
                    }
                    form.part(part.name, file_part)
                }
            };
        }
        Ok(form)
    }
}

/// Flatten `payload` and an optional top-level `file` into multipart parts.
pub fn build_multipart(payload: Payload, file: Option<Attachment>) -> Result<MultipartBody> {
    let mut body = MultipartBody::default();

    if let Some(att) = file {
        body.file(FILE_FIELD, att);
    }

    for (name, value) in payload.fields {
        match value {
            Value::Null => {}
            Value::Binary(att) => body.file(&name, att),
            Value::Sequence(items) => {
                for item in items {
                    match item {
                        Value::Null => body.text(&name, String::new()),
                        Value::Binary(att) => body.file(&name, att),
                        other => body.text(&name, element_text(&other)?),
                    }
                }
            }
            Value::Struct(_) => {
                body.text(&name, json_text(&value.to_json()?)?);
            }
            other => body.text(&name, element_text(&other)?),
        }
    }

    Ok(body)
}

/// Text form of a single value.
fn element_text(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Null => String::new(),
        Value::Text(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => float_text(*f),
        Value::Bool(b) => b.to_string(),
        Value::Sequence(_) | Value::Struct(_) | Value::Binary(_) => {
            json_text(&value.to_json()?)?
        }
    })
}

fn json_text(json: &serde_json::Value) -> Result<String> {
    serde_json::to_string(json).map_err(|e| ClientError::Serialization(e.to_string()))
}

fn float_text(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f == f64::INFINITY {
        "Infinity".to_string()
    } else if f == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}
