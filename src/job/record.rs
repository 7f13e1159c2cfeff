//! JobRecord: one unit of work, its route, and its result fields

use super::stage::RoutingStage;
use crate::error::{SiftError, SiftResult};
use serde::Serialize;
use serde_json::{Map, Value};

/// Field holding newline-joined indexing warnings
pub const INDEXING_WARNING: &str = "indexing_warning";
/// Field holding the last error code
pub const ERROR_CODE: &str = "error_code";
/// Field holding the last error message
pub const ERROR_MESSAGE: &str = "error_message";
/// Field holding newline-joined error traces
pub const ERROR_TRACE: &str = "error_trace";

const ID: &str = "id";
const ENTRY: &str = "entry";
const FIELDS: &str = "fields";
const ROUTE: &str = "route";
const TIMEOUT: &str = "timeout";

/// Error codes recorded in-band on a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The input file could not be located on this host
    ResolutionFail,
    /// The extractor ran but could not read or interpret the file
    ExtractionFail,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResolutionFail => "RESOLUTION_FAIL",
            Self::ExtractionFail => "EXTRACTION_FAIL",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single job: an opaque id, a free-form property tree, the route it
/// travels, and the `entry.fields` bag extractors write into.
///
/// Properties keep their arrival order, so a record serializes back the way
/// it was received plus whatever the worker stamped or extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    props: Map<String, Value>,
}

impl JobRecord {
    /// Build a record from already-parsed input.
    ///
    /// The input must be a JSON object carrying a non-null `id`.
    pub fn from_source(raw: Value) -> SiftResult<Self> {
        let props = match raw {
            Value::Object(map) => map,
            other => {
                return Err(SiftError::JobSpec(format!(
                    "job must be a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };

        match props.get(ID) {
            None | Some(Value::Null) => Err(SiftError::JobSpec("job has no id".to_string())),
            Some(_) => Ok(Self { props }),
        }
    }

    /// Parse a record from JSON text.
    pub fn from_json(text: &str) -> SiftResult<Self> {
        let raw: Value = serde_json::from_str(text)
            .map_err(|e| SiftError::JobSpec(format!("job is not valid JSON: {}", e)))?;
        Self::from_source(raw)
    }

    /// The job id rendered as text (numeric ids are accepted).
    pub fn id(&self) -> String {
        self.props.get(ID).map(value_text).unwrap_or_default()
    }

    /// All top-level properties.
    pub fn props(&self) -> &Map<String, Value> {
        &self.props
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.props.get(name)
    }

    pub fn get_or(&self, name: &str, default: Value) -> Value {
        self.props.get(name).cloned().unwrap_or(default)
    }

    /// Top-level property as a string slice; non-string values yield `None`.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.props.get(name).and_then(Value::as_str)
    }

    pub fn has(&self, name: &str) -> bool {
        self.props.contains_key(name)
    }

    /// Overwrite a top-level property.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.props.insert(name.into(), value.into());
    }

    /// The caller-supplied time budget in seconds.
    ///
    /// Integers pass through, floats truncate, numeric strings are parsed.
    /// Anything else, including an absent timeout, is 0.
    pub fn get_timeout(&self) -> i64 {
        match self.props.get(TIMEOUT) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(truncate_finite))
                .unwrap_or(0),
            Some(Value::String(s)) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(truncate_finite))
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Write a result field under `entry.fields`, creating the path on first use.
    ///
    /// With `append`, an existing non-null value is joined to the new one
    /// with a newline; otherwise the value is replaced.
    pub fn set_field(&mut self, name: &str, value: impl Into<Value>, append: bool) {
        let value = value.into();
        let fields = self.fields_mut();
        let merged = match fields.get(name) {
            Some(old) if append && !old.is_null() => {
                Value::String(format!("{}\n{}", value_text(old), value_text(&value)))
            }
            _ => value,
        };
        fields.insert(name.to_string(), merged);
    }

    /// Read `entry.fields.<name>`; any missing level yields `None`.
    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.props.get(ENTRY)?.get(FIELDS)?.get(name)
    }

    pub fn get_field_or(&self, name: &str, default: Value) -> Value {
        self.get_field(name).cloned().unwrap_or(default)
    }

    /// The whole `entry.fields` bag, if anything has been written yet.
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        self.props.get(ENTRY)?.get(FIELDS)?.as_object()
    }

    pub fn warning(&mut self, msg: impl Into<String>) {
        self.set_field(INDEXING_WARNING, msg.into(), true);
    }

    /// Record an error; the most recent call wins.
    pub fn error(&mut self, code: ErrorCode, msg: impl Into<String>) {
        self.set_field(ERROR_CODE, code.as_str(), false);
        self.set_field(ERROR_MESSAGE, msg.into(), false);
    }

    /// Append a diagnostic line to the error trace.
    pub fn error_trace(&mut self, msg: impl Into<String>) {
        self.set_field(ERROR_TRACE, msg.into(), true);
    }

    /// Route descriptors in pipeline order. A missing or non-array route is empty.
    pub fn route(&self) -> &[Value] {
        self.props
            .get(ROUTE)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// View of the route descriptor at `index`, if it is an object.
    pub fn stage(&self, index: usize) -> Option<RoutingStage<'_>> {
        self.route()
            .get(index)
            .and_then(Value::as_object)
            .map(|entry| RoutingStage::new(index, entry))
    }

    pub(crate) fn route_entry_mut(&mut self, index: usize) -> Option<&mut Map<String, Value>> {
        self.props
            .get_mut(ROUTE)?
            .as_array_mut()?
            .get_mut(index)?
            .as_object_mut()
    }

    /// Render the record as JSON text.
    ///
    /// `None` gives a single compact line, `Some(n)` pretty-prints with an
    /// `n`-space indent.
    pub fn serialize(&self, indent: Option<usize>) -> SiftResult<String> {
        match indent {
            None => Ok(serde_json::to_string(&self.props)?),
            Some(width) => {
                let pad = vec![b' '; width];
                let mut buf = Vec::new();
                let formatter = serde_json::ser::PrettyFormatter::with_indent(&pad);
                let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
                self.props.serialize(&mut ser)?;
                Ok(String::from_utf8_lossy(&buf).into_owned())
            }
        }
    }

    fn fields_mut(&mut self) -> &mut Map<String, Value> {
        let entry = ensure_object(
            self.props
                .entry(ENTRY)
                .or_insert_with(|| Value::Object(Map::new())),
        );
        ensure_object(
            entry
                .entry(FIELDS)
                .or_insert_with(|| Value::Object(Map::new())),
        )
    }
}

fn ensure_object(slot: &mut Value) -> &mut Map<String, Value> {
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just replaced with an object"),
    }
}

fn truncate_finite(f: f64) -> Option<i64> {
    f.is_finite().then(|| f.trunc() as i64)
}

/// Strings verbatim, everything else as JSON text.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
