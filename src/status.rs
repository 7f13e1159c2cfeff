//! Out-of-band status protocol
//!
//! Every emission is one line: `MARK{...}MARK\n`. The payload is a JSON
//! object with single-character keys, so a supervisor tailing the stream can
//! pick status lines out of interleaved log output and parse each one on
//! its own. String values are JSON-escaped and can never break the line.
//! Each line is flushed as soon as it is written.

use std::io::{self, Write};
use thiserror::Error;

/// Marker used when none is configured
pub const DEFAULT_MARKER: &str = "@@@";

const KEY_MESSAGE: char = 'm';
const KEY_PERCENT: char = 'p';
const KEY_NAME: char = 'n';
const KEY_PIN: char = 'i';
const KEY_TYPE: char = 't';
const KEY_VPID: char = 'v';
const KEY_JOBID: char = 'j';
const KEY_TIMEOUT: char = 'o';
const KEY_STATE: char = 's';

/// Worker states reported to the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Success,
    Failed,
    Idle,
    Stopping,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::Idle => "IDLE",
            Self::Stopping => "STOPPING",
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("status marker must not be empty")]
    Empty,
    #[error("status marker must not contain line breaks")]
    LineBreak,
}

/// Validate a status marker before it is used for framing.
pub fn validate_marker(marker: &str) -> Result<(), MarkerError> {
    if marker.is_empty() {
        return Err(MarkerError::Empty);
    }
    if marker.contains(['\n', '\r']) {
        return Err(MarkerError::LineBreak);
    }
    Ok(())
}

/// Writes framed status lines to a supervisor-monitored stream.
pub struct StatusWriter {
    out: Box<dyn Write + Send>,
    marker: String,
}

impl StatusWriter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            marker: DEFAULT_MARKER.to_string(),
        }
    }

    /// Status lines on stderr, leaving stdout free for job output.
    pub fn stderr() -> Self {
        Self::new(Box::new(io::stderr()))
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Result<Self, MarkerError> {
        let marker = marker.into();
        validate_marker(&marker)?;
        self.marker = marker;
        Ok(self)
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn send_message(&mut self, msg: &str) -> io::Result<()> {
        let mut frame = Frame::new();
        frame.text(KEY_MESSAGE, msg);
        self.emit(frame)
    }

    /// Report progress. `percent` is clamped to `[0, 1]` (NaN reads as 0)
    /// and rendered with three decimals.
    pub fn send_percent(
        &mut self,
        percent: f64,
        msg: Option<&str>,
        name: Option<&str>,
    ) -> io::Result<()> {
        let clamped = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 1.0)
        };

        let mut frame = Frame::new();
        frame.raw(KEY_PERCENT, &format!("{:.3}", clamped));
        if let Some(msg) = msg {
            frame.text(KEY_MESSAGE, msg);
        }
        if let Some(name) = name {
            frame.text(KEY_NAME, name);
        }
        self.emit(frame)
    }

    pub fn send_state(&mut self, state: WorkerState) -> io::Result<()> {
        let mut frame = Frame::new();
        frame.text(KEY_STATE, state.as_str());
        self.emit(frame)
    }

    /// Announce a job. Must precede any other status line for that job.
    pub fn job_started(&mut self, job_id: &str, timeout: i64, desc: Option<&str>) -> io::Result<()> {
        let mut frame = Frame::new();
        frame.text(KEY_JOBID, job_id);
        frame.raw(KEY_TIMEOUT, &timeout.to_string());
        if let Some(desc) = desc {
            frame.text(KEY_MESSAGE, desc);
        }
        self.emit(frame)
    }

    /// Announce this worker to the supervisor once at startup.
    pub fn register(&mut self, pin: &str, worker_type: &str, vpid: &str) -> io::Result<()> {
        let mut frame = Frame::new();
        frame.text(KEY_PIN, pin);
        frame.text(KEY_TYPE, worker_type);
        frame.text(KEY_VPID, vpid);
        self.emit(frame)
    }

    fn emit(&mut self, frame: Frame) -> io::Result<()> {
        let line = format!("{m}{}{m}\n", frame.finish(), m = self.marker);
        self.out.write_all(line.as_bytes())?;
        self.out.flush()
    }
}

/// Hand-assembled JSON object so numbers keep their fixed formatting.
struct Frame {
    body: String,
}

impl Frame {
    fn new() -> Self {
        Self {
            body: String::from("{"),
        }
    }

    fn raw(&mut self, key: char, rendered: &str) {
        if self.body.len() > 1 {
            self.body.push(',');
        }
        self.body.push('"');
        self.body.push(key);
        self.body.push_str("\":");
        self.body.push_str(rendered);
    }

    fn text(&mut self, key: char, value: &str) {
        let quoted = serde_json::Value::from(value).to_string();
        self.raw(key, &quoted);
    }

    fn finish(mut self) -> String {
        self.body.push('}');
        self.body
    }
}
