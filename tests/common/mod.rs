//! Shared fakes for worker integration tests
//!
//! Captured output streams, a counting transport and scripted extractors.

#![allow(dead_code)]

use async_trait::async_trait;
use sift::forward::{Connection, Transport, TransportError};
use sift::{ExtractError, Extractor, JobRecord, StatusWriter};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory stream shared between the worker and the test.
#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    pub fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.text()).expect("captured output should be one JSON document")
    }

    pub fn status(&self) -> StatusWriter {
        StatusWriter::new(Box::new(self.clone()))
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// What the fake transport observed.
#[derive(Debug, Default)]
pub struct TransportLog {
    pub connects: Vec<String>,
    pub closes: usize,
    pub sent: Vec<(String, String)>,
}

/// Transport that records connects, closes and payloads.
#[derive(Clone, Default)]
pub struct CountingTransport {
    pub log: Arc<Mutex<TransportLog>>,
}

impl CountingTransport {
    pub fn connects(&self) -> Vec<String> {
        self.log.lock().unwrap().connects.clone()
    }

    pub fn closes(&self) -> usize {
        self.log.lock().unwrap().closes
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.log.lock().unwrap().sent.clone()
    }
}

struct RecordingConnection {
    address: String,
    log: Arc<Mutex<TransportLog>>,
}

#[async_trait]
impl Connection for RecordingConnection {
    async fn send(&mut self, payload: &str) -> Result<(), TransportError> {
        self.log
            .lock()
            .unwrap()
            .sent
            .push((self.address.clone(), payload.to_string()));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}

#[async_trait]
impl Transport for CountingTransport {
    async fn connect(&self, address: &str) -> Result<Box<dyn Connection>, TransportError> {
        self.log.lock().unwrap().connects.push(address.to_string());
        Ok(Box::new(RecordingConnection {
            address: address.to_string(),
            log: self.log.clone(),
        }))
    }
}

/// How a scripted extractor behaves when invoked.
#[derive(Clone)]
pub enum Script {
    /// Write these fields
    SetFields(Vec<(&'static str, &'static str)>),
    /// Fail with a content error
    Reject(&'static str),
    /// Fall through to the trait's default `extract`
    Unimplemented,
}

/// Extractor accepting a fixed set of names and following a script.
pub struct ScriptedExtractor {
    names: Vec<&'static str>,
    script: Script,
    pub calls: Arc<AtomicUsize>,
    pub paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl ScriptedExtractor {
    pub fn new(names: Vec<&'static str>, script: Script) -> Self {
        Self {
            names,
            script,
            calls: Arc::new(AtomicUsize::new(0)),
            paths: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    fn accept(&self, extractor: &str) -> bool {
        self.names.contains(&extractor)
    }

    async fn extract(
        &self,
        path: &Path,
        job: &mut JobRecord,
        extractor: &str,
    ) -> Result<(), ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.paths.lock().unwrap().push(path.to_path_buf());
        match &self.script {
            Script::SetFields(fields) => {
                for (name, value) in fields {
                    job.set_field(name, *value, false);
                }
                Ok(())
            }
            Script::Reject(msg) => Err(ExtractError::Content(msg.to_string())),
            Script::Unimplemented => Err(ExtractError::Unimplemented(extractor.to_string())),
        }
    }
}

/// A temp dir holding one file with the given contents.
pub fn temp_file(name: &str, contents: &[u8]) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}
