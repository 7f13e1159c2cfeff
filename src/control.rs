//! Control-channel client: asks the surrounding system to resolve files
//!
//! When a job carries no direct `file` path the worker issues a
//! `GET_LOCAL_FILE` command over this channel. Three implementations:
//! - `NullChannel`: no channel configured, every command answers nothing
//! - `CommandChannel`: runs an external program per command (production)
//! - `MockChannel`: canned answers, records requests (testing)

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Command asking for a local path to the job's input
pub const GET_LOCAL_FILE: &str = "GET_LOCAL_FILE";

/// Errors from control-channel operations.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("control channel unavailable: {0}")]
    Unavailable(String),
    #[error("command {name} failed: {detail}")]
    CommandFailed { name: String, detail: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Executes named commands with JSON arguments.
///
/// `Ok(None)` means the channel answered but had nothing to say.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    async fn exec_command(&self, name: &str, args: &Value) -> Result<Option<String>, ControlError>;
}

/// Channel used when nothing is configured.
#[derive(Debug, Default)]
pub struct NullChannel;

#[async_trait]
impl ControlChannel for NullChannel {
    async fn exec_command(&self, _name: &str, _args: &Value) -> Result<Option<String>, ControlError> {
        Ok(None)
    }
}

/// Runs `<program> [args...] <command-name>` with the JSON arguments on stdin.
///
/// Trimmed stdout is the answer; empty output means no answer. A non-zero
/// exit status is a `CommandFailed` error carrying stderr.
#[derive(Debug, Clone)]
pub struct CommandChannel {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandChannel {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Fixed arguments placed before the command name.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait]
impl ControlChannel for CommandChannel {
    async fn exec_command(&self, name: &str, args: &Value) -> Result<Option<String>, ControlError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ControlError::Unavailable(format!("{}: {}", self.program.display(), e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(args.to_string().as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(ControlError::CommandFailed {
                name: name.to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let answer = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!answer.is_empty()).then_some(answer))
    }
}

/// Mock channel for testing; returns preconfigured answers.
#[derive(Debug, Default)]
pub struct MockChannel {
    answers: HashMap<String, Option<String>>,
    failures: HashMap<String, String>,
    requests: Mutex<Vec<(String, Value)>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `name` with `answer`.
    pub fn with_answer(mut self, name: impl Into<String>, answer: impl Into<String>) -> Self {
        self.answers.insert(name.into(), Some(answer.into()));
        self
    }

    /// Fail `name` with `detail`.
    pub fn with_failure(mut self, name: impl Into<String>, detail: impl Into<String>) -> Self {
        self.failures.insert(name.into(), detail.into());
        self
    }

    /// Every (command, args) pair seen so far.
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ControlChannel for MockChannel {
    async fn exec_command(&self, name: &str, args: &Value) -> Result<Option<String>, ControlError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((name.to_string(), args.clone()));
        }

        if let Some(detail) = self.failures.get(name) {
            return Err(ControlError::CommandFailed {
                name: name.to_string(),
                detail: detail.clone(),
            });
        }
        Ok(self.answers.get(name).cloned().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn null_channel_answers_nothing() {
        let answer = NullChannel.exec_command(GET_LOCAL_FILE, &json!({})).await.unwrap();
        assert!(answer.is_none());
    }

    #[tokio::test]
    async fn mock_records_requests_and_answers() {
        let mock = MockChannel::new().with_answer(GET_LOCAL_FILE, "/data/x.bin");
        let args = json!({"path": "x.bin"});

        let answer = mock.exec_command(GET_LOCAL_FILE, &args).await.unwrap();
        assert_eq!(answer.as_deref(), Some("/data/x.bin"));
        assert_eq!(mock.requests(), vec![(GET_LOCAL_FILE.to_string(), args)]);
    }

    #[tokio::test]
    async fn mock_unknown_command_answers_nothing() {
        let mock = MockChannel::new();
        assert!(mock.exec_command("OTHER", &json!({})).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mock_failure_is_command_failed() {
        let mock = MockChannel::new().with_failure(GET_LOCAL_FILE, "no such location");
        let err = mock.exec_command(GET_LOCAL_FILE, &json!({})).await.unwrap_err();
        assert!(matches!(err, ControlError::CommandFailed { .. }));
        assert!(err.to_string().contains("no such location"));
    }

    fn shell(script: &str) -> CommandChannel {
        CommandChannel::new("/bin/sh").with_args(["-c", script, "resolver"])
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_channel_reads_stdout() {
        let channel = shell("read -r args; echo \"/resolved/$1 $args\"");
        let answer = channel
            .exec_command(GET_LOCAL_FILE, &json!({"path": "a"}))
            .await
            .unwrap();
        assert_eq!(
            answer.as_deref(),
            Some(r#"/resolved/GET_LOCAL_FILE {"path":"a"}"#)
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_channel_empty_output_is_no_answer() {
        let answer = shell("cat > /dev/null")
            .exec_command(GET_LOCAL_FILE, &json!({}))
            .await
            .unwrap();
        assert!(answer.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_channel_reports_non_zero_exit() {
        let err = shell("cat > /dev/null; echo boom >&2; exit 3")
            .exec_command(GET_LOCAL_FILE, &json!({}))
            .await
            .unwrap_err();
        match err {
            ControlError::CommandFailed { detail, .. } => assert_eq!(detail, "boom"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn command_channel_missing_program_is_unavailable() {
        let err = CommandChannel::new("/definitely/not/here")
            .exec_command(GET_LOCAL_FILE, &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::Unavailable(_)));
    }
}
