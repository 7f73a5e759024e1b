//! Command executor seam.
//!
//! The engine never spawns processes itself. Every command goes through a
//! `CommandExecutor`: `ShellExecutor` runs it under `sh -c`, while
//! `ScriptedExecutor` replays canned outputs for tests and dry runs.

use crate::error::{DoctorError, Result};
use crate::evidence::StepOutput;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Output stream of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stream::Stdout => write!(f, "stdout"),
            Stream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Receives output chunks as they are produced
pub type StreamCallback = dyn Fn(&str, Stream) + Send + Sync;

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run one command to completion or until `timeout` elapses.
    ///
    /// A non-zero exit status is a successful execution; only a spawn
    /// failure or a timeout is an error.
    async fn execute(
        &self,
        command: &str,
        timeout: Duration,
        stream: Option<&StreamCallback>,
    ) -> Result<StepOutput>;
}

// =============================================================================
// Shell
// =============================================================================

/// Runs commands through `sh -c`
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self { shell: shell.into() }
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(
        &self,
        command: &str,
        timeout: Duration,
        stream: Option<&StreamCallback>,
    ) -> Result<StepOutput> {
        debug!("Executing: {}", command);

        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DoctorError::Execution(format!("failed to spawn {}: {}", self.shell, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DoctorError::Execution("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DoctorError::Execution("stderr not captured".to_string()))?;

        let run = async {
            let (out, err) = tokio::join!(
                read_stream(stdout, Stream::Stdout, stream),
                read_stream(stderr, Stream::Stderr, stream),
            );
            let status = child.wait().await?;
            Ok::<_, DoctorError>(StepOutput {
                stdout: out?,
                stderr: err?,
                exit_code: status.code(),
            })
        };

        let outcome = tokio::time::timeout(timeout, run).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                let ms = timeout.as_millis() as u64;
                warn!("Command timed out after {}ms: {}", ms, command);
                if let Err(e) = child.start_kill() {
                    debug!("Kill after timeout failed: {}", e);
                }
                if let Err(e) = child.wait().await {
                    debug!("Reaping timed-out child failed: {}", e);
                }
                Err(DoctorError::Timeout(ms))
            }
        }
    }
}

async fn read_stream<R: AsyncRead + Unpin>(
    reader: R,
    which: Stream,
    callback: Option<&StreamCallback>,
) -> Result<String> {
    let mut reader = BufReader::new(reader);
    let mut collected = String::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let chunk = String::from_utf8_lossy(&buf);
        if let Some(cb) = callback {
            cb(&chunk, which);
        }
        collected.push_str(&chunk);
    }

    Ok(collected)
}

// =============================================================================
// Scripted
// =============================================================================

#[derive(Debug, Clone)]
enum Scripted {
    Output(StepOutput),
    Error(String),
    Timeout,
}

/// A recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedCall {
    pub command: String,
    pub timeout: Duration,
}

/// Replays canned results keyed by the exact command string.
///
/// Each command holds a queue of results: every call consumes one, and the
/// last one repeats. Commands with no script fail with an execution error.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<ExecutedCall>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, command: &str, scripted: Scripted) -> Self {
        self.scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(command.to_string())
            .or_default()
            .push_back(scripted);
        self
    }

    /// Succeed with `stdout` and exit code 0
    pub fn respond(self, command: &str, stdout: &str) -> Self {
        self.push(
            command,
            Scripted::Output(StepOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: Some(0),
            }),
        )
    }

    pub fn respond_with(self, command: &str, output: StepOutput) -> Self {
        self.push(command, Scripted::Output(output))
    }

    pub fn fail(self, command: &str, message: &str) -> Self {
        self.push(command, Scripted::Error(message.to_string()))
    }

    pub fn time_out(self, command: &str) -> Self {
        self.push(command, Scripted::Timeout)
    }

    pub fn calls(&self) -> Vec<ExecutedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.command).collect()
    }

    fn next_for(&self, command: &str) -> Option<Scripted> {
        let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        let queue = scripts.get_mut(command)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        command: &str,
        timeout: Duration,
        stream: Option<&StreamCallback>,
    ) -> Result<StepOutput> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ExecutedCall {
                command: command.to_string(),
                timeout,
            });

        match self.next_for(command) {
            Some(Scripted::Output(output)) => {
                if let Some(cb) = stream {
                    for line in output.stdout.split_inclusive('\n') {
                        cb(line, Stream::Stdout);
                    }
                    for line in output.stderr.split_inclusive('\n') {
                        cb(line, Stream::Stderr);
                    }
                }
                Ok(output)
            }
            Some(Scripted::Error(message)) => Err(DoctorError::Execution(message)),
            Some(Scripted::Timeout) => Err(DoctorError::Timeout(timeout.as_millis() as u64)),
            None => Err(DoctorError::Execution(format!("no scripted response for: {}", command))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_scripted_queue_repeats_last() {
        let exec = ScriptedExecutor::new().respond("uptime", "first").respond("uptime", "second");
        let t = Duration::from_secs(1);
        assert_eq!(exec.execute("uptime", t, None).await.unwrap().stdout, "first");
        assert_eq!(exec.execute("uptime", t, None).await.unwrap().stdout, "second");
        assert_eq!(exec.execute("uptime", t, None).await.unwrap().stdout, "second");
        assert_eq!(exec.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_scripted_errors() {
        let exec = ScriptedExecutor::new().fail("sensors", "boom").time_out("du -sh /");
        let t = Duration::from_millis(250);
        assert!(matches!(exec.execute("sensors", t, None).await, Err(DoctorError::Execution(m)) if m == "boom"));
        assert!(matches!(exec.execute("du -sh /", t, None).await, Err(DoctorError::Timeout(250))));
        assert!(exec.execute("unknown", t, None).await.is_err());
        assert_eq!(exec.commands(), vec!["sensors", "du -sh /", "unknown"]);
    }

    #[tokio::test]
    async fn test_scripted_streams_lines() {
        let exec = ScriptedExecutor::new().respond("free", "a\nb\n");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let cb = move |chunk: &str, s: Stream| sink.lock().unwrap().push((chunk.to_string(), s));
        exec.execute("free", Duration::from_secs(1), Some(&cb)).await.unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("a\n".to_string(), Stream::Stdout), ("b\n".to_string(), Stream::Stdout)]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_executor_runs_and_times_out() {
        let exec = ShellExecutor::new();
        let out = exec
            .execute("echo hello; echo oops 1>&2; exit 3", Duration::from_secs(5), None)
            .await
            .unwrap();
        assert_eq!(out.stdout, "hello\n");
        assert_eq!(out.stderr, "oops\n");
        assert_eq!(out.exit_code, Some(3));

        let err = exec.execute("sleep 5", Duration::from_millis(100), None).await.unwrap_err();
        assert!(matches!(err, DoctorError::Timeout(100)));
    }
}
