//! Runs task commands through a shell and turns the outcome into a
//! [`LogEntry`].
//!
//! Nothing here returns an error: spawn failures, non-zero exits and timeouts
//! all become a failed entry, so a schedule keeps going after a bad run.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use cronhive_core::config::ExecutorConfig;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::truncate::truncate_message;
use crate::types::LogEntry;

/// Message stored for a successful run that printed nothing.
pub const EMPTY_SUCCESS_MESSAGE: &str = "completed";

/// Executes a command and reports how it went.
///
/// The scheduler only talks to this trait, so alternative runners (remote
/// execution, scripted runners in tests) can be plugged in.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> LogEntry;
}

/// Spawns `<shell> -c <command>` (or `-lc` for a login shell) with a hard
/// timeout.
pub struct ShellExecutor {
    config: ExecutorConfig,
}

impl ShellExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Spawn the child and wait for it, returning `(success, output, error)`.
    async fn execute(&self, command: &str) -> (bool, String, Option<String>) {
        let flag = if self.config.login_shell { "-lc" } else { "-c" };

        // kill_on_drop: when the timeout drops the wait future the child is
        // SIGKILLed instead of being left running.
        let child = Command::new(&self.config.shell)
            .arg(flag)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => return (false, String::new(), Some(format!("spawn failed: {e}"))),
        };

        match tokio::time::timeout(self.timeout(), child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let text = combine_output(&output.stdout, &output.stderr);
                if output.status.success() {
                    (true, text, None)
                } else {
                    (false, text, Some(output.status.to_string()))
                }
            }
            Ok(Err(e)) => (false, String::new(), Some(format!("wait failed: {e}"))),
            Err(_elapsed) => (
                false,
                String::new(),
                Some(format!(
                    "command timed out after {}s and was killed",
                    self.config.timeout_secs
                )),
            ),
        }
    }
}

#[async_trait]
impl CommandRunner for ShellExecutor {
    async fn run(&self, command: &str) -> LogEntry {
        debug!("exec: {command}");
        let started = Instant::now();

        let (success, output, error) = self.execute(command).await;

        let output = output.trim();
        let message = if !output.is_empty() {
            output.to_string()
        } else if success {
            EMPTY_SUCCESS_MESSAGE.to_string()
        } else {
            error.clone().unwrap_or_default()
        };

        if let Some(ref error) = error {
            warn!(%error, "command failed");
        }

        LogEntry {
            time: Utc::now(),
            duration_ms: started.elapsed().as_millis() as u64,
            success,
            message: truncate_message(&message, self.config.max_message_chars),
        }
    }
}

/// Stdout followed by stderr, ANSI escapes stripped.
fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = strip_text(stdout);
    let stderr = strip_text(stderr);
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (false, false) => format!("{}\n{}", stdout.trim_end(), stderr),
        (false, true) => stdout,
        (true, _) => stderr,
    }
}

/// Strip ANSI escape codes and convert bytes to a UTF-8 string.
fn strip_text(raw: &[u8]) -> String {
    let clean = strip_ansi_escapes::strip(raw);
    String::from_utf8_lossy(&clean).into_owned()
}
