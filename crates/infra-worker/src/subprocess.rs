// Subprocess worker execution
// Spawns one-shot child processes with environment allowlisting

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use casework_core::application::registry::WorkerTemplate;
use casework_core::domain::JobPayload;
use casework_core::port::ExecutionError;

/// Environment variables passed through to worker processes by default
const DEFAULT_ENV_ALLOWLIST: &[&str] = &["PATH", "HOME", "LANG", "TMPDIR"];

/// Maximum stderr bytes carried into the job error message
const STDERR_TAIL_BYTES: usize = 2048;

/// One-shot subprocess execution for template bindings.
///
/// The job payload is written to the child's stdin as JSON and the child's
/// stdout becomes the job result: parsed as JSON when it parses, carried as a
/// plain string otherwise. The child sees only allowlisted environment
/// variables. A template deadline is enforced with a timer; `kill_on_drop`
/// reaps the child when the timed-out wait future is dropped.
pub struct SubprocessWorker {
    env_allowlist: Vec<String>,
}

impl Default for SubprocessWorker {
    fn default() -> Self {
        Self::new(DEFAULT_ENV_ALLOWLIST.iter().map(|s| s.to_string()).collect())
    }
}

impl SubprocessWorker {
    pub fn new(env_allowlist: Vec<String>) -> Self {
        Self { env_allowlist }
    }

    /// Allowlisted slice of the parent environment
    fn filtered_env(&self) -> HashMap<String, String> {
        std::env::vars()
            .filter(|(key, _)| self.env_allowlist.iter().any(|allowed| allowed == key))
            .collect()
    }

    /// Run one template invocation to completion
    pub async fn run(
        &self,
        template: &WorkerTemplate,
        payload: &JobPayload,
    ) -> Result<serde_json::Value, ExecutionError> {
        let input = serde_json::to_vec(payload.as_value())
            .map_err(|e| ExecutionError::InvalidPayload(e.to_string()))?;

        let mut child = Command::new(&template.program)
            .args(&template.args)
            .env_clear()
            .envs(self.filtered_env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A worker that exits without reading its stdin is not an error
            if let Err(e) = stdin.write_all(&input).await {
                debug!(error = %e, "Worker did not consume stdin");
            }
        }

        let output = match template.timeout_ms {
            Some(deadline_ms) => {
                match timeout(
                    Duration::from_millis(deadline_ms as u64),
                    child.wait_with_output(),
                )
                .await
                {
                    Ok(waited) => waited.map_err(|e| ExecutionError::Io(e.to_string()))?,
                    Err(_) => {
                        warn!(
                            program = %template.program.display(),
                            timeout_ms = deadline_ms,
                            "Worker subprocess timed out"
                        );
                        return Err(ExecutionError::Timeout(deadline_ms));
                    }
                }
            }
            None => child
                .wait_with_output()
                .await
                .map_err(|e| ExecutionError::Io(e.to_string()))?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExecutionError::HandlerFailed(format!(
                "worker exited with {}: {}",
                output.status,
                stderr_tail(&stderr)
            )));
        }

        info!(program = %template.program.display(), "Worker subprocess finished");
        Ok(parse_result(&output.stdout))
    }
}

/// Child stdout is the job result: JSON when it parses, a trimmed string
/// otherwise
fn parse_result(stdout: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    serde_json::from_str(trimmed)
        .unwrap_or_else(|_| serde_json::Value::String(trimmed.to_string()))
}

/// Last STDERR_TAIL_BYTES of stderr, kept on a char boundary
fn stderr_tail(stderr: &str) -> &str {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    if start == 0 {
        return stderr.trim_end();
    }
    match stderr.char_indices().map(|(i, _)| i).find(|&i| i >= start) {
        Some(i) => stderr[i..].trim_end(),
        None => "",
    }
}
