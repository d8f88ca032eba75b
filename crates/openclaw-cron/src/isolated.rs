//! Isolated-turn runner (spec §4.E.3) — the narrow interface to the
//! out-of-scope interactive agent runtime's one-shot subprocess mode.
//!
//! Grounded in `other_examples/7bb56837_aitanCloud-openclaw-rs__crates-openclaw-gateway-src-cron.rs.rs`'s
//! `run_cron_agent_turn` (fresh `session_key = format!("cron:{name}:{uuid}")`,
//! spawn-and-collect-output) and the teacher's subprocess-spawn idiom in
//! `oxibot-agent/src/tools/shell.rs` (`ExecTool`: bounded `tokio::time::timeout`
//! around `Command::output()`, output truncation).

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, warn};
use uuid::Uuid;

use crate::types::CronJob;

/// Maximum captured stdout/stderr bytes, mirroring the teacher's
/// `ExecTool::MAX_OUTPUT_LEN` truncation guard.
const MAX_OUTPUT_LEN: usize = 16_384;

/// Default bound when a job doesn't specify `payload.timeoutSeconds`.
const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

/// Result of an isolated agent turn (spec §4.E.3b).
#[derive(Clone, Debug, Default)]
pub struct IsolatedTurnResult {
    pub status: Option<String>,
    pub error: Option<String>,
    pub summary: Option<String>,
    pub session_id: Option<String>,
    pub session_key: Option<String>,
}

/// Runs one bounded, stateless agent turn for `sessionTarget="isolated"`
/// jobs (spec §4.E.3). Implemented by the out-of-scope interactive agent
/// runtime in production.
#[async_trait]
pub trait IsolatedTurnRunner: Send + Sync {
    async fn run(&self, job: &CronJob, message: &str) -> IsolatedTurnResult;
}

/// Default `IsolatedTurnRunner` that spawns the `openclaw` binary itself
/// in a one-shot turn mode, bounded by `payload.timeoutSeconds`.
pub struct SubprocessTurnRunner {
    binary: String,
}

impl SubprocessTurnRunner {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for SubprocessTurnRunner {
    fn default() -> Self {
        Self::new("openclaw")
    }
}

#[async_trait]
impl IsolatedTurnRunner for SubprocessTurnRunner {
    async fn run(&self, job: &CronJob, message: &str) -> IsolatedTurnResult {
        let session_key = format!("cron:{}:{}", job.name, Uuid::new_v4());
        let timeout_seconds = match &job.payload {
            crate::types::CronPayload::AgentTurn {
                timeout_seconds, ..
            } => timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            _ => DEFAULT_TIMEOUT_SECONDS,
        };

        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.arg("agent-turn")
            .arg("--session-key")
            .arg(&session_key)
            .arg("--message")
            .arg(message)
            .kill_on_drop(true);

        let run = tokio::time::timeout(Duration::from_secs(timeout_seconds), cmd.output()).await;

        match run {
            Ok(Ok(output)) if output.status.success() => {
                let summary = truncate(&String::from_utf8_lossy(&output.stdout));
                IsolatedTurnResult {
                    status: Some("ok".to_string()),
                    error: None,
                    summary: Some(summary),
                    session_id: Some(Uuid::new_v4().to_string()),
                    session_key: Some(session_key),
                }
            }
            Ok(Ok(output)) => {
                let stderr = truncate(&String::from_utf8_lossy(&output.stderr));
                warn!(job_id = %job.id, %stderr, "isolated turn exited non-zero");
                IsolatedTurnResult {
                    status: Some("error".to_string()),
                    error: Some(stderr),
                    summary: None,
                    session_id: None,
                    session_key: Some(session_key),
                }
            }
            Ok(Err(e)) => {
                error!(job_id = %job.id, error = %e, "failed to spawn isolated turn");
                IsolatedTurnResult {
                    status: Some("error".to_string()),
                    error: Some(e.to_string()),
                    summary: None,
                    session_id: None,
                    session_key: Some(session_key),
                }
            }
            Err(_) => {
                warn!(job_id = %job.id, timeout_seconds, "isolated turn timed out");
                IsolatedTurnResult {
                    status: Some("error".to_string()),
                    error: Some(format!("timed out after {timeout_seconds}s")),
                    summary: None,
                    session_id: None,
                    session_key: Some(session_key),
                }
            }
        }
    }
}

fn truncate(s: &str) -> String {
    if s.chars().count() > MAX_OUTPUT_LEN {
        let head: String = s.chars().take(MAX_OUTPUT_LEN).collect();
        format!("{head}... (truncated)")
    } else {
        s.to_string()
    }
}
