//! Crontab I/O (spec §4.C) — the only two side effects this system has
//! on the crontab itself.
//!
//! Grounded in `other_examples/e93d0c65_Jlowzow-gsd-cron__src-crontab.rs.rs`,
//! which shells out to `crontab -l` / `crontab -` the same way.

use std::io::Write;
use std::process::{Command, Stdio};

use async_trait::async_trait;

use crate::error::{CronError, CronResult};

/// Abstraction over `crontab(1)`, so the rest of the crate can be tested
/// without a real crontab binary (grounded in the teacher's
/// `MockProvider` test-double pattern, `oxibot-agent/src/tools/spawn.rs`).
#[async_trait]
pub trait CrontabIo: Send + Sync {
    /// Read the current crontab, split into lines. "No crontab for user"
    /// is normalized to an empty list, not an error (spec §4.C, §6).
    async fn read(&self) -> CronResult<Vec<String>>;

    /// Replace the entire crontab with `content`.
    async fn write(&self, content: &str) -> CronResult<()>;
}

/// Real `CrontabIo` backed by the `crontab(1)` binary.
#[derive(Clone, Default)]
pub struct SystemCrontabIo;

impl SystemCrontabIo {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CrontabIo for SystemCrontabIo {
    async fn read(&self) -> CronResult<Vec<String>> {
        let output = tokio::task::spawn_blocking(|| {
            Command::new("crontab").arg("-l").output()
        })
        .await
        .map_err(|e| CronError::Internal(format!("failed to spawn crontab -l: {e}")))?
        .map_err(|e| CronError::Internal(format!("failed to run crontab -l: {e}")))?;

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Ok(stdout.split('\n').map(|s| s.to_string()).collect());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.to_lowercase().contains("no crontab") {
            return Ok(Vec::new());
        }

        Err(CronError::Internal(format!(
            "crontab -l failed: {}",
            stderr.trim()
        )))
    }

    async fn write(&self, content: &str) -> CronResult<()> {
        let content = content.to_string();
        let status = tokio::task::spawn_blocking(move || -> std::io::Result<std::process::ExitStatus> {
            let mut child = Command::new("crontab")
                .arg("-")
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .spawn()?;

            child
                .stdin
                .take()
                .expect("piped stdin")
                .write_all(content.as_bytes())?;

            child.wait()
        })
        .await
        .map_err(|e| CronError::Internal(format!("failed to spawn crontab -: {e}")))?
        .map_err(|e| CronError::Internal(format!("failed to run crontab -: {e}")))?;

        if status.success() {
            Ok(())
        } else {
            Err(CronError::Internal(format!(
                "crontab - exited with status {status}"
            )))
        }
    }
}

/// In-memory `CrontabIo` fake for tests that don't need a real binary.
#[derive(Default)]
pub struct MemoryCrontabIo {
    content: tokio::sync::Mutex<String>,
}

impl MemoryCrontabIo {
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            content: tokio::sync::Mutex::new(seed.into()),
        }
    }
}

#[async_trait]
impl CrontabIo for MemoryCrontabIo {
    async fn read(&self) -> CronResult<Vec<String>> {
        let content = self.content.lock().await;
        Ok(content.split('\n').map(|s| s.to_string()).collect())
    }

    async fn write(&self, content: &str) -> CronResult<()> {
        *self.content.lock().await = content.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_io_round_trips() {
        let io = MemoryCrontabIo::new("0 3 * * * /usr/bin/backup.sh");
        let lines = io.read().await.unwrap();
        assert_eq!(lines, vec!["0 3 * * * /usr/bin/backup.sh".to_string()]);

        io.write("a\nb\nc").await.unwrap();
        let lines = io.read().await.unwrap();
        assert_eq!(lines, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_io_starts_empty_by_default() {
        let io = MemoryCrontabIo::default();
        let lines = io.read().await.unwrap();
        assert_eq!(lines, vec!["".to_string()]);
    }
}
