//! Run-History Reader (spec §4.G) — reconstructs a job's run history
//! from journal/syslog, best-effort.
//!
//! No file in the retrieval pack parses `journalctl`; this follows the
//! teacher's general subprocess-`Command` idiom (as in
//! `oxibot-agent/src/tools/shell.rs`) applied to this spec's log sources.
//! See DESIGN.md.

use std::process::Command;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::codec::RUN_MARKER;
use crate::types::{CronRunLogEntry, RunStatus};

const SYSLOG_PATHS: &[&str] = &["/var/log/cron", "/var/log/syslog"];

/// Fetch up to `limit` newest-first history entries for `job_id` (spec
/// §4.G). Swallows all I/O errors into an empty list.
pub fn read_run_history(job_id: &str, limit: usize) -> Vec<CronRunLogEntry> {
    let content = read_log_source();
    extract_entries(&content, job_id, limit)
}

fn read_log_source() -> String {
    for unit in ["cron.service", "crond.service"] {
        if let Some(out) = run_journalctl(unit) {
            if !out.trim().is_empty() {
                return out;
            }
        }
    }

    for path in SYSLOG_PATHS {
        if let Ok(content) = std::fs::read_to_string(path) {
            return content;
        }
    }

    String::new()
}

fn run_journalctl(unit: &str) -> Option<String> {
    let output = Command::new("journalctl")
        .arg("-u")
        .arg(unit)
        .arg("--no-pager")
        .arg("-o")
        .arg("short-iso")
        .output()
        .ok()?;
    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        debug!(unit, "journalctl unit unavailable");
        None
    }
}

fn extract_entries(content: &str, job_id: &str, limit: usize) -> Vec<CronRunLogEntry> {
    let mut entries = Vec::new();

    for line in content.lines().rev() {
        if entries.len() >= limit {
            break;
        }
        if !line.contains(RUN_MARKER) || !line.contains(job_id) {
            continue;
        }

        let ts = extract_timestamp_ms(line).unwrap_or_else(now_ms);
        let status = if line.to_lowercase().contains("error") {
            RunStatus::Error
        } else {
            RunStatus::Ok
        };

        entries.push(CronRunLogEntry {
            ts,
            job_id: job_id.to_string(),
            status,
        });
    }

    entries
}

fn extract_timestamp_ms(line: &str) -> Option<i64> {
    if line.len() < 19 {
        return None;
    }
    let candidate = &line[..19];
    NaiveDateTime::parse_from_str(candidate, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis())
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_ok_and_error_entries_newest_first() {
        let log = "\
2024-01-01 10:00:00 host CRON[1]: openclaw cron run JOB123 status=ok
2024-01-01 11:00:00 host CRON[2]: openclaw cron run JOB123 error: boom
2024-01-01 12:00:00 host CRON[3]: openclaw cron run JOB123 status=ok
2024-01-01 12:00:00 host CRON[4]: openclaw cron run OTHERJOB status=ok
";
        let entries = extract_entries(log, "JOB123", 10);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].status, RunStatus::Ok);
        assert_eq!(entries[1].status, RunStatus::Error);
        assert_eq!(entries[2].status, RunStatus::Ok);
        // Newest first: the 12:00:00 entry should come before the 10:00:00 one.
        assert!(entries[0].ts > entries[2].ts);
    }

    #[test]
    fn test_respects_limit() {
        let log = "\
2024-01-01 10:00:00 host CRON[1]: openclaw cron run JOB123 status=ok
2024-01-01 11:00:00 host CRON[2]: openclaw cron run JOB123 status=ok
2024-01-01 12:00:00 host CRON[3]: openclaw cron run JOB123 status=ok
";
        let entries = extract_entries(log, "JOB123", 2);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_empty_log_yields_empty_list() {
        assert!(extract_entries("", "JOB123", 10).is_empty());
    }
}
