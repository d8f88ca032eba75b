//! Path helpers and small pure utilities shared across the scheduler crates.
//!
//! Trimmed from the teacher's broader `utils/helpers.py` port down to the
//! handful of helpers the cron subsystem actually needs: where its config
//! lives, and the id-charset guard the crontab codec uses to block shell
//! metacharacter injection (spec §9, "Shell injection").

use std::path::PathBuf;

/// Get the openclaw data directory (e.g. `~/.openclaw/`).
pub fn get_data_path() -> PathBuf {
    home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".openclaw")
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("USERPROFILE").ok().map(PathBuf::from))
}

/// Get current Unix epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Whether `id` is safe to place verbatim on a crontab execution line.
///
/// Per spec §9 ("Shell injection"), job ids are constrained to
/// `[A-Za-z0-9-]` before being written into `openclaw cron run <id>`, since
/// that string is placed in the crontab unescaped.
pub fn is_safe_cron_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}
