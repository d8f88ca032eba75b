//! Run Gate (spec §4.D) — decides whether a job fires now.

use crate::types::CronJob;

/// How a run was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Requested on a schedule; subject to due-checking.
    Due,
    /// Requested explicitly (CLI / RPC `mode:"force"`, or `cron(8)`
    /// itself via the run-command): always fires.
    Force,
}

impl RunMode {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("force") => RunMode::Force,
            _ => RunMode::Due,
        }
    }
}

/// `shouldRunJob(job, mode)` (spec §4.D).
pub fn should_run_job(job: &CronJob, mode: RunMode, now_ms: i64) -> bool {
    match mode {
        RunMode::Force => true,
        RunMode::Due => is_job_due(job, now_ms),
    }
}

/// `isJobDue(job, now, {forced:false})` (spec §4.D). Disabled jobs are
/// never due. A job with no precomputed `nextRunAtMs` is treated as due
/// immediately (the decoder recomputes this on every read, so the only
/// way it's absent is a freshly-built in-memory job that hasn't gone
/// through the codec yet).
fn is_job_due(job: &CronJob, now_ms: i64) -> bool {
    if !job.enabled {
        return false;
    }
    match job.state.next_run_at_ms {
        Some(next) => now_ms >= next,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CronJobState, CronPayload, CronSchedule, SessionTarget, WakeMode};

    fn job(enabled: bool, next_run_at_ms: Option<i64>) -> CronJob {
        CronJob {
            id: "job-1".to_string(),
            name: "test".to_string(),
            description: None,
            enabled,
            agent_id: None,
            session_key: None,
            delete_after_run: None,
            created_at_ms: 0,
            updated_at_ms: 0,
            schedule: CronSchedule::Cron {
                expr: "* * * * *".to_string(),
                tz: None,
                stagger_ms: None,
            },
            session_target: SessionTarget::Main,
            wake_mode: WakeMode::Now,
            payload: CronPayload::SystemEvent {
                text: "hi".to_string(),
            },
            delivery: None,
            state: CronJobState { next_run_at_ms },
        }
    }

    #[test]
    fn test_force_always_runs_even_disabled() {
        let j = job(false, None);
        assert!(should_run_job(&j, RunMode::Force, 1_000));
    }

    #[test]
    fn test_disabled_job_never_due() {
        let j = job(false, Some(0));
        assert!(!should_run_job(&j, RunMode::Due, 5_000));
    }

    #[test]
    fn test_due_when_past_next_run() {
        let j = job(true, Some(1_000));
        assert!(should_run_job(&j, RunMode::Due, 1_000));
        assert!(should_run_job(&j, RunMode::Due, 2_000));
    }

    #[test]
    fn test_not_due_before_next_run() {
        let j = job(true, Some(5_000));
        assert!(!should_run_job(&j, RunMode::Due, 1_000));
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!(RunMode::from_str_opt(Some("force")), RunMode::Force);
        assert_eq!(RunMode::from_str_opt(Some("due")), RunMode::Due);
        assert_eq!(RunMode::from_str_opt(None), RunMode::Due);
    }
}
