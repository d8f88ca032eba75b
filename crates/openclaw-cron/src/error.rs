//! Error taxonomy for the cron subsystem (spec §7).

use thiserror::Error;

/// Errors raised by the scheduler core.
///
/// The RPC Facade (§4.H) maps these onto the wire taxonomy of
/// `invalid_request` / `internal_error`; delivery and not-due outcomes are
/// not exceptions and are modeled as data (`CrontabRunResult`,
/// `CronRunOutcome`) instead.
#[derive(Debug, Error)]
pub enum CronError {
    /// Schema validation failures, missing ids, or an infeasible schedule
    /// (spec §4.A). Maps to RPC `invalid_request`.
    #[error("{0}")]
    InvalidRequest(String),

    /// `crontab(1)` I/O failure or any other unexpected exception. Maps to
    /// RPC `internal_error`.
    #[error("{0}")]
    Internal(String),

    /// The requested job id doesn't exist.
    #[error("job not found: {0}")]
    NotFound(String),
}

impl CronError {
    /// Wire error code per spec §6.
    pub fn code(&self) -> &'static str {
        match self {
            CronError::InvalidRequest(_) => "invalid_request",
            CronError::NotFound(_) => "invalid_request",
            CronError::Internal(_) => "internal_error",
        }
    }
}

impl From<anyhow::Error> for CronError {
    fn from(err: anyhow::Error) -> Self {
        CronError::Internal(err.to_string())
    }
}

pub type CronResult<T> = Result<T, CronError>;
