//! Schedule Resolver (spec §4.A) — turns a `CronSchedule` into a 5-field
//! crontab expression, or rejects it with the spec's literal reason text.

use std::str::FromStr;

use chrono::{DurationRound, TimeZone, Utc};

use crate::error::{CronError, CronResult};
use crate::types::CronSchedule;

/// Resolve a `CronSchedule` into a validated 5-field crontab expression.
///
/// Errors carry the exact reason text called for by spec §4.A / §8
/// scenario 3 (`"every schedule interval is not representable in
/// crontab"` etc.) so that RPC callers can surface it verbatim.
pub fn resolve_cron_expr(schedule: &CronSchedule) -> CronResult<String> {
    match schedule {
        CronSchedule::Cron {
            expr,
            tz,
            stagger_ms,
        } => resolve_cron_kind(expr, tz.as_deref(), *stagger_ms),
        CronSchedule::Every {
            every_ms,
            anchor_ms,
        } => resolve_every_kind(*every_ms, *anchor_ms),
        CronSchedule::At { at } => resolve_at_kind(at),
    }
}

fn resolve_cron_kind(expr: &str, tz: Option<&str>, stagger_ms: Option<i64>) -> CronResult<String> {
    if tz.is_some() {
        return Err(CronError::InvalidRequest(
            "crontab-backed storage rejects per-job timezones".to_string(),
        ));
    }
    if stagger_ms.unwrap_or(0) > 0 {
        return Err(CronError::InvalidRequest(
            "crontab-backed storage rejects staggering".to_string(),
        ));
    }

    let trimmed = expr.trim();
    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    if fields.len() == 6 {
        return Err(CronError::InvalidRequest(
            "cron expression must have exactly 5 fields: no seconds support".to_string(),
        ));
    }
    if fields.len() != 5 {
        return Err(CronError::InvalidRequest(format!(
            "cron expression must have exactly 5 fields, got {}",
            fields.len()
        )));
    }

    validate_cron_expr(trimmed)?;
    Ok(trimmed.to_string())
}

/// Validate via the `cron` crate (already in the dependency stack). The
/// `cron` crate's grammar expects a leading seconds field, so it's
/// prefixed with `0` purely for validation; the stored/emitted expression
/// stays 5-field.
fn validate_cron_expr(expr: &str) -> CronResult<()> {
    let with_seconds = format!("0 {expr}");
    cron::Schedule::from_str(&with_seconds)
        .map(|_| ())
        .map_err(|e| CronError::InvalidRequest(format!("invalid cron expression: {e}")))
}

fn resolve_every_kind(every_ms: i64, anchor_ms: Option<i64>) -> CronResult<String> {
    if anchor_ms.is_some() {
        return Err(CronError::InvalidRequest(
            "crontab-backed storage rejects anchored intervals".to_string(),
        ));
    }
    if every_ms <= 0 || every_ms % 60_000 != 0 {
        return Err(CronError::InvalidRequest(
            "every schedule must be a positive multiple of 60000ms".to_string(),
        ));
    }

    let minutes = every_ms / 60_000;

    if minutes < 60 && 60 % minutes == 0 {
        return Ok(if minutes == 1 {
            "* * * * *".to_string()
        } else {
            format!("*/{minutes} * * * *")
        });
    }

    if minutes % 60 == 0 {
        let hours = minutes / 60;
        if hours < 24 && 24 % hours == 0 {
            return Ok(if hours == 1 {
                "0 * * * *".to_string()
            } else {
                format!("0 */{hours} * * *")
            });
        }

        if hours % 24 == 0 {
            let days = hours / 24;
            if (1..=31).contains(&days) {
                return Ok(format!("0 0 */{days} * *"));
            }
        }
    }

    Err(CronError::InvalidRequest(
        "every schedule interval is not representable in crontab".to_string(),
    ))
}

fn resolve_at_kind(at: &str) -> CronResult<String> {
    let instant = chrono::DateTime::parse_from_rfc3339(at)
        .map_err(|e| CronError::InvalidRequest(format!("invalid at instant: {e}")))?
        .with_timezone(&Utc);

    let rounded = if instant.timestamp_subsec_millis() > 0 || instant.timestamp() % 60 != 0 {
        let truncated = instant
            .duration_trunc(chrono::Duration::minutes(1))
            .map_err(|e| CronError::InvalidRequest(format!("invalid at instant: {e}")))?;
        truncated + chrono::Duration::minutes(1)
    } else {
        instant
    };

    let naive = rounded.naive_utc();
    Ok(format!(
        "{} {} {} {} *",
        naive.format("%-M"),
        naive.format("%-H"),
        naive.format("%-d"),
        naive.format("%-m"),
    ))
}

/// Compute the next occurrence of `expr` at or after `from`, used to fill
/// `state.nextRunAtMs` (spec §4.B, §4.H).
pub fn next_occurrence_ms(expr: &str, from_ms: i64) -> Option<i64> {
    let with_seconds = format!("0 {expr}");
    let schedule = cron::Schedule::from_str(&with_seconds).ok()?;
    let from = Utc.timestamp_millis_opt(from_ms).single()?;
    schedule.after(&from).next().map(|dt| dt.timestamp_millis())
}

/// Pure helper standing in for the external `computeJobNextRunAtMs` named
/// in spec §4.B: resolve `schedule` to an expression and find its next
/// occurrence at or after `now_ms`. Returns `None` for an infeasible
/// schedule rather than erroring — callers (the Codec) treat a decoded
/// job's `nextRunAtMs` as best-effort.
pub fn compute_job_next_run_at_ms(schedule: &CronSchedule, now_ms: i64) -> Option<i64> {
    let expr = resolve_cron_expr(schedule).ok()?;
    next_occurrence_ms(&expr, now_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every(ms: i64) -> CronSchedule {
        CronSchedule::Every {
            every_ms: ms,
            anchor_ms: None,
        }
    }

    #[test]
    fn test_every_minute() {
        assert_eq!(resolve_cron_expr(&every(60_000)).unwrap(), "* * * * *");
    }

    #[test]
    fn test_every_five_minutes() {
        assert_eq!(resolve_cron_expr(&every(300_000)).unwrap(), "*/5 * * * *");
    }

    #[test]
    fn test_every_hour() {
        assert_eq!(resolve_cron_expr(&every(3_600_000)).unwrap(), "0 * * * *");
    }

    #[test]
    fn test_every_rejects_non_divisor() {
        let err = resolve_cron_expr(&every(90_000)).unwrap_err();
        assert!(matches!(err, CronError::InvalidRequest(_)));
    }

    #[test]
    fn test_every_rejects_sub_minute() {
        let err = resolve_cron_expr(&every(59_000)).unwrap_err();
        assert!(matches!(err, CronError::InvalidRequest(_)));
    }

    #[test]
    fn test_every_rejects_unrepresentable_interval_message() {
        // 25 hours: not a day multiple of <=31, not an hour divisor of 24.
        let err = resolve_cron_expr(&every(25 * 3_600_000)).unwrap_err();
        match err {
            CronError::InvalidRequest(msg) => {
                assert_eq!(msg, "every schedule interval is not representable in crontab");
            }
            _ => panic!("expected InvalidRequest"),
        }
    }

    #[test]
    fn test_cron_kind_rejects_bad_field_count() {
        let schedule = CronSchedule::Cron {
            expr: "* * * *".to_string(),
            tz: None,
            stagger_ms: None,
        };
        assert!(resolve_cron_expr(&schedule).is_err());
    }

    #[test]
    fn test_cron_kind_rejects_six_fields_with_distinct_message() {
        let schedule = CronSchedule::Cron {
            expr: "* * * * * *".to_string(),
            tz: None,
            stagger_ms: None,
        };
        let err = resolve_cron_expr(&schedule).unwrap_err();
        match err {
            CronError::InvalidRequest(msg) => assert!(msg.contains("no seconds support")),
            _ => panic!("expected InvalidRequest"),
        }
    }

    #[test]
    fn test_cron_kind_rejects_tz() {
        let schedule = CronSchedule::Cron {
            expr: "* * * * *".to_string(),
            tz: Some("America/New_York".to_string()),
            stagger_ms: None,
        };
        assert!(resolve_cron_expr(&schedule).is_err());
    }

    #[test]
    fn test_at_kind_rounds_up_to_next_minute() {
        let schedule = CronSchedule::At {
            at: "2030-06-15T12:34:56.500Z".to_string(),
        };
        assert_eq!(resolve_cron_expr(&schedule).unwrap(), "35 12 15 6 *");
    }

    #[test]
    fn test_at_kind_exact_minute_not_rounded() {
        let schedule = CronSchedule::At {
            at: "2030-06-15T12:34:00Z".to_string(),
        };
        assert_eq!(resolve_cron_expr(&schedule).unwrap(), "34 12 15 6 *");
    }
}
