//! Crontab Codec (spec §4.B) — encodes/decodes `CronJob`s as tagged
//! crontab lines, preserving every unrelated line untouched.
//!
//! Grounded in the managed-line-filtering approach of
//! `other_examples/e93d0c65_Jlowzow-gsd-cron__src-crontab.rs.rs`
//! (`remove_project_entries`): lines carrying our tag are the only ones
//! ever removed or rewritten; everything else passes through.

use std::collections::BTreeMap;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::warn;

use crate::schedule::compute_job_next_run_at_ms;
use crate::types::{
    CronDelivery, CronJob, CronJobState, CronPayload, CronSchedule, DeliveryMode, SessionTarget,
    WakeMode,
};

/// The literal marker that makes a line ours (spec §4.B).
pub const TAG: &str = "# openclaw:cron";

/// The run-command marker on execution lines (spec §6).
pub const RUN_MARKER: &str = "openclaw cron run";

/// Characters percent-encoded in metadata values (spec §9): whitespace,
/// `#`, `=`, control characters, and `%` itself (so decoding is
/// unambiguous).
const METADATA_ASCII_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'#')
    .add(b'=')
    .add(b'%')
    .add(b'\n')
    .add(b'\r')
    .add(b'\t');

fn encode_value(value: &str) -> String {
    utf8_percent_encode(value, METADATA_ASCII_SET).to_string()
}

fn decode_value(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().to_string()
}

/// Result of decoding the crontab: the jobs we understood, the unrelated
/// lines to preserve verbatim, and any rows we had to skip.
#[derive(Debug, Default)]
pub struct CrontabSnapshot {
    pub jobs: Vec<CronJob>,
    pub unmanaged_lines: Vec<String>,
    pub errors: Vec<String>,
}

/// Encode a set of jobs into tagged crontab lines (spec §4.B "Encoding").
pub fn encode_jobs(jobs: &[CronJob]) -> Vec<String> {
    let mut lines = Vec::new();
    for job in jobs {
        lines.extend(encode_job(job));
    }
    lines
}

fn encode_job(job: &CronJob) -> Vec<String> {
    let mut lines = Vec::new();
    let id = &job.id;

    lines.push(encode_base_line(job));
    lines.push(encode_payload_line(id, &job.payload));
    if let Some(delivery) = &job.delivery {
        lines.push(encode_delivery_line(id, delivery));
    }
    lines.push(encode_schedule_line(id, &job.schedule));

    let tz = schedule_tz(&job.schedule);
    if let Some(tz) = tz {
        lines.push(format!("CRON_TZ={tz}"));
    }

    let expr = crate::schedule::resolve_cron_expr(&job.schedule)
        .unwrap_or_else(|_| "* * * * *".to_string());
    let exec = format!(
        "{expr} {RUN_MARKER} {id} {TAG} id={}",
        encode_value(id)
    );
    lines.push(if job.enabled {
        exec
    } else {
        format!("# {exec}")
    });

    if tz.is_some() {
        lines.push("CRON_TZ=".to_string());
    }

    lines
}

fn schedule_tz(schedule: &CronSchedule) -> Option<&str> {
    match schedule {
        CronSchedule::Cron { tz, .. } => tz.as_deref(),
        _ => None,
    }
}

fn encode_base_line(job: &CronJob) -> String {
    // `enabled` is recorded here but frozen at `true`: per spec §8's
    // disable-semantics invariant, toggling a job changes only the
    // exec line's leading `# `, never the metadata. Live enabled state
    // is derived from that prefix on decode, not from this field.
    let mut kv: Vec<(String, String)> = vec![
        ("id".into(), job.id.clone()),
        ("name".into(), job.name.clone()),
        ("enabled".into(), "true".to_string()),
        (
            "session_target".into(),
            match job.session_target {
                SessionTarget::Main => "main".into(),
                SessionTarget::Isolated => "isolated".into(),
            },
        ),
        (
            "wake_mode".into(),
            match job.wake_mode {
                WakeMode::Now => "now".into(),
                WakeMode::NextHeartbeat => "next-heartbeat".into(),
            },
        ),
        ("created_at_ms".into(), job.created_at_ms.to_string()),
        ("updated_at_ms".into(), job.updated_at_ms.to_string()),
    ];
    if let Some(d) = &job.description {
        kv.push(("description".into(), d.clone()));
    }
    if let Some(a) = &job.agent_id {
        kv.push(("agent_id".into(), a.clone()));
    }
    if let Some(s) = &job.session_key {
        kv.push(("session_key".into(), s.clone()));
    }
    if let Some(d) = job.delete_after_run {
        kv.push(("delete_after_run".into(), d.to_string()));
    }
    render_tag_line(&kv)
}

fn encode_payload_line(id: &str, payload: &CronPayload) -> String {
    let mut kv: Vec<(String, String)> = vec![("id".into(), id.to_string())];
    match payload {
        CronPayload::SystemEvent { text } => {
            kv.push(("payload_kind".into(), "systemEvent".into()));
            kv.push(("payload_text".into(), text.clone()));
        }
        CronPayload::AgentTurn {
            message,
            model,
            thinking,
            timeout_seconds,
            allow_unsafe_external_content,
            deliver,
            channel,
            to,
            best_effort_deliver,
        } => {
            kv.push(("payload_kind".into(), "agentTurn".into()));
            kv.push(("payload_message".into(), message.clone()));
            if let Some(v) = model {
                kv.push(("payload_model".into(), v.clone()));
            }
            if let Some(v) = thinking {
                kv.push(("payload_thinking".into(), v.to_string()));
            }
            if let Some(v) = timeout_seconds {
                kv.push(("payload_timeout_seconds".into(), v.to_string()));
            }
            if let Some(v) = allow_unsafe_external_content {
                kv.push((
                    "payload_allow_unsafe_external_content".into(),
                    v.to_string(),
                ));
            }
            if let Some(v) = deliver {
                kv.push(("payload_deliver".into(), v.to_string()));
            }
            if let Some(v) = channel {
                kv.push(("payload_channel".into(), v.clone()));
            }
            if let Some(v) = to {
                kv.push(("payload_to".into(), v.clone()));
            }
            if let Some(v) = best_effort_deliver {
                kv.push(("payload_best_effort_deliver".into(), v.to_string()));
            }
        }
    }
    render_tag_line(&kv)
}

fn encode_delivery_line(id: &str, delivery: &CronDelivery) -> String {
    let mut kv: Vec<(String, String)> = vec![("id".into(), id.to_string())];
    kv.push((
        "delivery_mode".into(),
        match delivery.mode {
            DeliveryMode::None => "none".into(),
            DeliveryMode::Announce => "announce".into(),
            DeliveryMode::Webhook => "webhook".into(),
        },
    ));
    if let Some(v) = &delivery.channel {
        kv.push(("delivery_channel".into(), v.clone()));
    }
    if let Some(v) = &delivery.to {
        kv.push(("delivery_to".into(), v.clone()));
    }
    if let Some(v) = delivery.best_effort {
        kv.push(("delivery_best_effort".into(), v.to_string()));
    }
    render_tag_line(&kv)
}

fn encode_schedule_line(id: &str, schedule: &CronSchedule) -> String {
    let mut kv: Vec<(String, String)> = vec![("id".into(), id.to_string())];
    match schedule {
        CronSchedule::Cron {
            expr,
            tz,
            stagger_ms,
        } => {
            kv.push(("schedule_kind".into(), "cron".into()));
            kv.push(("schedule_expr".into(), expr.clone()));
            if let Some(v) = tz {
                kv.push(("schedule_tz".into(), v.clone()));
            }
            if let Some(v) = stagger_ms {
                kv.push(("schedule_stagger_ms".into(), v.to_string()));
            }
        }
        CronSchedule::Every {
            every_ms,
            anchor_ms,
        } => {
            kv.push(("schedule_kind".into(), "every".into()));
            kv.push(("schedule_every_ms".into(), every_ms.to_string()));
            if let Some(v) = anchor_ms {
                kv.push(("schedule_anchor_ms".into(), v.to_string()));
            }
        }
        CronSchedule::At { at } => {
            kv.push(("schedule_kind".into(), "at".into()));
            kv.push(("schedule_at".into(), at.clone()));
        }
    }
    render_tag_line(&kv)
}

fn render_tag_line(kv: &[(String, String)]) -> String {
    let pairs: Vec<String> = kv
        .iter()
        .map(|(k, v)| format!("{k}={}", encode_value(v)))
        .collect();
    format!("{TAG} {}", pairs.join(" "))
}

/// Decode the current crontab content into a `CrontabSnapshot` (spec §4.B
/// "Decoding"). `now_ms` is used to recompute `state.nextRunAtMs`.
pub fn decode_crontab(lines: &[String], now_ms: i64) -> CrontabSnapshot {
    let mut metadata: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    let mut exec_exprs: BTreeMap<String, (String, bool)> = BTreeMap::new();
    let mut exec_tz: BTreeMap<String, String> = BTreeMap::new();
    let mut unmanaged = Vec::new();

    let mut prev_tz: Option<String> = None;

    for raw in lines {
        let line = raw.as_str();

        if let Some(tz) = line.strip_prefix("CRON_TZ=") {
            prev_tz = if tz.is_empty() {
                None
            } else {
                Some(tz.to_string())
            };
            continue;
        }

        if !line.contains(TAG) {
            unmanaged.push(raw.clone());
            prev_tz = None;
            continue;
        }

        let is_exec = line.contains(RUN_MARKER);
        let after_hash = line.trim_start().strip_prefix('#').unwrap_or(line);
        let disabled_exec = is_exec && line.trim_start().starts_with('#');

        let kv_section = if is_exec {
            // Exec line: tag + kv appear *after* the run-command; find the
            // tag occurrence and parse kv from there.
            match line.find(TAG) {
                Some(idx) => &line[idx + TAG.len()..],
                None => "",
            }
        } else {
            after_hash
                .trim_start()
                .strip_prefix(TAG.trim_start_matches('#').trim())
                .unwrap_or(after_hash)
        };

        let kv = parse_kv(kv_section);
        let Some(id) = kv.get("id").cloned() else {
            unmanaged.push(raw.clone());
            prev_tz = None;
            continue;
        };

        if is_exec {
            let tokens: Vec<&str> = line
                .trim_start_matches(['#', ' '])
                .split_whitespace()
                .collect();
            if tokens.len() >= 5 {
                let expr = tokens[..5].join(" ");
                exec_exprs.insert(id.clone(), (expr, disabled_exec));
                if let Some(tz) = &prev_tz {
                    exec_tz.insert(id.clone(), tz.clone());
                }
            } else {
                unmanaged.push(raw.clone());
            }
        } else {
            let entry = metadata.entry(id).or_default();
            for (k, v) in kv {
                if k != "id" {
                    entry.insert(k, v);
                }
            }
        }

        prev_tz = None;
    }

    let mut jobs = Vec::new();
    let mut errors = Vec::new();

    for (id, (expr, disabled)) in &exec_exprs {
        let Some(meta) = metadata.get(id) else {
            errors.push(format!("job {id}: missing metadata for execution line"));
            continue;
        };

        match build_job(id, *disabled, expr, exec_tz.get(id).map(|s| s.as_str()), meta, now_ms) {
            Ok(job) => jobs.push(job),
            Err(e) => {
                warn!(job_id = %id, error = %e, "skipping unparsable cron job");
                errors.push(format!("job {id}: {e}"));
            }
        }
    }

    CrontabSnapshot {
        jobs,
        unmanaged_lines: unmanaged,
        errors,
    }
}

fn parse_kv(section: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for token in section.split_whitespace() {
        if let Some((k, v)) = token.split_once('=') {
            out.insert(k.to_string(), decode_value(v));
        }
    }
    out
}

fn build_job(
    id: &str,
    disabled: bool,
    exec_expr: &str,
    exec_tz: Option<&str>,
    meta: &BTreeMap<String, String>,
    now_ms: i64,
) -> Result<CronJob, String> {
    let name = meta
        .get("name")
        .cloned()
        .ok_or_else(|| "missing name".to_string())?;
    let enabled = !disabled;
    let created_at_ms: i64 = meta
        .get("created_at_ms")
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| "missing created_at_ms".to_string())?;
    let updated_at_ms: i64 = meta
        .get("updated_at_ms")
        .and_then(|s| s.parse().ok())
        .unwrap_or(created_at_ms);

    let session_target = match meta.get("session_target").map(|s| s.as_str()) {
        Some("isolated") => SessionTarget::Isolated,
        _ => SessionTarget::Main,
    };
    let wake_mode = match meta.get("wake_mode").map(|s| s.as_str()) {
        Some("next-heartbeat") => WakeMode::NextHeartbeat,
        _ => WakeMode::Now,
    };

    let schedule = build_schedule(meta, exec_expr, exec_tz);
    let payload = build_payload(meta)?;
    let delivery = build_delivery(meta);

    let next_run_at_ms = if enabled {
        compute_job_next_run_at_ms(&schedule, now_ms)
    } else {
        None
    };

    Ok(CronJob {
        id: id.to_string(),
        name,
        description: meta.get("description").cloned(),
        enabled,
        agent_id: meta.get("agent_id").cloned(),
        session_key: meta.get("session_key").cloned(),
        delete_after_run: meta.get("delete_after_run").map(|s| s == "true"),
        created_at_ms,
        updated_at_ms,
        schedule,
        session_target,
        wake_mode,
        payload,
        delivery,
        state: CronJobState { next_run_at_ms },
    })
}

fn build_schedule(
    meta: &BTreeMap<String, String>,
    exec_expr: &str,
    exec_tz: Option<&str>,
) -> CronSchedule {
    match meta.get("schedule_kind").map(|s| s.as_str()) {
        Some("every") => CronSchedule::Every {
            every_ms: meta
                .get("schedule_every_ms")
                .and_then(|s| s.parse().ok())
                .unwrap_or(60_000),
            anchor_ms: meta.get("schedule_anchor_ms").and_then(|s| s.parse().ok()),
        },
        Some("at") => CronSchedule::At {
            at: meta
                .get("schedule_at")
                .cloned()
                .unwrap_or_else(|| exec_expr.to_string()),
        },
        _ => CronSchedule::Cron {
            expr: meta
                .get("schedule_expr")
                .cloned()
                .unwrap_or_else(|| exec_expr.to_string()),
            tz: meta
                .get("schedule_tz")
                .cloned()
                .or_else(|| exec_tz.map(|s| s.to_string())),
            stagger_ms: meta.get("schedule_stagger_ms").and_then(|s| s.parse().ok()),
        },
    }
}

fn build_payload(meta: &BTreeMap<String, String>) -> Result<CronPayload, String> {
    match meta.get("payload_kind").map(|s| s.as_str()) {
        Some("agentTurn") => {
            let message = meta
                .get("payload_message")
                .cloned()
                .ok_or_else(|| "agentTurn payload missing message".to_string())?;
            Ok(CronPayload::AgentTurn {
                message,
                model: meta.get("payload_model").cloned(),
                thinking: meta.get("payload_thinking").map(|s| s == "true"),
                timeout_seconds: meta
                    .get("payload_timeout_seconds")
                    .and_then(|s| s.parse().ok()),
                allow_unsafe_external_content: meta
                    .get("payload_allow_unsafe_external_content")
                    .map(|s| s == "true"),
                deliver: meta.get("payload_deliver").map(|s| s == "true"),
                channel: meta.get("payload_channel").cloned(),
                to: meta.get("payload_to").cloned(),
                best_effort_deliver: meta
                    .get("payload_best_effort_deliver")
                    .map(|s| s == "true"),
            })
        }
        _ => Ok(CronPayload::SystemEvent {
            text: meta.get("payload_text").cloned().unwrap_or_default(),
        }),
    }
}

fn build_delivery(meta: &BTreeMap<String, String>) -> Option<CronDelivery> {
    let mode = match meta.get("delivery_mode").map(|s| s.as_str()) {
        Some("webhook") => DeliveryMode::Webhook,
        Some("announce") => DeliveryMode::Announce,
        Some("none") => DeliveryMode::None,
        _ => return None,
    };
    Some(CronDelivery {
        mode,
        channel: meta.get("delivery_channel").cloned(),
        to: meta.get("delivery_to").cloned(),
        best_effort: meta.get("delivery_best_effort").map(|s| s == "true"),
    })
}

/// Render a full crontab document for `jobs`, preserving `unmanaged_lines`
/// (spec §4.B "Writing").
pub fn render_crontab(unmanaged_lines: &[String], jobs: &[CronJob]) -> String {
    let mut body = unmanaged_lines.join("\n");
    let encoded = encode_jobs(jobs);

    if !encoded.is_empty() {
        if !body.trim().is_empty() {
            body.push('\n');
        }
        body.push('\n');
        body.push_str(&encoded.join("\n"));
    }

    body.push('\n');
    collapse_blank_runs(&body)
}

/// Collapse runs of 3+ newlines down to 2 (spec §4.B "Writing").
fn collapse_blank_runs(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut newline_run = 0;
    for c in content.chars() {
        if c == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                out.push(c);
            }
        } else {
            newline_run = 0;
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CronJob;

    fn sample_job(id: &str) -> CronJob {
        CronJob {
            id: id.to_string(),
            name: "ping".to_string(),
            description: None,
            enabled: true,
            agent_id: None,
            session_key: None,
            delete_after_run: None,
            created_at_ms: 1_000,
            updated_at_ms: 1_000,
            schedule: CronSchedule::Cron {
                expr: "*/5 * * * *".to_string(),
                tz: None,
                stagger_ms: None,
            },
            session_target: SessionTarget::Main,
            wake_mode: WakeMode::Now,
            payload: CronPayload::SystemEvent {
                text: "wake up".to_string(),
            },
            delivery: None,
            state: CronJobState::default(),
        }
    }

    fn to_lines(s: &str) -> Vec<String> {
        s.lines().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let job = sample_job("job-1");
        let encoded = encode_jobs(&[job.clone()]);
        let snapshot = decode_crontab(&encoded, 2_000);

        assert_eq!(snapshot.jobs.len(), 1);
        let decoded = &snapshot.jobs[0];
        assert_eq!(decoded.id, job.id);
        assert_eq!(decoded.name, job.name);
        assert_eq!(decoded.schedule, job.schedule);
        assert_eq!(decoded.payload, job.payload);
        assert_eq!(decoded.session_target, job.session_target);
        assert_eq!(decoded.wake_mode, job.wake_mode);
        assert_eq!(decoded.enabled, job.enabled);
    }

    #[test]
    fn test_disable_toggle_only_changes_exec_prefix() {
        let mut job = sample_job("job-2");
        let enabled_lines = encode_jobs(&[job.clone()]);

        job.enabled = false;
        let disabled_lines = encode_jobs(&[job.clone()]);

        let metadata_enabled: Vec<&String> =
            enabled_lines.iter().filter(|l| !l.contains(RUN_MARKER)).collect();
        let metadata_disabled: Vec<&String> =
            disabled_lines.iter().filter(|l| !l.contains(RUN_MARKER)).collect();
        assert_eq!(metadata_enabled, metadata_disabled);

        let exec_disabled = disabled_lines
            .iter()
            .find(|l| l.contains(RUN_MARKER))
            .unwrap();
        assert!(exec_disabled.starts_with("# "));
    }

    #[test]
    fn test_unmanaged_lines_preserved() {
        let seeded = vec!["0 3 * * * /usr/bin/backup.sh".to_string()];
        let rendered = render_crontab(&seeded, &[]);
        assert!(rendered.contains("0 3 * * * /usr/bin/backup.sh"));
        assert!(!rendered.contains(TAG));
    }

    #[test]
    fn test_preservation_property() {
        let seeded = to_lines("0 3 * * * /usr/bin/backup.sh\n30 4 * * 1 /usr/bin/weekly.sh");
        let job = sample_job("job-3");
        let rendered = render_crontab(&seeded, &[job]);
        for line in &seeded {
            assert!(rendered.contains(line.as_str()));
        }
    }

    #[test]
    fn test_idempotent_write_read_cycle() {
        let job = sample_job("job-4");
        let rendered = render_crontab(&[], &[job]);
        let lines = to_lines(&rendered);
        let snapshot1 = decode_crontab(&lines, 5_000);

        let rendered2 = render_crontab(&snapshot1.unmanaged_lines, &snapshot1.jobs);
        let lines2 = to_lines(&rendered2);
        let snapshot2 = decode_crontab(&lines2, 5_000);

        assert_eq!(snapshot1.jobs.len(), snapshot2.jobs.len());
        assert_eq!(snapshot1.jobs[0].id, snapshot2.jobs[0].id);
        assert_eq!(snapshot1.jobs[0].schedule, snapshot2.jobs[0].schedule);
    }

    #[test]
    fn test_collapse_blank_runs() {
        let input = "a\n\n\n\n\nb";
        assert_eq!(collapse_blank_runs(input), "a\n\nb");
    }

    #[test]
    fn test_percent_encoding_round_trips_special_chars() {
        let mut job = sample_job("job-5");
        job.name = "daily # report = check".to_string();
        let encoded = encode_jobs(&[job.clone()]);
        assert!(!encoded[0].contains("daily # report"));

        let snapshot = decode_crontab(&encoded, 6_000);
        assert_eq!(snapshot.jobs[0].name, "daily # report = check");
    }

    #[test]
    fn test_agent_turn_payload_round_trips() {
        let mut job = sample_job("job-6");
        job.session_target = SessionTarget::Isolated;
        job.payload = CronPayload::AgentTurn {
            message: "summarize inbox".to_string(),
            model: Some("claude-opus".to_string()),
            thinking: Some(true),
            timeout_seconds: Some(120),
            allow_unsafe_external_content: None,
            deliver: Some(true),
            channel: None,
            to: None,
            best_effort_deliver: Some(false),
        };

        let encoded = encode_jobs(&[job.clone()]);
        let snapshot = decode_crontab(&encoded, 7_000);
        assert_eq!(snapshot.jobs[0].payload, job.payload);
    }
}
