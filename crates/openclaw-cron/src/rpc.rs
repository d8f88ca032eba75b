//! RPC Facade (spec §4.H) — validates parameters and routes
//! list/status/add/update/remove/run/runs to the Codec, Gate, and
//! Dispatcher; also exposes `scheduler.status`.

use std::process::Command;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use openclaw_core::config::CronConfig;

use crate::codec::{decode_crontab, render_crontab};
use crate::crontab_io::CrontabIo;
use crate::dispatcher::Dispatcher;
use crate::error::{CronError, CronResult};
use crate::gate::RunMode;
use crate::history::read_run_history;
use crate::schedule::resolve_cron_expr;
use crate::types::{
    CronDelivery, CronJob, CronJobCreate, CronJobPatch, CronPayload, CronRunLogEntry,
    CrontabRunResult, DeliveryMode,
};

/// Everything `cron.*` RPC handlers need: crontab I/O, the job
/// dispatcher, and the cron-scoped config (spec §4.E input `cfg`).
pub struct CronFacade {
    pub io: Arc<dyn CrontabIo>,
    pub dispatcher: Dispatcher,
    pub cfg: CronConfig,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub enabled: Option<String>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_dir: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult {
    pub jobs: Vec<CronJob>,
    pub meta: ListMeta,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    pub enabled: bool,
    pub jobs: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunsResult {
    pub entries: Vec<CronRunLogEntry>,
    pub total: usize,
    pub has_more: bool,
    pub next_offset: Option<usize>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatusResult {
    pub crontab: Result<String, String>,
    pub timers: Result<String, String>,
    pub units: Result<String, String>,
}

impl CronFacade {
    pub fn new(io: Arc<dyn CrontabIo>, dispatcher: Dispatcher, cfg: CronConfig) -> Self {
        Self { io, dispatcher, cfg }
    }

    async fn read_snapshot(&self, now_ms: i64) -> CronResult<crate::codec::CrontabSnapshot> {
        let lines = self.io.read().await?;
        Ok(decode_crontab(&lines, now_ms))
    }

    async fn write_jobs(&self, unmanaged: &[String], jobs: &[CronJob]) -> CronResult<()> {
        // Defense in depth (spec §9 "Shell injection"): ids are
        // server-generated UUIDs and so always pass this check, but the
        // codec places `id` on the execution line verbatim and a future
        // caller that bypasses `add`/`update` should not be able to slip
        // shell metacharacters onto the crontab.
        for job in jobs {
            if !openclaw_core::utils::is_safe_cron_id(&job.id) {
                return Err(CronError::Internal(format!(
                    "refusing to write job with unsafe id: {}",
                    job.id
                )));
            }
        }

        let content = render_crontab(unmanaged, jobs);
        self.io.write(&content).await
    }

    pub async fn list(&self, params: ListParams, now_ms: i64) -> CronResult<ListResult> {
        let snapshot = self.read_snapshot(now_ms).await?;
        let mut jobs = snapshot.jobs;

        if let Some(query) = &params.query {
            let q = query.to_lowercase();
            jobs.retain(|j| j.name.to_lowercase().contains(&q));
        }
        match params.enabled.as_deref() {
            Some("enabled") => jobs.retain(|j| j.enabled),
            Some("disabled") => jobs.retain(|j| !j.enabled),
            _ => {}
        }

        let sort_dir_desc = matches!(params.sort_dir.as_deref(), Some("desc"));
        match params.sort_by.as_deref() {
            Some("name") => jobs.sort_by(|a, b| a.name.cmp(&b.name)),
            Some("updatedAtMs") => jobs.sort_by_key(|j| j.updated_at_ms),
            _ => jobs.sort_by_key(|j| j.state.next_run_at_ms.unwrap_or(i64::MAX)),
        }
        if sort_dir_desc {
            jobs.reverse();
        }

        let total = jobs.len();
        let limit = params.limit.unwrap_or(50);
        let offset = params.offset.unwrap_or(0);
        let page: Vec<CronJob> = jobs.into_iter().skip(offset).take(limit).collect();

        Ok(ListResult {
            jobs: page,
            meta: ListMeta {
                total,
                limit,
                offset,
            },
        })
    }

    pub async fn status(&self, now_ms: i64) -> CronResult<StatusResult> {
        let snapshot = self.read_snapshot(now_ms).await?;
        Ok(StatusResult {
            enabled: !snapshot.jobs.is_empty(),
            jobs: snapshot.jobs.len(),
        })
    }

    pub async fn add(&self, create: CronJobCreate, now_ms: i64) -> CronResult<CronJob> {
        validate_session_payload_pairing(&create.session_target, &create.payload)?;
        resolve_cron_expr(&create.schedule)?;

        let snapshot = self.read_snapshot(now_ms).await?;
        let mut jobs = snapshot.jobs;

        let next_run_at_ms = if create.enabled {
            crate::schedule::compute_job_next_run_at_ms(&create.schedule, now_ms)
        } else {
            None
        };

        let job = CronJob {
            id: CronJob::new_id(),
            name: create.name,
            description: create.description,
            enabled: create.enabled,
            agent_id: create.agent_id,
            session_key: create.session_key,
            delete_after_run: create.delete_after_run,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            schedule: create.schedule,
            session_target: create.session_target,
            wake_mode: create.wake_mode,
            payload: create.payload,
            delivery: create.delivery,
            state: crate::types::CronJobState { next_run_at_ms },
        };

        jobs.push(job.clone());
        self.write_jobs(&snapshot.unmanaged_lines, &jobs).await?;
        Ok(job)
    }

    pub async fn update(
        &self,
        id: &str,
        patch: CronJobPatch,
        now_ms: i64,
    ) -> CronResult<CronJob> {
        let snapshot = self.read_snapshot(now_ms).await?;
        let mut jobs = snapshot.jobs;

        let idx = jobs
            .iter()
            .position(|j| j.id == id)
            .ok_or_else(|| CronError::NotFound(id.to_string()))?;

        if let Some(new_payload) = &patch.payload {
            if new_payload.kind() != jobs[idx].payload.kind() {
                return Err(CronError::InvalidRequest(
                    "update patch payload.kind must match the job's existing payload kind"
                        .to_string(),
                ));
            }
        }

        apply_patch(&mut jobs[idx], patch, now_ms)?;
        resolve_cron_expr(&jobs[idx].schedule)?;
        jobs[idx].state.next_run_at_ms = if jobs[idx].enabled {
            crate::schedule::compute_job_next_run_at_ms(&jobs[idx].schedule, now_ms)
        } else {
            None
        };

        let updated = jobs[idx].clone();
        self.write_jobs(&snapshot.unmanaged_lines, &jobs).await?;
        Ok(updated)
    }

    pub async fn remove(&self, id: &str, now_ms: i64) -> CronResult<bool> {
        let snapshot = self.read_snapshot(now_ms).await?;
        let before = snapshot.jobs.len();
        let jobs: Vec<CronJob> = snapshot
            .jobs
            .into_iter()
            .filter(|j| j.id != id)
            .collect();
        let removed = jobs.len() != before;
        self.write_jobs(&snapshot.unmanaged_lines, &jobs).await?;
        Ok(removed)
    }

    pub async fn run(&self, id: &str, mode: RunMode, now_ms: i64) -> CronResult<CrontabRunResult> {
        let snapshot = self.read_snapshot(now_ms).await?;
        let mut jobs = snapshot.jobs;
        let idx = jobs
            .iter()
            .position(|j| j.id == id)
            .ok_or_else(|| CronError::NotFound(id.to_string()))?;

        let result = self
            .dispatcher
            .dispatch(&self.cfg, &jobs[idx], mode, now_ms)
            .await;

        let is_at_schedule = matches!(jobs[idx].schedule, crate::types::CronSchedule::At { .. });
        let delete_after_run = jobs[idx].delete_after_run.unwrap_or(false);
        let ran = matches!(result, CrontabRunResult::Ran { ran: true, .. });

        if is_at_schedule && delete_after_run && ran {
            jobs.remove(idx);
        }

        self.write_jobs(&snapshot.unmanaged_lines, &jobs).await?;
        Ok(result)
    }

    pub async fn runs(&self, id: &str, limit: usize) -> CronResult<RunsResult> {
        let entries = read_run_history(id, limit);
        let total = entries.len();
        Ok(RunsResult {
            entries,
            total,
            has_more: false,
            next_offset: None,
        })
    }

    pub async fn scheduler_status(&self) -> SchedulerStatusResult {
        SchedulerStatusResult {
            crontab: run_capture("crontab", &["-l"]),
            timers: run_capture("systemctl", &["--user", "list-timers"]),
            units: run_capture("systemctl", &["--user", "list-units"]),
        }
    }
}

fn validate_session_payload_pairing(
    session_target: &crate::types::SessionTarget,
    payload: &crate::types::CronPayload,
) -> CronResult<()> {
    use crate::types::SessionTarget::*;
    match (session_target, payload.kind()) {
        (Main, "systemEvent") | (Isolated, "agentTurn") => Ok(()),
        _ => Err(CronError::InvalidRequest(
            "sessionTarget and payload.kind must be paired (main+systemEvent or isolated+agentTurn)"
                .to_string(),
        )),
    }
}

fn apply_patch(job: &mut CronJob, patch: CronJobPatch, now_ms: i64) -> CronResult<()> {
    if let Some(v) = patch.name {
        job.name = v;
    }
    if let Some(v) = patch.description {
        job.description = Some(v);
    }
    if let Some(v) = patch.enabled {
        job.enabled = v;
    }
    if let Some(v) = patch.agent_id {
        job.agent_id = Some(v);
    }
    if let Some(v) = patch.session_key {
        job.session_key = Some(v);
    }
    if let Some(v) = patch.delete_after_run {
        job.delete_after_run = Some(v);
    }
    if let Some(v) = patch.schedule {
        job.schedule = v;
    }
    if let Some(v) = patch.session_target {
        job.session_target = v;
    }
    if let Some(v) = patch.wake_mode {
        job.wake_mode = v;
    }
    if let Some(v) = patch.payload {
        merge_payload(&mut job.payload, v);
    }
    if let Some(v) = patch.delivery {
        merge_delivery(&mut job.delivery, v);
    }

    validate_session_payload_pairing(&job.session_target, &job.payload)?;
    job.updated_at_ms = now_ms;
    Ok(())
}

/// Merge a `CronPayloadPatch` onto `existing` field-by-field (spec §4.H /
/// §6: "payload ... merge shallowly"). The caller (`update`) has already
/// rejected a kind mismatch, so the variants here always line up.
fn merge_payload(existing: &mut CronPayload, patch: crate::types::CronPayloadPatch) {
    use crate::types::CronPayloadPatch;
    match (existing, patch) {
        (CronPayload::SystemEvent { text }, CronPayloadPatch::SystemEvent { text: patch_text }) => {
            if let Some(v) = patch_text {
                *text = v;
            }
        }
        (
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
            },
            CronPayloadPatch::AgentTurn {
                message: p_message,
                model: p_model,
                thinking: p_thinking,
                timeout_seconds: p_timeout_seconds,
                allow_unsafe_external_content: p_allow_unsafe_external_content,
                deliver: p_deliver,
                channel: p_channel,
                to: p_to,
                best_effort_deliver: p_best_effort_deliver,
            },
        ) => {
            if let Some(v) = p_message {
                *message = v;
            }
            if p_model.is_some() {
                *model = p_model;
            }
            if p_thinking.is_some() {
                *thinking = p_thinking;
            }
            if p_timeout_seconds.is_some() {
                *timeout_seconds = p_timeout_seconds;
            }
            if p_allow_unsafe_external_content.is_some() {
                *allow_unsafe_external_content = p_allow_unsafe_external_content;
            }
            if p_deliver.is_some() {
                *deliver = p_deliver;
            }
            if p_channel.is_some() {
                *channel = p_channel;
            }
            if p_to.is_some() {
                *to = p_to;
            }
            if p_best_effort_deliver.is_some() {
                *best_effort_deliver = p_best_effort_deliver;
            }
        }
        _ => unreachable!("payload kind mismatch already rejected by the caller"),
    }
}

/// Merge a `CronDeliveryPatch` onto `existing` field-by-field (spec §4.H
/// / §6: "delivery ... merge shallowly"), creating a delivery block from
/// `DeliveryMode::None` if the job had none yet.
fn merge_delivery(existing: &mut Option<CronDelivery>, patch: crate::types::CronDeliveryPatch) {
    let current = existing.get_or_insert(CronDelivery {
        mode: DeliveryMode::None,
        channel: None,
        to: None,
        best_effort: None,
    });
    if let Some(v) = patch.mode {
        current.mode = v;
    }
    if patch.channel.is_some() {
        current.channel = patch.channel;
    }
    if patch.to.is_some() {
        current.to = patch.to;
    }
    if patch.best_effort.is_some() {
        current.best_effort = patch.best_effort;
    }
}

fn run_capture(program: &str, args: &[&str]) -> Result<String, String> {
    match Command::new(program).args(args).output() {
        Ok(output) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        }
        Ok(output) => Err(String::from_utf8_lossy(&output.stderr).to_string()),
        Err(e) => Err(e.to_string()),
    }
}
