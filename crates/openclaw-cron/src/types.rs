//! Data model for cron jobs, schedules, payloads, and run outcomes
//! (spec §3).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scheduled job, as reconstructed from (or destined for) the crontab.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJob {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_after_run: Option<bool>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub schedule: CronSchedule,
    #[serde(default)]
    pub session_target: SessionTarget,
    #[serde(default)]
    pub wake_mode: WakeMode,
    pub payload: CronPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<CronDelivery>,
    #[serde(default)]
    pub state: CronJobState,
}

impl CronJob {
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// Where a job's payload runs (spec §3).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionTarget {
    #[default]
    Main,
    Isolated,
}

/// When the main session should be nudged after a system event is
/// enqueued (spec §3, §4.E).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WakeMode {
    #[default]
    Now,
    NextHeartbeat,
}

/// Tagged-union schedule (spec §3, resolved by §4.A).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CronSchedule {
    #[serde(rename_all = "camelCase")]
    Cron {
        expr: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tz: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stagger_ms: Option<i64>,
    },
    #[serde(rename_all = "camelCase")]
    Every {
        every_ms: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        anchor_ms: Option<i64>,
    },
    #[serde(rename_all = "camelCase")]
    At { at: String },
}

/// Tagged-union dispatch payload (spec §3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CronPayload {
    #[serde(rename_all = "camelCase")]
    SystemEvent { text: String },
    #[serde(rename_all = "camelCase")]
    AgentTurn {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thinking: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_seconds: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        allow_unsafe_external_content: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deliver: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        best_effort_deliver: Option<bool>,
    },
}

impl CronPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            CronPayload::SystemEvent { .. } => "systemEvent",
            CronPayload::AgentTurn { .. } => "agentTurn",
        }
    }
}

/// Delivery mode for an isolated-turn result (spec §3, §4.F).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronDelivery {
    pub mode: DeliveryMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_effort: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    None,
    Announce,
    Webhook,
}

/// Mutable, derived scheduling state (spec §3). Not part of the job's
/// authored identity; recomputed on every decode (§4.B).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJobState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at_ms: Option<i64>,
}

/// Result of running a job's payload (spec §3, §4.E).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronRunOutcome {
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Ok,
    Error,
}

/// A single reconstructed run-history entry (spec §3, §4.G).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronRunLogEntry {
    pub ts: i64,
    pub job_id: String,
    pub status: RunStatus,
}

/// Result of a single dispatch attempt (spec §4.E).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CrontabRunResult {
    NotRun {
        ok: bool,
        ran: bool,
        reason: String,
    },
    Ran {
        ok: bool,
        ran: bool,
        outcome: CronRunOutcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        next_run_at_ms: Option<i64>,
    },
    Failed {
        ok: bool,
        error: String,
    },
}

impl CrontabRunResult {
    pub fn not_due() -> Self {
        CrontabRunResult::NotRun {
            ok: true,
            ran: false,
            reason: "not-due".to_string(),
        }
    }

    pub fn already_running() -> Self {
        CrontabRunResult::NotRun {
            ok: true,
            ran: false,
            reason: "already-running".to_string(),
        }
    }

    pub fn ran(outcome: CronRunOutcome, next_run_at_ms: Option<i64>) -> Self {
        CrontabRunResult::Ran {
            ok: true,
            ran: true,
            outcome,
            next_run_at_ms,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        CrontabRunResult::Failed {
            ok: false,
            error: error.into(),
        }
    }
}

/// Fields accepted by `cron.add` (spec §4.H). Shares shape with `CronJob`
/// minus server-assigned identity/timestamps/state.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJobCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub session_key: Option<String>,
    #[serde(default)]
    pub delete_after_run: Option<bool>,
    pub schedule: CronSchedule,
    #[serde(default)]
    pub session_target: SessionTarget,
    #[serde(default)]
    pub wake_mode: WakeMode,
    pub payload: CronPayload,
    #[serde(default)]
    pub delivery: Option<CronDelivery>,
}

fn default_true() -> bool {
    true
}

/// Shallow patch applied by `cron.update` (spec §4.H). Every field is
/// optional; `payload`/`delivery` are merged field-by-field onto the
/// existing job by `rpc.rs::apply_patch` — the kind named by `payload`
/// must match the job's existing payload kind, enforced by the caller.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJobPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub session_key: Option<String>,
    #[serde(default)]
    pub delete_after_run: Option<bool>,
    #[serde(default)]
    pub schedule: Option<CronSchedule>,
    #[serde(default)]
    pub session_target: Option<SessionTarget>,
    #[serde(default)]
    pub wake_mode: Option<WakeMode>,
    #[serde(default)]
    pub payload: Option<CronPayloadPatch>,
    #[serde(default)]
    pub delivery: Option<CronDeliveryPatch>,
}

/// Shallow per-field patch for `CronPayload` (spec §4.H / §6: "payload
/// ... merge shallowly"). Mirrors `CronPayload`'s shape with every field
/// optional; `rpc.rs::merge_payload` applies only the fields present.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CronPayloadPatch {
    #[serde(rename_all = "camelCase")]
    SystemEvent {
        #[serde(default)]
        text: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    AgentTurn {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        thinking: Option<bool>,
        #[serde(default)]
        timeout_seconds: Option<u64>,
        #[serde(default)]
        allow_unsafe_external_content: Option<bool>,
        #[serde(default)]
        deliver: Option<bool>,
        #[serde(default)]
        channel: Option<String>,
        #[serde(default)]
        to: Option<String>,
        #[serde(default)]
        best_effort_deliver: Option<bool>,
    },
}

impl CronPayloadPatch {
    pub fn kind(&self) -> &'static str {
        match self {
            CronPayloadPatch::SystemEvent { .. } => "systemEvent",
            CronPayloadPatch::AgentTurn { .. } => "agentTurn",
        }
    }
}

/// Shallow per-field patch for `CronDelivery` (spec §4.H / §6: "delivery
/// ... merge shallowly"). `rpc.rs::merge_delivery` applies only the
/// fields present, creating a delivery block from `DeliveryMode::None`
/// if the job had none yet.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronDeliveryPatch {
    #[serde(default)]
    pub mode: Option<DeliveryMode>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub best_effort: Option<bool>,
}
