//! Dispatcher (spec §4.E) — executes a job's payload and assembles its
//! `CronRunOutcome`.

use std::sync::Arc;

use openclaw_core::config::CronConfig;
use openclaw_core::events::EventSink;
use openclaw_core::heartbeat::HeartbeatSignal;

use crate::gate::{should_run_job, RunMode};
use crate::isolated::IsolatedTurnRunner;
use crate::schedule::compute_job_next_run_at_ms;
use crate::types::{
    CronJob, CronPayload, CronRunOutcome, CrontabRunResult, RunStatus, SessionTarget, WakeMode,
};
use crate::webhook::deliver_webhook;

/// Collaborators the Dispatcher needs beyond `cfg` (spec §4.E input
/// `{cfg, deps, job, mode}`): the narrow external-system shims.
pub struct Dispatcher {
    pub event_sink: Arc<dyn EventSink>,
    pub heartbeat: Arc<dyn HeartbeatSignal>,
    pub isolated_runner: Arc<dyn IsolatedTurnRunner>,
}

impl Dispatcher {
    pub fn new(
        event_sink: Arc<dyn EventSink>,
        heartbeat: Arc<dyn HeartbeatSignal>,
        isolated_runner: Arc<dyn IsolatedTurnRunner>,
    ) -> Self {
        Self {
            event_sink,
            heartbeat,
            isolated_runner,
        }
    }

    /// Execute `job` per spec §4.E. `now_ms` drives gating and the
    /// recomputed `nextRunAtMs`.
    pub async fn dispatch(
        &self,
        cfg: &CronConfig,
        job: &CronJob,
        mode: RunMode,
        now_ms: i64,
    ) -> CrontabRunResult {
        if !should_run_job(job, mode, now_ms) {
            return CrontabRunResult::not_due();
        }

        let mut outcome = match job.session_target {
            SessionTarget::Main => match self.dispatch_main(cfg, job).await {
                Ok(outcome) => outcome,
                Err(error) => return CrontabRunResult::failed(error),
            },
            SessionTarget::Isolated => match self.dispatch_isolated(job).await {
                Ok(outcome) => outcome,
                Err(error) => return CrontabRunResult::failed(error),
            },
        };

        if let Some(delivery) = &job.delivery {
            if delivery.mode == crate::types::DeliveryMode::Webhook {
                if let Some(url) = &delivery.to {
                    let result = deliver_webhook(job, url, &outcome, &cfg.webhook_token).await;
                    let best_effort = delivery.best_effort.unwrap_or(false);
                    if !result.delivered && !best_effort {
                        outcome.status = RunStatus::Error;
                        outcome.error = result.error;
                        outcome.error_kind = Some("delivery-target".to_string());
                    }
                }
            }
        }

        let next_run_at_ms = if job.enabled {
            compute_job_next_run_at_ms(&job.schedule, now_ms)
        } else {
            None
        };

        CrontabRunResult::ran(outcome, next_run_at_ms)
    }

    /// §4.E step 2: main-session branch.
    async fn dispatch_main(&self, cfg: &CronConfig, job: &CronJob) -> Result<CronRunOutcome, String> {
        let text = match &job.payload {
            CronPayload::SystemEvent { text } => text.clone(),
            _ => {
                return Err("main session jobs require systemEvent payload".to_string());
            }
        };

        let agent_id = job
            .agent_id
            .clone()
            .unwrap_or_else(|| cfg.default_agent_id.clone());
        let session_key = job
            .session_key
            .clone()
            .unwrap_or_else(|| format!("{}:{}", cfg.main_session_key_prefix, agent_id));

        // Open question (spec §9): a failed enqueue propagates as a
        // dispatch error rather than being silently swallowed.
        if let Err(e) = self.event_sink.enqueue(&session_key, &text) {
            return Ok(CronRunOutcome {
                status: RunStatus::Error,
                summary: None,
                error: Some(e.to_string()),
                error_kind: Some("dispatch".to_string()),
                session_id: None,
                session_key: Some(session_key),
            });
        }

        if matches!(job.wake_mode, WakeMode::Now | WakeMode::NextHeartbeat) {
            self.heartbeat.wake("cron");
        }

        Ok(CronRunOutcome {
            status: RunStatus::Ok,
            summary: None,
            error: None,
            error_kind: None,
            session_id: None,
            session_key: Some(session_key),
        })
    }

    /// §4.E step 3: isolated branch.
    async fn dispatch_isolated(&self, job: &CronJob) -> Result<CronRunOutcome, String> {
        let message = match &job.payload {
            CronPayload::AgentTurn { message, .. } => message.clone(),
            _ => {
                return Err("isolated session jobs require agentTurn payload".to_string());
            }
        };

        let result = self.isolated_runner.run(job, &message).await;
        let status = match result.status.as_deref() {
            Some("error") => RunStatus::Error,
            _ => RunStatus::Ok,
        };

        Ok(CronRunOutcome {
            status,
            summary: result.summary,
            error: result.error,
            error_kind: None,
            session_id: result.session_id,
            session_key: result.session_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CronDelivery, CronJobState, CronSchedule, DeliveryMode};
    use openclaw_core::events::QueueEventSink;
    use openclaw_core::heartbeat::NotifyHeartbeat;

    struct StubIsolatedRunner {
        result: crate::isolated::IsolatedTurnResult,
    }

    #[async_trait::async_trait]
    impl IsolatedTurnRunner for StubIsolatedRunner {
        async fn run(&self, _job: &CronJob, _message: &str) -> crate::isolated::IsolatedTurnResult {
            self.result.clone()
        }
    }

    fn main_job(text: &str) -> CronJob {
        CronJob {
            id: "job-1".to_string(),
            name: "ping".to_string(),
            description: None,
            enabled: true,
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
                text: text.to_string(),
            },
            delivery: None,
            state: CronJobState {
                next_run_at_ms: Some(0),
            },
        }
    }

    fn dispatcher(isolated: crate::isolated::IsolatedTurnResult) -> Dispatcher {
        Dispatcher::new(
            Arc::new(QueueEventSink::new()),
            Arc::new(NotifyHeartbeat::new()),
            Arc::new(StubIsolatedRunner { result: isolated }),
        )
    }

    #[tokio::test]
    async fn test_not_due_short_circuits() {
        let mut job = main_job("wake");
        job.state.next_run_at_ms = Some(10_000);
        let d = dispatcher(Default::default());
        let cfg = CronConfig::default();
        let result = d.dispatch(&cfg, &job, RunMode::Due, 1_000).await;
        assert_eq!(result, CrontabRunResult::not_due());
    }

    #[tokio::test]
    async fn test_main_session_requires_system_event_payload() {
        let mut job = main_job("wake");
        job.payload = CronPayload::AgentTurn {
            message: "x".to_string(),
            model: None,
            thinking: None,
            timeout_seconds: None,
            allow_unsafe_external_content: None,
            deliver: None,
            channel: None,
            to: None,
            best_effort_deliver: None,
        };
        let d = dispatcher(Default::default());
        let cfg = CronConfig::default();
        let result = d.dispatch(&cfg, &job, RunMode::Force, 1_000).await;
        match result {
            CrontabRunResult::Failed { ok, error } => {
                assert!(!ok);
                assert!(error.contains("systemEvent"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_main_session_runs_and_wakes() {
        let job = main_job("wake up");
        let d = dispatcher(Default::default());
        let cfg = CronConfig::default();
        let result = d.dispatch(&cfg, &job, RunMode::Force, 1_000).await;
        match result {
            CrontabRunResult::Ran { ok, ran, outcome, .. } => {
                assert!(ok);
                assert!(ran);
                assert_eq!(outcome.status, RunStatus::Ok);
            }
            other => panic!("expected Ran, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_webhook_failure_not_best_effort_marks_delivery_target_error() {
        let mut job = main_job("wake");
        job.delivery = Some(CronDelivery {
            mode: DeliveryMode::Webhook,
            channel: None,
            to: Some("http://127.0.0.1:1/".to_string()),
            best_effort: Some(false),
        });
        let d = dispatcher(Default::default());
        let cfg = CronConfig::default();
        let result = d.dispatch(&cfg, &job, RunMode::Force, 1_000).await;
        match result {
            CrontabRunResult::Ran { outcome, .. } => {
                assert_eq!(outcome.status, RunStatus::Error);
                assert_eq!(outcome.error_kind.as_deref(), Some("delivery-target"));
            }
            other => panic!("expected Ran, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_isolated_branch_requires_agent_turn_payload() {
        let mut job = main_job("wake");
        job.session_target = SessionTarget::Isolated;
        let d = dispatcher(Default::default());
        let cfg = CronConfig::default();
        let result = d.dispatch(&cfg, &job, RunMode::Force, 1_000).await;
        match result {
            CrontabRunResult::Failed { error, .. } => assert!(error.contains("agentTurn")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
