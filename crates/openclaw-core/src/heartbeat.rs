//! Heartbeat wake signal — the narrow interface the Dispatcher (spec §4.E)
//! uses to nudge the main agent session after enqueuing a cron system
//! event.
//!
//! The full tick-loop / `HEARTBEAT.md` reading machinery lives in the
//! interactive agent runtime, which is out of scope here (spec §1). All
//! this crate needs is the "wake now" signal the teacher's
//! `HeartbeatService` exposes via `trigger_now`/`Notify` — so that's all
//! that's kept.

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;

/// Signals the agent runtime to wake and check for work.
///
/// Implemented by the out-of-scope agent runtime in production; the
/// Dispatcher only depends on this trait (spec §4.E step 2, `wakeMode`
/// `"now"` / `"next-heartbeat"`).
pub trait HeartbeatSignal: Send + Sync {
    /// Wake the runtime, recording `reason` for diagnostics.
    fn wake(&self, reason: &str);
}

/// Default `HeartbeatSignal` backed by a `tokio::sync::Notify`.
///
/// Mirrors the shutdown/wake pattern in the teacher's `HeartbeatService`
/// (`Arc<Notify>` + `notify_waiters`), minus the tick loop and
/// `HEARTBEAT.md` parsing that belong to the agent runtime.
#[derive(Clone, Default)]
pub struct NotifyHeartbeat {
    notify: Arc<Notify>,
}

impl NotifyHeartbeat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until `wake` is called at least once.
    pub async fn notified(&self) {
        self.notify.notified().await
    }
}

impl HeartbeatSignal for NotifyHeartbeat {
    fn wake(&self, reason: &str) {
        debug!(reason, "heartbeat wake signaled");
        self.notify.notify_waiters();
    }
}
