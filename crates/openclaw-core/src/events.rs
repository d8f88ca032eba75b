//! System-event sink — the narrow interface the Dispatcher (spec §4.E)
//! uses to enqueue a cron job's `systemEvent` text onto the main agent
//! session, fire-and-forget.
//!
//! Simplified from the teacher's `bus::queue::MessageBus`: that type
//! carries `InboundMessage`/`OutboundMessage` with channel routing and
//! `MediaAttachment` payloads for a multi-channel chat gateway. A cron
//! system event is plain text with nowhere to route besides a session
//! key, so this keeps only the inbound enqueue half.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::debug;

/// A system event queued for a session by the scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemEvent {
    pub session_key: String,
    pub text: String,
}

/// Enqueues system events onto a session, fire-and-forget.
///
/// Implemented by the out-of-scope interactive agent runtime in
/// production (spec §1); the Dispatcher only depends on this trait.
pub trait EventSink: Send + Sync {
    /// Enqueue `text` as a system event for `session_key`. Errors are
    /// returned to the caller but the call never blocks on delivery —
    /// per spec §9 Open Question 2, the Dispatcher decides whether to
    /// surface them.
    fn enqueue(&self, session_key: &str, text: &str) -> anyhow::Result<()>;
}

/// In-memory `EventSink`, grounded in the teacher's `MessageBus` queue
/// (a `Mutex<VecDeque<_>>` of pending inbound messages). Useful as the
/// default collaborator when no richer gateway is wired in, and as a
/// test double.
#[derive(Default)]
pub struct QueueEventSink {
    queue: Mutex<VecDeque<SystemEvent>>,
}

impl QueueEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain all queued events, oldest first.
    pub fn drain(&self) -> Vec<SystemEvent> {
        let mut queue = self.queue.lock().unwrap();
        queue.drain(..).collect()
    }
}

impl EventSink for QueueEventSink {
    fn enqueue(&self, session_key: &str, text: &str) -> anyhow::Result<()> {
        debug!(session_key, "enqueuing system event");
        self.queue.lock().unwrap().push_back(SystemEvent {
            session_key: session_key.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}
