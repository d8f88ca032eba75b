//! Core types, configuration, and narrow external-collaborator traits
//! shared by the scheduler crates.

pub mod config;
pub mod events;
pub mod heartbeat;
pub mod utils;

pub use config::Config;
pub use events::{EventSink, QueueEventSink, SystemEvent};
pub use heartbeat::{HeartbeatSignal, NotifyHeartbeat};
