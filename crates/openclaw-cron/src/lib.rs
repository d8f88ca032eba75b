//! Crontab-backed job scheduler core: schedule resolution, the crontab
//! codec, the run pipeline (gate → dispatch → webhook), run-history
//! reconstruction, and the RPC facade that ties them together.

pub mod codec;
pub mod crontab_io;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod history;
pub mod isolated;
pub mod rpc;
pub mod schedule;
pub mod types;
pub mod webhook;

pub use error::{CronError, CronResult};
pub use rpc::CronFacade;
pub use types::*;
