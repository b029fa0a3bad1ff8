//! Deal sessions over the event and snapshot stores.
//!
//! A [`DealSession`] records events for one deal, takes snapshots on the
//! configured interval and answers the read-side questions: current and
//! historical state, time travel, what-if scenarios, replay and analytics.

pub mod config;
pub mod error;
pub mod session;
pub mod telemetry;

pub use config::{EngineConfig, LogFormat};
pub use error::{EngineError, Result};
pub use session::{DealSession, InMemoryDealSession};
pub use telemetry::init_tracing;
