//! Engine error types.

use event_store::EventStoreError;
use thiserror::Error;

/// Errors that can occur during session operations.
///
/// Only storage fails: projection and navigation over loaded events are
/// total.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An error occurred in the event or snapshot store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
