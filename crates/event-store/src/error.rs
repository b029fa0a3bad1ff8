use thiserror::Error;

use crate::{AggregateId, Sequence};

/// Errors that can occur when interacting with the event store.
///
/// Only the store boundary fails; projecting events that are already in
/// hand never does.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// An appended event reuses a sequence already taken in the aggregate's log.
    #[error("Sequence {sequence} is already used in aggregate {aggregate_id}")]
    DuplicateSequence {
        aggregate_id: AggregateId,
        sequence: Sequence,
    },

    /// A single append batch contained events for more than one aggregate.
    #[error("Append batch mixes aggregates {expected} and {found}")]
    MixedAggregates {
        expected: AggregateId,
        found: AggregateId,
    },

    /// The backing storage could not be reached or failed mid-operation.
    #[error("Event store unavailable: {0}")]
    Unavailable(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
