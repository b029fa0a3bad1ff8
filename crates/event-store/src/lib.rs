//! Event model and append-only storage for negotiation (deal) event streams.
//!
//! - [`Event`] and [`EventPayload`]: the envelope and typed payloads
//! - [`EventStore`] / [`SnapshotStore`]: async storage contracts
//! - [`InMemoryEventStore`] / [`InMemorySnapshotStore`]: in-process implementations

pub mod error;
pub mod event;
pub mod memory;
pub mod payload;
pub mod query;
pub mod snapshot;
pub mod store;
pub mod vocabulary;

pub use common::{AggregateId, PartyType};
pub use error::{EventStoreError, Result};
pub use event::{Actor, CURRENT_SCHEMA_VERSION, Event, EventBuilder, EventId, Sequence};
pub use memory::InMemoryEventStore;
pub use payload::{EventCategory, EventPayload, EventType};
pub use query::EventQuery;
pub use snapshot::{InMemorySnapshotStore, Snapshot, SnapshotPolicy, SnapshotStore};
pub use store::{EventStore, EventStoreExt};
pub use vocabulary::{DealRole, DealStatus, NegotiationStatus};
