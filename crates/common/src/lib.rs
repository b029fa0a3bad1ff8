//! Identifiers and vocabulary shared by every crate in the workspace.

pub mod ids;
pub mod types;

pub use ids::{IdGenerator, RandomIdGenerator, SequentialIdGenerator};
pub use types::{AggregateId, PartyType};
