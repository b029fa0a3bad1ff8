//! Deal projections: fold a deal's event stream into its current state.
//!
//! - [`ProjectedState`]: the read model of one deal
//! - [`apply_event`]: the pure reducer
//! - [`project`] and friends: sort, filter and fold a log, optionally from a snapshot
//! - [`DealStats`]: summary counts over a projected deal

pub mod projector;
pub mod reducer;
pub mod state;
pub mod stats;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use projector::{
    ProjectionOptions, TermHistoryEntry, project, project_all, project_from_snapshot,
    replay_order, replay_prefixes, resume, sorted_by_sequence, term_history,
};
pub use reducer::apply_event;
pub use state::{
    ParticipantState, ParticipantStatus, ProjectedState, ProposalState, ProposalStatus, TermState,
};
pub use stats::{DealStats, ProposalStatusCounts, TermStatusCounts, overdue_terms};
