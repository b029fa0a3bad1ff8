//! Navigating and questioning a deal's history.
//!
//! - [`TimeTravelController`]: a cursor over a captured event list
//! - [`create_what_if_scenario`]: project events that were never recorded
//! - [`compare_states`]: entity-level diff of two projected states
//! - [`replay_with_callback`]: paced, cancellable step-by-step replay
//! - [`activity_summary`] / [`find_milestones`]: aggregations for timelines

pub mod analytics;
pub mod controller;
pub mod diff;
pub mod replay;
pub mod what_if;

pub use analytics::{ActivitySummary, Milestone, Significance, activity_summary, find_milestones};
pub use controller::{TimeTravelController, TimeTravelState};
pub use diff::{
    ChangeKind, FieldChange, ParticipantChange, ProposalChange, StateDiff, TermChange,
    compare_states,
};
pub use replay::{ReplayOptions, ReplayOutcome, replay_with_callback};
pub use what_if::{ScenarioMeta, WhatIfScenario, create_what_if_scenario};
