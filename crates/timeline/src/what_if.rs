//! Hypothetical branches of a deal's history.

use chrono::{DateTime, Utc};
use common::IdGenerator;
use event_store::{Event, Sequence};
use projections::{ProjectedState, resume, sorted_by_sequence};
use serde::Serialize;
use uuid::Uuid;

use crate::diff::{StateDiff, compare_states};

/// Descriptive fields attached to a scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioMeta {
    pub name: String,
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl ScenarioMeta {
    pub fn new(
        name: impl Into<String>,
        created_by: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            created_by: created_by.into(),
            created_at,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A projected branch: a base state plus events that were never recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhatIfScenario {
    pub id: Uuid,
    pub meta: ScenarioMeta,
    pub base_sequence: Sequence,
    pub base_state: ProjectedState,
    /// The hypothetical events, sorted by sequence.
    pub hypothetical_events: Vec<Event>,
    pub projected_state: ProjectedState,
}

impl WhatIfScenario {
    /// What the hypothetical events would change.
    pub fn diff(&self) -> StateDiff {
        compare_states(&self.base_state, &self.projected_state)
    }
}

/// Folds `hypothetical_events` onto a copy of `base_state`.
///
/// Events at or before `base_sequence` are already part of the base and are
/// ignored. Nothing is written anywhere: the scenario lives only in the
/// returned value.
pub fn create_what_if_scenario(
    base_state: &ProjectedState,
    base_sequence: Sequence,
    hypothetical_events: &[Event],
    meta: ScenarioMeta,
    ids: &dyn IdGenerator,
) -> WhatIfScenario {
    let hypothetical_events: Vec<Event> = sorted_by_sequence(hypothetical_events)
        .into_iter()
        .cloned()
        .collect();

    let ignored = hypothetical_events
        .iter()
        .filter(|e| e.sequence <= base_sequence)
        .count();
    if ignored > 0 {
        tracing::debug!(
            ignored,
            %base_sequence,
            "hypothetical events at or before the base sequence were ignored"
        );
    }

    let projected_state = resume(base_state.clone(), base_sequence, &hypothetical_events);

    WhatIfScenario {
        id: ids.next_id(),
        meta,
        base_sequence,
        base_state: base_state.clone(),
        hypothetical_events,
        projected_state,
    }
}
