//! Projection entry points: fold an event list into a [`ProjectedState`].
//!
//! All entry points sort their input by sequence (stably, so equal
//! sequences keep their input order) before folding. Projection is a pure
//! function of the ordered events; shuffling the input never changes the
//! result.

use chrono::{DateTime, Utc};
use event_store::{AggregateId, Event, EventType, Sequence, Snapshot};
use serde::Serialize;

use crate::reducer::apply_event;
use crate::state::{ProjectedState, TermState};

/// Filters applied before folding.
///
/// Filters compose conjunctively. Deal-scoped events (those carrying no
/// term id) always pass the term filter, so a term-filtered projection
/// still knows the deal and its participants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionOptions {
    /// Keep events with `timestamp <= until_timestamp`.
    pub until_timestamp: Option<DateTime<Utc>>,
    /// Keep events with `sequence <= until_sequence`.
    pub until_sequence: Option<Sequence>,
    pub term_ids: Option<Vec<String>>,
    pub event_types: Option<Vec<EventType>>,
    pub actor_ids: Option<Vec<String>>,
}

impl ProjectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn until_timestamp(mut self, until: DateTime<Utc>) -> Self {
        self.until_timestamp = Some(until);
        self
    }

    pub fn until_sequence(mut self, until: impl Into<Sequence>) -> Self {
        self.until_sequence = Some(until.into());
        self
    }

    pub fn term_ids<I, T>(mut self, term_ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.term_ids = Some(term_ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn event_types(mut self, event_types: impl IntoIterator<Item = EventType>) -> Self {
        self.event_types = Some(event_types.into_iter().collect());
        self
    }

    pub fn actor_ids<I, T>(mut self, actor_ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.actor_ids = Some(actor_ids.into_iter().map(Into::into).collect());
        self
    }

    /// Returns true if the event survives every configured filter.
    pub fn admits(&self, event: &Event) -> bool {
        if let Some(until) = self.until_timestamp
            && event.timestamp > until
        {
            return false;
        }
        if let Some(until) = self.until_sequence
            && event.sequence > until
        {
            return false;
        }
        if let Some(term_ids) = &self.term_ids
            && let Some(term_id) = event.term_id()
            && !term_ids.iter().any(|t| t == term_id)
        {
            return false;
        }
        if let Some(types) = &self.event_types
            && !event.event_type().is_some_and(|t| types.contains(&t))
        {
            return false;
        }
        if let Some(actors) = &self.actor_ids
            && !actors.contains(&event.actor.id)
        {
            return false;
        }
        true
    }
}

/// Returns the events ordered by sequence without reordering ties.
pub fn sorted_by_sequence(events: &[Event]) -> Vec<&Event> {
    let mut sorted: Vec<&Event> = events.iter().collect();
    sorted.sort_by_key(|e| e.sequence);
    sorted
}

/// Projects the events that pass `options` onto an empty state.
pub fn project(
    aggregate_id: AggregateId,
    events: &[Event],
    options: &ProjectionOptions,
) -> ProjectedState {
    sorted_by_sequence(events)
        .into_iter()
        .filter(|e| options.admits(e))
        .fold(ProjectedState::empty(aggregate_id), apply_event)
}

/// Projects every event onto an empty state.
pub fn project_all(aggregate_id: AggregateId, events: &[Event]) -> ProjectedState {
    project(aggregate_id, events, &ProjectionOptions::default())
}

/// Folds the events with `sequence > after` onto `base`.
///
/// `base` is taken by value; callers holding a state they still need pass
/// a clone.
pub fn resume(base: ProjectedState, after: Sequence, events: &[Event]) -> ProjectedState {
    sorted_by_sequence(events)
        .into_iter()
        .filter(|e| e.sequence > after)
        .fold(base, apply_event)
}

/// Resumes from a snapshot, folding only events after its sequence.
///
/// The snapshot itself is left untouched.
pub fn project_from_snapshot(
    snapshot: &Snapshot<ProjectedState>,
    events: &[Event],
) -> ProjectedState {
    resume(snapshot.state.clone(), snapshot.sequence, events)
}

/// Replays growing prefixes of the log, handing each intermediate state to
/// `on_step` together with the event that produced it and its index.
///
/// The fold is incremental: each callback observes exactly what
/// [`project`] would return for the prefix ending at that event.
pub fn replay_prefixes<F>(
    aggregate_id: AggregateId,
    events: &[Event],
    until_sequence: Option<Sequence>,
    mut on_step: F,
) -> ProjectedState
where
    F: FnMut(&ProjectedState, &Event, usize),
{
    let mut state = ProjectedState::empty(aggregate_id);
    for (index, event) in replay_order(events, until_sequence).enumerate() {
        state.apply(event);
        on_step(&state, event, index);
    }
    state
}

/// The events a replay visits: sequence order, stopping after the last
/// event with `sequence <= until_sequence`.
pub fn replay_order(
    events: &[Event],
    until_sequence: Option<Sequence>,
) -> impl Iterator<Item = &Event> {
    sorted_by_sequence(events)
        .into_iter()
        .take_while(move |e| until_sequence.is_none_or(|until| e.sequence <= until))
}

/// One step of a term's evolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub sequence: Sequence,
    pub event_type: String,
    /// The term as it stood right after this event.
    pub term: TermState,
}

/// Returns the evolution of one term.
///
/// Folds only the events scoped to `term_id`, recording the term after each
/// event once it exists. Events before `term_created` produce no entry.
pub fn term_history(term_id: &str, events: &[Event]) -> Vec<TermHistoryEntry> {
    let Some(first) = events.first() else {
        return Vec::new();
    };

    let mut state = ProjectedState::empty(first.aggregate_id);
    let mut history = Vec::new();
    for event in sorted_by_sequence(events)
        .into_iter()
        .filter(|e| e.term_id() == Some(term_id))
    {
        state.apply(event);
        if let Some(term) = state.term(term_id) {
            history.push(TermHistoryEntry {
                timestamp: event.timestamp,
                sequence: event.sequence,
                event_type: event.type_name().to_string(),
                term: term.clone(),
            });
        }
    }
    history
}
