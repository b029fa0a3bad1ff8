use chrono::{DateTime, Utc};

use crate::{Event, EventType, Sequence};

/// Builder for predicate queries over one aggregate's log.
///
/// Every set criterion must match; unset criteria match everything.
/// Results are always ordered by sequence.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Minimum sequence (inclusive).
    pub from_sequence: Option<Sequence>,

    /// Maximum sequence (inclusive).
    pub to_sequence: Option<Sequence>,

    /// Events at or after this timestamp.
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Events at or before this timestamp.
    pub to_timestamp: Option<DateTime<Utc>>,

    /// Events scoped to any of these terms.
    pub term_ids: Option<Vec<String>>,

    /// Events of any of these types. Unrecognized events never match.
    pub event_types: Option<Vec<EventType>>,

    /// Events raised by any of these actors.
    pub actor_ids: Option<Vec<String>>,

    /// Maximum number of events to return.
    pub limit: Option<usize>,

    /// Number of events to skip.
    pub offset: Option<usize>,
}

impl EventQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for events of a specific type.
    pub fn for_event_type(event_type: EventType) -> Self {
        Self {
            event_types: Some(vec![event_type]),
            ..Default::default()
        }
    }

    /// Creates a query for events scoped to one term.
    pub fn for_term(term_id: impl Into<String>) -> Self {
        Self {
            term_ids: Some(vec![term_id.into()]),
            ..Default::default()
        }
    }

    pub fn from_sequence(mut self, sequence: Sequence) -> Self {
        self.from_sequence = Some(sequence);
        self
    }

    pub fn to_sequence(mut self, sequence: Sequence) -> Self {
        self.to_sequence = Some(sequence);
        self
    }

    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    /// Filters by multiple event types (any of these).
    pub fn event_types(mut self, event_types: Vec<EventType>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    /// Filters by multiple terms (any of these).
    pub fn term_ids(mut self, term_ids: Vec<String>) -> Self {
        self.term_ids = Some(term_ids);
        self
    }

    /// Filters by actor.
    pub fn actor_id(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_ids
            .get_or_insert_with(Vec::new)
            .push(actor_id.into());
        self
    }

    /// Limits the number of events returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips this many events before returning results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the event satisfies every criterion except paging.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(from) = self.from_sequence
            && event.sequence < from
        {
            return false;
        }
        if let Some(to) = self.to_sequence
            && event.sequence > to
        {
            return false;
        }
        if let Some(from) = self.from_timestamp
            && event.timestamp < from
        {
            return false;
        }
        if let Some(to) = self.to_timestamp
            && event.timestamp > to
        {
            return false;
        }
        if let Some(ref terms) = self.term_ids {
            match event.term_id() {
                Some(term_id) if terms.iter().any(|t| t == term_id) => {}
                _ => return false,
            }
        }
        if let Some(ref types) = self.event_types {
            match event.event_type() {
                Some(event_type) if types.contains(&event_type) => {}
                _ => return false,
            }
        }
        if let Some(ref actors) = self.actor_ids
            && !actors.contains(&event.actor.id)
        {
            return false;
        }
        true
    }

    /// Applies offset and limit to an already filtered, ordered result.
    pub fn paginate(&self, events: Vec<Event>) -> Vec<Event> {
        let offset = self.offset.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        events.into_iter().skip(offset).take(limit).collect()
    }
}
