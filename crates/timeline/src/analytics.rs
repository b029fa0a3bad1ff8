//! Activity counts and milestone detection over raw events.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use event_store::{Event, EventPayload, EventType, Sequence};
use indexmap::IndexMap;
use projections::sorted_by_sequence;
use serde::Serialize;

/// Who did what, and when, within a time window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivitySummary {
    pub total_events: usize,
    /// Counts keyed by wire type name, in order of first occurrence.
    pub by_type: IndexMap<String, usize>,
    /// Counts keyed by actor id.
    pub by_actor: IndexMap<String, usize>,
    pub by_term: IndexMap<String, usize>,
    /// Counts per UTC calendar day.
    pub by_day: BTreeMap<NaiveDate, usize>,
    pub first_event_at: Option<DateTime<Utc>>,
    pub last_event_at: Option<DateTime<Utc>>,
}

/// Summarises the events with `start <= timestamp <= end`.
///
/// Either bound may be left open.
pub fn activity_summary(
    events: &[Event],
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> ActivitySummary {
    let mut summary = ActivitySummary::default();

    for event in sorted_by_sequence(events) {
        let before_start = start.is_some_and(|s| event.timestamp < s);
        let after_end = end.is_some_and(|e| event.timestamp > e);
        if before_start || after_end {
            continue;
        }

        summary.total_events += 1;
        *summary
            .by_type
            .entry(event.type_name().to_string())
            .or_insert(0) += 1;
        *summary.by_actor.entry(event.actor.id.clone()).or_insert(0) += 1;
        if let Some(term_id) = event.term_id() {
            *summary.by_term.entry(term_id.to_string()).or_insert(0) += 1;
        }
        *summary
            .by_day
            .entry(event.timestamp.date_naive())
            .or_insert(0) += 1;

        summary.first_event_at = Some(
            summary
                .first_event_at
                .map_or(event.timestamp, |t| t.min(event.timestamp)),
        );
        summary.last_event_at = Some(
            summary
                .last_event_at
                .map_or(event.timestamp, |t| t.max(event.timestamp)),
        );
    }

    summary
}

/// How much a milestone matters on a deal timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    High,
    Medium,
    Low,
}

/// A notable event, labelled for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Milestone {
    pub sequence: Sequence,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub significance: Significance,
    pub description: String,
    pub actor_name: String,
    pub term_id: Option<String>,
}

/// Picks the milestone events out of a history, in sequence order.
pub fn find_milestones(events: &[Event]) -> Vec<Milestone> {
    sorted_by_sequence(events)
        .into_iter()
        .filter_map(|event| {
            let (significance, description) = describe(&event.payload)?;
            Some(Milestone {
                sequence: event.sequence,
                timestamp: event.timestamp,
                event_type: event.event_type()?,
                significance,
                description,
                actor_name: event.actor.name.clone(),
                term_id: event.term_id().map(str::to_string),
            })
        })
        .collect()
}

fn describe(payload: &EventPayload) -> Option<(Significance, String)> {
    let milestone = match payload {
        EventPayload::DealCreated(d) => {
            (Significance::High, format!("Deal created: {}", d.deal_name))
        }
        EventPayload::DealStatusChanged(d) => (
            Significance::High,
            format!("Deal status changed to {}", d.new_status),
        ),
        EventPayload::ProposalAccepted(d) => (
            Significance::High,
            format!("Proposal accepted on {}", d.term_id),
        ),
        EventPayload::TermLocked(d) => (Significance::High, format!("Term {} locked", d.term_id)),
        EventPayload::TermUnlocked(d) => {
            (Significance::Medium, format!("Term {} unlocked", d.term_id))
        }
        EventPayload::ParticipantJoined(d) => (
            Significance::Medium,
            format!("{} joined as {}", d.name, d.role),
        ),
        EventPayload::ParticipantLeft(d) => (
            Significance::Medium,
            format!("Participant {} left", d.participant_id),
        ),
        EventPayload::DeadlineExtended(d) => (
            Significance::Medium,
            format!("Deadline on {} extended", d.term_id),
        ),
        EventPayload::TermCreated(d) => (Significance::Low, format!("Term added: {}", d.label)),
        EventPayload::DeadlineSet(d) => {
            (Significance::Low, format!("Deadline set on {}", d.term_id))
        }
        _ => return None,
    };
    Some(milestone)
}
