//! Event builders for tests, benches and demos.
//!
//! Every builder stamps a fixed clock: event `n` happens `n` minutes after
//! [`start`]. Proposals are made by the borrower side and answered by the
//! lender side; everything else is recorded by the deal lead.

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::RandomIdGenerator;
use event_store::payload::{
    CommentAddedData, CommentDeletedData, CounterProposalMadeData, DeadlineExtendedData,
    DeadlineRemovedData, DeadlineSetData, DealCreatedData, DealStatusChangedData,
    InitialParticipant, ParticipantJoinedData, ParticipantLeftData, ParticipantRoleChangedData,
    ProposalAcceptedData, ProposalClosedData, ProposalMadeData, TermChanges, TermCreatedData,
    TermLockedData, TermStatusChangedData, TermUnlockedData, TermUpdatedData,
};
use event_store::{
    Actor, AggregateId, DealRole, DealStatus, Event, EventId, EventPayload, NegotiationStatus,
    PartyType,
};
use serde_json::{Value, json};

use crate::state::ProjectedState;

pub fn deal_id() -> AggregateId {
    AggregateId::new()
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
        .single()
        .unwrap_or_default()
}

/// The fixed clock: `n` minutes after [`start`].
pub fn at(n: u64) -> DateTime<Utc> {
    start() + Duration::minutes(n as i64)
}

pub fn lead() -> Actor {
    Actor::new("lead", "Dana Lead", PartyType::LenderSide).with_organization("bank")
}

pub fn borrower() -> Actor {
    Actor::new("alice", "Alice Borrower", PartyType::BorrowerSide).with_organization("acme")
}

pub fn lender() -> Actor {
    Actor::new("bob", "Bob Lender", PartyType::LenderSide).with_organization("bank")
}

/// Builds an event at `sequence`, timestamped `sequence` minutes after start.
pub fn event(id: AggregateId, sequence: u64, actor: Actor, payload: EventPayload) -> Event {
    Event::builder(EventId::generate(&RandomIdGenerator), id, sequence, payload)
        .timestamp(at(sequence))
        .actor(actor)
        .build()
}

/// Folds events in the given order onto an empty state.
pub fn fold(id: AggregateId, events: &[Event]) -> ProjectedState {
    events
        .iter()
        .fold(ProjectedState::empty(id), crate::apply_event)
}

pub fn deal_created(id: AggregateId, sequence: u64) -> Event {
    event(
        id,
        sequence,
        lead(),
        EventPayload::DealCreated(DealCreatedData {
            deal_name: "Acme refinancing".into(),
            deal_type: "term_loan".into(),
            status: DealStatus::Draft,
            mode: "collaborative".into(),
            target_close_date: Some(at(60 * 24 * 30)),
            initial_participants: vec![
                InitialParticipant {
                    participant_id: "lead".into(),
                    name: "Dana Lead".into(),
                    party_type: PartyType::LenderSide,
                    role: DealRole::DealLead,
                    organization_id: Some("bank".into()),
                },
                InitialParticipant {
                    participant_id: "counsel".into(),
                    name: "Casey Counsel".into(),
                    party_type: PartyType::ThirdParty,
                    role: DealRole::Reviewer,
                    organization_id: None,
                },
            ],
        }),
    )
}

pub fn deal_status_changed(id: AggregateId, sequence: u64, new_status: DealStatus) -> Event {
    event(
        id,
        sequence,
        lead(),
        EventPayload::DealStatusChanged(DealStatusChangedData {
            previous_status: None,
            new_status,
            reason: None,
        }),
    )
}

pub fn term_created(id: AggregateId, sequence: u64, term_id: &str, initial: Value) -> Event {
    event(
        id,
        sequence,
        lead(),
        EventPayload::TermCreated(TermCreatedData {
            term_id: term_id.into(),
            label: term_id.to_uppercase(),
            category: Some("pricing".into()),
            value_type: "percentage".into(),
            initial_value_text: Some(initial.to_string()),
            initial_value: initial,
            display_order: 0,
        }),
    )
}

pub fn term_updated(
    id: AggregateId,
    sequence: u64,
    term_id: &str,
    label: Option<&str>,
    display_order: Option<i32>,
) -> Event {
    event(
        id,
        sequence,
        lead(),
        EventPayload::TermUpdated(TermUpdatedData {
            term_id: term_id.into(),
            changes: TermChanges {
                label: label.map(str::to_string),
                value_type: None,
                display_order,
            },
        }),
    )
}

pub fn term_status_changed(
    id: AggregateId,
    sequence: u64,
    term_id: &str,
    new_status: NegotiationStatus,
) -> Event {
    event(
        id,
        sequence,
        lead(),
        EventPayload::TermStatusChanged(TermStatusChangedData {
            term_id: term_id.into(),
            previous_status: None,
            new_status,
        }),
    )
}

pub fn term_locked(id: AggregateId, sequence: u64, term_id: &str, value: Value) -> Event {
    event(
        id,
        sequence,
        lead(),
        EventPayload::TermLocked(TermLockedData {
            term_id: term_id.into(),
            final_value_text: Some(value.to_string()),
            final_value: value,
        }),
    )
}

pub fn term_unlocked(
    id: AggregateId,
    sequence: u64,
    term_id: &str,
    restore_status: Option<NegotiationStatus>,
) -> Event {
    event(
        id,
        sequence,
        lead(),
        EventPayload::TermUnlocked(TermUnlockedData {
            term_id: term_id.into(),
            reason: Some("reopened".into()),
            restore_status,
        }),
    )
}

pub fn proposal_made(
    id: AggregateId,
    sequence: u64,
    term_id: &str,
    proposal_id: &str,
    value: Value,
) -> Event {
    event(
        id,
        sequence,
        borrower(),
        EventPayload::ProposalMade(ProposalMadeData {
            proposal_id: proposal_id.into(),
            term_id: term_id.into(),
            proposed_value_text: Some(value.to_string()),
            proposed_value: value,
            rationale: None,
        }),
    )
}

pub fn counter_proposal(
    id: AggregateId,
    sequence: u64,
    term_id: &str,
    proposal_id: &str,
    original_proposal_id: &str,
    value: Value,
) -> Event {
    event(
        id,
        sequence,
        lender(),
        EventPayload::CounterProposalMade(CounterProposalMadeData {
            proposal_id: proposal_id.into(),
            original_proposal_id: original_proposal_id.into(),
            term_id: term_id.into(),
            proposed_value_text: Some(value.to_string()),
            proposed_value: value,
            rationale: Some("meet in the middle".into()),
        }),
    )
}

pub fn proposal_accepted(
    id: AggregateId,
    sequence: u64,
    term_id: &str,
    proposal_id: &str,
    value: Value,
) -> Event {
    event(
        id,
        sequence,
        lender(),
        EventPayload::ProposalAccepted(ProposalAcceptedData {
            proposal_id: proposal_id.into(),
            term_id: term_id.into(),
            accepted_value_text: Some(value.to_string()),
            accepted_value: value,
        }),
    )
}

pub fn proposal_rejected(
    id: AggregateId,
    sequence: u64,
    term_id: &str,
    proposal_id: &str,
) -> Event {
    event(
        id,
        sequence,
        lender(),
        EventPayload::ProposalRejected(ProposalClosedData {
            proposal_id: proposal_id.into(),
            term_id: term_id.into(),
            reason: Some("too high".into()),
        }),
    )
}

pub fn proposal_withdrawn(
    id: AggregateId,
    sequence: u64,
    term_id: &str,
    proposal_id: &str,
) -> Event {
    event(
        id,
        sequence,
        borrower(),
        EventPayload::ProposalWithdrawn(ProposalClosedData {
            proposal_id: proposal_id.into(),
            term_id: term_id.into(),
            reason: None,
        }),
    )
}

pub fn comment_added(id: AggregateId, sequence: u64, term_id: Option<&str>) -> Event {
    event(
        id,
        sequence,
        borrower(),
        EventPayload::CommentAdded(CommentAddedData {
            comment_id: format!("c-{sequence}"),
            term_id: term_id.map(str::to_string),
            content: "Can we revisit this?".into(),
        }),
    )
}

pub fn comment_deleted(id: AggregateId, sequence: u64, term_id: Option<&str>) -> Event {
    event(
        id,
        sequence,
        borrower(),
        EventPayload::CommentDeleted(CommentDeletedData {
            comment_id: format!("c-{sequence}"),
            term_id: term_id.map(str::to_string),
        }),
    )
}

pub fn participant_joined(
    id: AggregateId,
    sequence: u64,
    participant_id: &str,
    role: DealRole,
) -> Event {
    event(
        id,
        sequence,
        lead(),
        EventPayload::ParticipantJoined(ParticipantJoinedData {
            participant_id: participant_id.into(),
            name: format!("Participant {participant_id}"),
            party_type: PartyType::BorrowerSide,
            role,
            organization_id: Some("acme".into()),
            can_approve: None,
        }),
    )
}

pub fn participant_left(id: AggregateId, sequence: u64, participant_id: &str) -> Event {
    event(
        id,
        sequence,
        lead(),
        EventPayload::ParticipantLeft(ParticipantLeftData {
            participant_id: participant_id.into(),
            reason: None,
        }),
    )
}

pub fn participant_role_changed(
    id: AggregateId,
    sequence: u64,
    participant_id: &str,
    new_role: DealRole,
) -> Event {
    event(
        id,
        sequence,
        lead(),
        EventPayload::ParticipantRoleChanged(ParticipantRoleChangedData {
            participant_id: participant_id.into(),
            previous_role: None,
            new_role,
            can_approve: None,
        }),
    )
}

pub fn deadline_set(
    id: AggregateId,
    sequence: u64,
    term_id: &str,
    deadline: DateTime<Utc>,
) -> Event {
    event(
        id,
        sequence,
        lead(),
        EventPayload::DeadlineSet(DeadlineSetData {
            term_id: term_id.into(),
            deadline,
        }),
    )
}

pub fn deadline_extended(
    id: AggregateId,
    sequence: u64,
    term_id: &str,
    new_deadline: DateTime<Utc>,
) -> Event {
    event(
        id,
        sequence,
        lead(),
        EventPayload::DeadlineExtended(DeadlineExtendedData {
            term_id: term_id.into(),
            previous_deadline: None,
            new_deadline,
        }),
    )
}

pub fn deadline_removed(id: AggregateId, sequence: u64, term_id: &str) -> Event {
    event(
        id,
        sequence,
        lead(),
        EventPayload::DeadlineRemoved(DeadlineRemovedData {
            term_id: term_id.into(),
        }),
    )
}

/// An event of a type this build does not know.
pub fn unrecognized(id: AggregateId, sequence: u64) -> Event {
    event(
        id,
        sequence,
        lead(),
        EventPayload::decode("term_escalated", json!({ "term_id": "rate", "level": 2 })),
    )
}

/// A short negotiation over one term: created, proposed, countered, accepted.
pub fn rate_negotiation(id: AggregateId) -> Vec<Event> {
    vec![
        deal_created(id, 1),
        term_created(id, 2, "rate", json!(5.0)),
        term_created(id, 3, "tenor", json!(36)),
        proposal_made(id, 4, "rate", "p-1", json!(4.5)),
        comment_added(id, 5, Some("rate")),
        counter_proposal(id, 6, "rate", "p-2", "p-1", json!(4.75)),
        proposal_accepted(id, 7, "rate", "p-2", json!(4.75)),
        term_locked(id, 8, "rate", json!(4.75)),
    ]
}
