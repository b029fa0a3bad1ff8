//! Negotiation event payloads.
//!
//! [`EventPayload`] is the in-memory sum type the projector matches on. The
//! wire form keeps the type name and the payload object side by side; see
//! [`EventPayload::decode`] for how unknown or malformed payloads are kept
//! instead of being rejected.

use chrono::{DateTime, Utc};
use common::PartyType;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};

use crate::vocabulary::{DealRole, DealStatus, NegotiationStatus};

/// The closed set of event types this version of the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DealCreated,
    DealStatusChanged,
    TermCreated,
    TermUpdated,
    TermStatusChanged,
    TermLocked,
    TermUnlocked,
    ProposalMade,
    CounterProposalMade,
    ProposalAccepted,
    ProposalRejected,
    ProposalWithdrawn,
    ProposalSuperseded,
    CommentAdded,
    CommentDeleted,
    ParticipantJoined,
    ParticipantLeft,
    ParticipantRoleChanged,
    DeadlineSet,
    DeadlineRemoved,
    DeadlineExtended,
}

/// Grouping of event types by the entity they touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Deal,
    Term,
    Proposal,
    Comment,
    Participant,
    Deadline,
}

impl EventType {
    pub const ALL: [EventType; 21] = [
        EventType::DealCreated,
        EventType::DealStatusChanged,
        EventType::TermCreated,
        EventType::TermUpdated,
        EventType::TermStatusChanged,
        EventType::TermLocked,
        EventType::TermUnlocked,
        EventType::ProposalMade,
        EventType::CounterProposalMade,
        EventType::ProposalAccepted,
        EventType::ProposalRejected,
        EventType::ProposalWithdrawn,
        EventType::ProposalSuperseded,
        EventType::CommentAdded,
        EventType::CommentDeleted,
        EventType::ParticipantJoined,
        EventType::ParticipantLeft,
        EventType::ParticipantRoleChanged,
        EventType::DeadlineSet,
        EventType::DeadlineRemoved,
        EventType::DeadlineExtended,
    ];

    /// Returns the wire name of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::DealCreated => "deal_created",
            EventType::DealStatusChanged => "deal_status_changed",
            EventType::TermCreated => "term_created",
            EventType::TermUpdated => "term_updated",
            EventType::TermStatusChanged => "term_status_changed",
            EventType::TermLocked => "term_locked",
            EventType::TermUnlocked => "term_unlocked",
            EventType::ProposalMade => "proposal_made",
            EventType::CounterProposalMade => "counter_proposal_made",
            EventType::ProposalAccepted => "proposal_accepted",
            EventType::ProposalRejected => "proposal_rejected",
            EventType::ProposalWithdrawn => "proposal_withdrawn",
            EventType::ProposalSuperseded => "proposal_superseded",
            EventType::CommentAdded => "comment_added",
            EventType::CommentDeleted => "comment_deleted",
            EventType::ParticipantJoined => "participant_joined",
            EventType::ParticipantLeft => "participant_left",
            EventType::ParticipantRoleChanged => "participant_role_changed",
            EventType::DeadlineSet => "deadline_set",
            EventType::DeadlineRemoved => "deadline_removed",
            EventType::DeadlineExtended => "deadline_extended",
        }
    }

    /// Looks up an event type by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Returns the category the event type belongs to.
    pub fn category(&self) -> EventCategory {
        match self {
            EventType::DealCreated | EventType::DealStatusChanged => EventCategory::Deal,
            EventType::TermCreated
            | EventType::TermUpdated
            | EventType::TermStatusChanged
            | EventType::TermLocked
            | EventType::TermUnlocked => EventCategory::Term,
            EventType::ProposalMade
            | EventType::CounterProposalMade
            | EventType::ProposalAccepted
            | EventType::ProposalRejected
            | EventType::ProposalWithdrawn
            | EventType::ProposalSuperseded => EventCategory::Proposal,
            EventType::CommentAdded | EventType::CommentDeleted => EventCategory::Comment,
            EventType::ParticipantJoined
            | EventType::ParticipantLeft
            | EventType::ParticipantRoleChanged => EventCategory::Participant,
            EventType::DeadlineSet | EventType::DeadlineRemoved | EventType::DeadlineExtended => {
                EventCategory::Deadline
            }
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A participant listed when the deal is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialParticipant {
    pub participant_id: String,
    pub name: String,
    pub party_type: PartyType,
    pub role: DealRole,
    pub organization_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealCreatedData {
    pub deal_name: String,
    pub deal_type: String,
    #[serde(default)]
    pub status: DealStatus,
    #[serde(default)]
    pub mode: String,
    pub target_close_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub initial_participants: Vec<InitialParticipant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealStatusChangedData {
    pub previous_status: Option<DealStatus>,
    pub new_status: DealStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermCreatedData {
    pub term_id: String,
    pub label: String,
    pub category: Option<String>,
    pub value_type: String,
    pub initial_value: serde_json::Value,
    pub initial_value_text: Option<String>,
    #[serde(default)]
    pub display_order: i32,
}

/// Descriptive fields of a term that may be edited after creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermChanges {
    pub label: Option<String>,
    pub value_type: Option<String>,
    pub display_order: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermUpdatedData {
    pub term_id: String,
    pub changes: TermChanges,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermStatusChangedData {
    pub term_id: String,
    pub previous_status: Option<NegotiationStatus>,
    pub new_status: NegotiationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermLockedData {
    pub term_id: String,
    pub final_value: serde_json::Value,
    pub final_value_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermUnlockedData {
    pub term_id: String,
    pub reason: Option<String>,
    /// Status to return to. Older writers omit it, which means `agreed`.
    pub restore_status: Option<NegotiationStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalMadeData {
    pub proposal_id: String,
    pub term_id: String,
    pub proposed_value: serde_json::Value,
    pub proposed_value_text: Option<String>,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterProposalMadeData {
    pub proposal_id: String,
    pub original_proposal_id: String,
    pub term_id: String,
    pub proposed_value: serde_json::Value,
    pub proposed_value_text: Option<String>,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalAcceptedData {
    pub proposal_id: String,
    pub term_id: String,
    pub accepted_value: serde_json::Value,
    pub accepted_value_text: Option<String>,
}

/// Shared shape of `proposal_rejected` and `proposal_withdrawn`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalClosedData {
    pub proposal_id: String,
    pub term_id: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalSupersededData {
    pub proposal_id: String,
    pub term_id: String,
    pub superseded_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentAddedData {
    pub comment_id: String,
    pub term_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentDeletedData {
    pub comment_id: String,
    pub term_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantJoinedData {
    pub participant_id: String,
    pub name: String,
    pub party_type: PartyType,
    pub role: DealRole,
    pub organization_id: Option<String>,
    /// Explicit approval capability; derived from the role when absent.
    pub can_approve: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantLeftData {
    pub participant_id: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRoleChangedData {
    pub participant_id: String,
    pub previous_role: Option<DealRole>,
    pub new_role: DealRole,
    pub can_approve: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlineSetData {
    pub term_id: String,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlineRemovedData {
    pub term_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadlineExtendedData {
    pub term_id: String,
    pub previous_deadline: Option<DateTime<Utc>>,
    pub new_deadline: DateTime<Utc>,
}

/// Typed payload of a negotiation event.
///
/// `Unrecognized` only ever comes out of [`EventPayload::decode`]: it holds
/// events written by a newer schema (or with a payload that does not match
/// its declared type) so they survive a read/write cycle untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    DealCreated(DealCreatedData),
    DealStatusChanged(DealStatusChangedData),
    TermCreated(TermCreatedData),
    TermUpdated(TermUpdatedData),
    TermStatusChanged(TermStatusChangedData),
    TermLocked(TermLockedData),
    TermUnlocked(TermUnlockedData),
    ProposalMade(ProposalMadeData),
    CounterProposalMade(CounterProposalMadeData),
    ProposalAccepted(ProposalAcceptedData),
    ProposalRejected(ProposalClosedData),
    ProposalWithdrawn(ProposalClosedData),
    ProposalSuperseded(ProposalSupersededData),
    CommentAdded(CommentAddedData),
    CommentDeleted(CommentDeletedData),
    ParticipantJoined(ParticipantJoinedData),
    ParticipantLeft(ParticipantLeftData),
    ParticipantRoleChanged(ParticipantRoleChangedData),
    DeadlineSet(DeadlineSetData),
    DeadlineRemoved(DeadlineRemovedData),
    DeadlineExtended(DeadlineExtendedData),
    Unrecognized {
        event_type: String,
        payload: serde_json::Value,
    },
}

fn parse<T: DeserializeOwned>(
    payload: serde_json::Value,
    wrap: impl FnOnce(T) -> EventPayload,
) -> Result<EventPayload, serde_json::Error> {
    serde_json::from_value(payload).map(wrap)
}

impl EventPayload {
    /// Decodes a payload from its wire type name and JSON body.
    ///
    /// Never fails: unknown type names and payloads that do not fit their
    /// declared type both come back as [`EventPayload::Unrecognized`].
    pub fn decode(event_type: &str, payload: serde_json::Value) -> Self {
        let Some(known) = EventType::from_name(event_type) else {
            tracing::debug!(event_type, "keeping event of unknown type");
            return EventPayload::Unrecognized {
                event_type: event_type.to_string(),
                payload,
            };
        };

        let raw = payload.clone();
        let decoded = match known {
            EventType::DealCreated => parse(payload, EventPayload::DealCreated),
            EventType::DealStatusChanged => parse(payload, EventPayload::DealStatusChanged),
            EventType::TermCreated => parse(payload, EventPayload::TermCreated),
            EventType::TermUpdated => parse(payload, EventPayload::TermUpdated),
            EventType::TermStatusChanged => parse(payload, EventPayload::TermStatusChanged),
            EventType::TermLocked => parse(payload, EventPayload::TermLocked),
            EventType::TermUnlocked => parse(payload, EventPayload::TermUnlocked),
            EventType::ProposalMade => parse(payload, EventPayload::ProposalMade),
            EventType::CounterProposalMade => parse(payload, EventPayload::CounterProposalMade),
            EventType::ProposalAccepted => parse(payload, EventPayload::ProposalAccepted),
            EventType::ProposalRejected => parse(payload, EventPayload::ProposalRejected),
            EventType::ProposalWithdrawn => parse(payload, EventPayload::ProposalWithdrawn),
            EventType::ProposalSuperseded => parse(payload, EventPayload::ProposalSuperseded),
            EventType::CommentAdded => parse(payload, EventPayload::CommentAdded),
            EventType::CommentDeleted => parse(payload, EventPayload::CommentDeleted),
            EventType::ParticipantJoined => parse(payload, EventPayload::ParticipantJoined),
            EventType::ParticipantLeft => parse(payload, EventPayload::ParticipantLeft),
            EventType::ParticipantRoleChanged => {
                parse(payload, EventPayload::ParticipantRoleChanged)
            }
            EventType::DeadlineSet => parse(payload, EventPayload::DeadlineSet),
            EventType::DeadlineRemoved => parse(payload, EventPayload::DeadlineRemoved),
            EventType::DeadlineExtended => parse(payload, EventPayload::DeadlineExtended),
        };

        decoded.unwrap_or_else(|error| {
            tracing::warn!(event_type, %error, "event payload does not match its type");
            EventPayload::Unrecognized {
                event_type: event_type.to_string(),
                payload: raw,
            }
        })
    }

    /// Returns the event type, or `None` for unrecognized payloads.
    pub fn event_type(&self) -> Option<EventType> {
        let event_type = match self {
            EventPayload::DealCreated(_) => EventType::DealCreated,
            EventPayload::DealStatusChanged(_) => EventType::DealStatusChanged,
            EventPayload::TermCreated(_) => EventType::TermCreated,
            EventPayload::TermUpdated(_) => EventType::TermUpdated,
            EventPayload::TermStatusChanged(_) => EventType::TermStatusChanged,
            EventPayload::TermLocked(_) => EventType::TermLocked,
            EventPayload::TermUnlocked(_) => EventType::TermUnlocked,
            EventPayload::ProposalMade(_) => EventType::ProposalMade,
            EventPayload::CounterProposalMade(_) => EventType::CounterProposalMade,
            EventPayload::ProposalAccepted(_) => EventType::ProposalAccepted,
            EventPayload::ProposalRejected(_) => EventType::ProposalRejected,
            EventPayload::ProposalWithdrawn(_) => EventType::ProposalWithdrawn,
            EventPayload::ProposalSuperseded(_) => EventType::ProposalSuperseded,
            EventPayload::CommentAdded(_) => EventType::CommentAdded,
            EventPayload::CommentDeleted(_) => EventType::CommentDeleted,
            EventPayload::ParticipantJoined(_) => EventType::ParticipantJoined,
            EventPayload::ParticipantLeft(_) => EventType::ParticipantLeft,
            EventPayload::ParticipantRoleChanged(_) => EventType::ParticipantRoleChanged,
            EventPayload::DeadlineSet(_) => EventType::DeadlineSet,
            EventPayload::DeadlineRemoved(_) => EventType::DeadlineRemoved,
            EventPayload::DeadlineExtended(_) => EventType::DeadlineExtended,
            EventPayload::Unrecognized { .. } => return None,
        };
        Some(event_type)
    }

    /// Returns the wire type name, including that of unrecognized payloads.
    pub fn type_name(&self) -> &str {
        match self {
            EventPayload::Unrecognized { event_type, .. } => event_type,
            known => known.event_type().map_or("", |t| t.as_str()),
        }
    }

    /// Returns the term this event is scoped to, if any.
    ///
    /// Deal and participant events, deal-level comments, and unrecognized
    /// events are deal-scoped and return `None`.
    pub fn term_id(&self) -> Option<&str> {
        match self {
            EventPayload::TermCreated(d) => Some(&d.term_id),
            EventPayload::TermUpdated(d) => Some(&d.term_id),
            EventPayload::TermStatusChanged(d) => Some(&d.term_id),
            EventPayload::TermLocked(d) => Some(&d.term_id),
            EventPayload::TermUnlocked(d) => Some(&d.term_id),
            EventPayload::ProposalMade(d) => Some(&d.term_id),
            EventPayload::CounterProposalMade(d) => Some(&d.term_id),
            EventPayload::ProposalAccepted(d) => Some(&d.term_id),
            EventPayload::ProposalRejected(d) | EventPayload::ProposalWithdrawn(d) => {
                Some(&d.term_id)
            }
            EventPayload::ProposalSuperseded(d) => Some(&d.term_id),
            EventPayload::CommentAdded(d) => d.term_id.as_deref(),
            EventPayload::CommentDeleted(d) => d.term_id.as_deref(),
            EventPayload::DeadlineSet(d) => Some(&d.term_id),
            EventPayload::DeadlineRemoved(d) => Some(&d.term_id),
            EventPayload::DeadlineExtended(d) => Some(&d.term_id),
            EventPayload::DealCreated(_)
            | EventPayload::DealStatusChanged(_)
            | EventPayload::ParticipantJoined(_)
            | EventPayload::ParticipantLeft(_)
            | EventPayload::ParticipantRoleChanged(_)
            | EventPayload::Unrecognized { .. } => None,
        }
    }

    /// Returns the proposal this event refers to, if any.
    pub fn proposal_id(&self) -> Option<&str> {
        match self {
            EventPayload::ProposalMade(d) => Some(&d.proposal_id),
            EventPayload::CounterProposalMade(d) => Some(&d.proposal_id),
            EventPayload::ProposalAccepted(d) => Some(&d.proposal_id),
            EventPayload::ProposalRejected(d) | EventPayload::ProposalWithdrawn(d) => {
                Some(&d.proposal_id)
            }
            EventPayload::ProposalSuperseded(d) => Some(&d.proposal_id),
            _ => None,
        }
    }

    /// Returns true if this payload is of an unrecognized type.
    pub fn is_unrecognized(&self) -> bool {
        matches!(self, EventPayload::Unrecognized { .. })
    }
}

/// Serializes only the payload body; the type name travels next to it.
impl Serialize for EventPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EventPayload::DealCreated(d) => d.serialize(serializer),
            EventPayload::DealStatusChanged(d) => d.serialize(serializer),
            EventPayload::TermCreated(d) => d.serialize(serializer),
            EventPayload::TermUpdated(d) => d.serialize(serializer),
            EventPayload::TermStatusChanged(d) => d.serialize(serializer),
            EventPayload::TermLocked(d) => d.serialize(serializer),
            EventPayload::TermUnlocked(d) => d.serialize(serializer),
            EventPayload::ProposalMade(d) => d.serialize(serializer),
            EventPayload::CounterProposalMade(d) => d.serialize(serializer),
            EventPayload::ProposalAccepted(d) => d.serialize(serializer),
            EventPayload::ProposalRejected(d) | EventPayload::ProposalWithdrawn(d) => {
                d.serialize(serializer)
            }
            EventPayload::ProposalSuperseded(d) => d.serialize(serializer),
            EventPayload::CommentAdded(d) => d.serialize(serializer),
            EventPayload::CommentDeleted(d) => d.serialize(serializer),
            EventPayload::ParticipantJoined(d) => d.serialize(serializer),
            EventPayload::ParticipantLeft(d) => d.serialize(serializer),
            EventPayload::ParticipantRoleChanged(d) => d.serialize(serializer),
            EventPayload::DeadlineSet(d) => d.serialize(serializer),
            EventPayload::DeadlineRemoved(d) => d.serialize(serializer),
            EventPayload::DeadlineExtended(d) => d.serialize(serializer),
            EventPayload::Unrecognized { payload, .. } => payload.serialize(serializer),
        }
    }
}
