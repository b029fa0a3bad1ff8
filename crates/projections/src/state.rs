//! The deal read model produced by folding events.

use chrono::{DateTime, Utc};
use common::{AggregateId, PartyType};
use event_store::{DealRole, DealStatus, NegotiationStatus, Sequence};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Status of a single proposal.
///
/// `Pending` is the only non-terminal status; once a proposal leaves it the
/// projector never moves it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
    Superseded,
    Withdrawn,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProposalStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Superseded => "superseded",
            ProposalStatus::Withdrawn => "withdrawn",
        }
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a participant. Participants are never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Invited,
    Active,
    Inactive,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Invited => "invited",
            ParticipantStatus::Active => "active",
            ParticipantStatus::Inactive => "inactive",
        }
    }
}

/// Current state of one negotiable term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermState {
    pub term_id: String,
    pub label: String,
    pub category: Option<String>,
    pub value_type: String,
    pub display_order: i32,
    pub current_value: serde_json::Value,
    pub current_value_text: Option<String>,
    pub original_value: serde_json::Value,
    pub negotiation_status: NegotiationStatus,
    pub is_locked: bool,
    pub pending_proposals_count: u32,
    pub comment_count: u32,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub last_updated_by: String,
}

/// A proposed value for a term and how it was answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalState {
    pub proposal_id: String,
    pub term_id: String,
    pub proposed_value: serde_json::Value,
    pub proposed_value_text: Option<String>,
    pub rationale: Option<String>,
    /// The proposal this one counters, if it is a counter-proposal.
    pub counters_proposal_id: Option<String>,
    pub proposed_by: String,
    pub proposed_by_name: String,
    pub proposer_party_type: PartyType,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub responded_by: Option<String>,
    pub response_reason: Option<String>,
    pub superseded_by: Option<String>,
    pub last_updated_at: DateTime<Utc>,
    pub last_updated_by: String,
}

/// A person taking part in the negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantState {
    pub participant_id: String,
    pub name: String,
    pub organization_id: Option<String>,
    pub party_type: PartyType,
    pub deal_role: DealRole,
    pub can_approve: bool,
    pub status: ParticipantStatus,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub last_updated_at: DateTime<Utc>,
    pub last_updated_by: String,
}

/// Materialized view of one deal at some point of its history.
///
/// Derived entirely from events; it is never the source of truth. Two
/// projections of the same ordered events compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedState {
    pub deal_id: AggregateId,
    pub deal_name: String,
    pub deal_type: String,
    pub status: DealStatus,
    pub mode: String,
    pub target_close_date: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    /// Sequence of the last event folded into this state.
    pub last_sequence: Sequence,
    pub terms: IndexMap<String, TermState>,
    pub participants: IndexMap<String, ParticipantState>,
    pub proposals: IndexMap<String, ProposalState>,
}

impl ProjectedState {
    /// The canonical state before any event has been applied.
    pub fn empty(deal_id: AggregateId) -> Self {
        Self {
            deal_id,
            deal_name: String::new(),
            deal_type: String::new(),
            status: DealStatus::default(),
            mode: String::new(),
            target_close_date: None,
            created_at: None,
            created_by: None,
            updated_at: None,
            updated_by: None,
            last_sequence: Sequence::initial(),
            terms: IndexMap::new(),
            participants: IndexMap::new(),
            proposals: IndexMap::new(),
        }
    }

    pub fn term(&self, term_id: &str) -> Option<&TermState> {
        self.terms.get(term_id)
    }

    pub fn proposal(&self, proposal_id: &str) -> Option<&ProposalState> {
        self.proposals.get(proposal_id)
    }

    pub fn participant(&self, participant_id: &str) -> Option<&ParticipantState> {
        self.participants.get(participant_id)
    }

    /// Returns the proposals made on one term, in the order they were made.
    pub fn proposals_for_term<'a>(
        &'a self,
        term_id: &'a str,
    ) -> impl Iterator<Item = &'a ProposalState> + 'a {
        self.proposals.values().filter(move |p| p.term_id == term_id)
    }

    /// Returns true if no deal event has been applied yet.
    pub fn is_empty(&self) -> bool {
        self.last_sequence == Sequence::initial()
    }
}
