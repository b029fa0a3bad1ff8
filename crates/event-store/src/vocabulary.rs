//! Status and role vocabularies carried inside event payloads.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl DealStatus {
    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStatus::Draft => "draft",
            DealStatus::Active => "active",
            DealStatus::Paused => "paused",
            DealStatus::Completed => "completed",
            DealStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for DealStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Negotiation status of a single term.
///
/// ```text
/// NotStarted ──► InDiscussion ──► Proposed ──► Agreed ──► Locked
///                     ▲               │          ▲          │
///                     └───────────────┘          └──────────┘ (unlock)
/// ```
///
/// Status changes are recorded as facts, so the projector never rejects a
/// transition; the diagram shows the intended flow only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStatus {
    #[default]
    NotStarted,
    InDiscussion,
    Proposed,
    Agreed,
    Locked,
}

impl NegotiationStatus {
    /// Returns true once both sides have settled on a value.
    pub fn is_settled(&self) -> bool {
        matches!(self, NegotiationStatus::Agreed | NegotiationStatus::Locked)
    }

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            NegotiationStatus::NotStarted => "not_started",
            NegotiationStatus::InDiscussion => "in_discussion",
            NegotiationStatus::Proposed => "proposed",
            NegotiationStatus::Agreed => "agreed",
            NegotiationStatus::Locked => "locked",
        }
    }
}

impl std::fmt::Display for NegotiationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role a participant plays in a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealRole {
    DealLead,
    Negotiator,
    Reviewer,
    Observer,
}

impl DealRole {
    /// Returns true for the roles allowed to approve term values.
    pub fn can_approve(&self) -> bool {
        matches!(self, DealRole::DealLead | DealRole::Negotiator)
    }

    /// Returns the wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            DealRole::DealLead => "deal_lead",
            DealRole::Negotiator => "negotiator",
            DealRole::Reviewer => "reviewer",
            DealRole::Observer => "observer",
        }
    }
}

impl std::fmt::Display for DealRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
