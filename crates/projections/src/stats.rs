//! Summary counts over a projected deal.

use chrono::{DateTime, Utc};
use event_store::{NegotiationStatus, PartyType};
use indexmap::IndexMap;
use serde::Serialize;

use crate::state::{ParticipantStatus, ProjectedState, ProposalStatus, TermState};

/// Term counts by negotiation status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TermStatusCounts {
    pub not_started: usize,
    pub in_discussion: usize,
    pub proposed: usize,
    pub agreed: usize,
    pub locked: usize,
}

impl TermStatusCounts {
    fn record(&mut self, status: NegotiationStatus) {
        match status {
            NegotiationStatus::NotStarted => self.not_started += 1,
            NegotiationStatus::InDiscussion => self.in_discussion += 1,
            NegotiationStatus::Proposed => self.proposed += 1,
            NegotiationStatus::Agreed => self.agreed += 1,
            NegotiationStatus::Locked => self.locked += 1,
        }
    }

    /// Terms that are agreed or locked.
    pub fn settled(&self) -> usize {
        self.agreed + self.locked
    }
}

/// Proposal counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProposalStatusCounts {
    pub pending: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub superseded: usize,
    pub withdrawn: usize,
}

impl ProposalStatusCounts {
    fn record(&mut self, status: ProposalStatus) {
        match status {
            ProposalStatus::Pending => self.pending += 1,
            ProposalStatus::Accepted => self.accepted += 1,
            ProposalStatus::Rejected => self.rejected += 1,
            ProposalStatus::Superseded => self.superseded += 1,
            ProposalStatus::Withdrawn => self.withdrawn += 1,
        }
    }
}

/// Dashboard numbers for one deal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealStats {
    pub total_terms: usize,
    pub terms_by_status: TermStatusCounts,
    /// Share of terms that are agreed or locked, in percent.
    pub progress_percent: f64,
    pub total_proposals: usize,
    pub proposals_by_status: ProposalStatusCounts,
    pub total_comments: u64,
    pub active_participants: usize,
    pub participants_by_party: IndexMap<PartyType, usize>,
}

impl DealStats {
    pub fn from_state(state: &ProjectedState) -> Self {
        let mut terms_by_status = TermStatusCounts::default();
        let mut total_comments = 0u64;
        for term in state.terms.values() {
            terms_by_status.record(term.negotiation_status);
            total_comments += u64::from(term.comment_count);
        }

        let mut proposals_by_status = ProposalStatusCounts::default();
        for proposal in state.proposals.values() {
            proposals_by_status.record(proposal.status);
        }

        let mut participants_by_party = IndexMap::new();
        let mut active_participants = 0;
        for participant in state.participants.values() {
            if participant.status == ParticipantStatus::Active {
                active_participants += 1;
                *participants_by_party.entry(participant.party_type).or_insert(0) += 1;
            }
        }

        let total_terms = state.terms.len();
        let progress_percent = if total_terms == 0 {
            0.0
        } else {
            terms_by_status.settled() as f64 * 100.0 / total_terms as f64
        };

        Self {
            total_terms,
            terms_by_status,
            progress_percent,
            total_proposals: state.proposals.len(),
            proposals_by_status,
            total_comments,
            active_participants,
            participants_by_party,
        }
    }
}

/// Unsettled terms whose deadline is before `now`, earliest first.
pub fn overdue_terms(state: &ProjectedState, now: DateTime<Utc>) -> Vec<&TermState> {
    let mut overdue: Vec<&TermState> = state
        .terms
        .values()
        .filter(|t| !t.negotiation_status.is_settled())
        .filter(|t| t.deadline.is_some_and(|d| d < now))
        .collect();
    overdue.sort_by_key(|t| t.deadline);
    overdue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector::project_all;
    use crate::testing::*;
    use serde_json::json;

    #[test]
    fn stats_for_empty_deal() {
        let stats = DealStats::from_state(&ProjectedState::empty(deal_id()));
        assert_eq!(stats.total_terms, 0);
        assert_eq!(stats.progress_percent, 0.0);
        assert!(stats.participants_by_party.is_empty());
    }

    #[test]
    fn stats_after_rate_negotiation() {
        let id = deal_id();
        let stats = DealStats::from_state(&project_all(id, &rate_negotiation(id)));

        assert_eq!(stats.total_terms, 2);
        assert_eq!(stats.terms_by_status.locked, 1);
        assert_eq!(stats.terms_by_status.not_started, 1);
        assert_eq!(stats.progress_percent, 50.0);
        assert_eq!(stats.total_proposals, 2);
        assert_eq!(stats.proposals_by_status.accepted, 1);
        assert_eq!(stats.proposals_by_status.superseded, 1);
        assert_eq!(stats.total_comments, 1);
        assert_eq!(stats.active_participants, 2);
        assert_eq!(stats.participants_by_party.get(&PartyType::LenderSide), Some(&1));
    }

    #[test]
    fn overdue_skips_settled_and_future_deadlines() {
        let id = deal_id();
        let state = project_all(
            id,
            &[
                term_created(id, 1, "rate", json!(5)),
                term_created(id, 2, "tenor", json!(36)),
                term_created(id, 3, "fees", json!(1)),
                deadline_set(id, 4, "rate", at(10)),
                deadline_set(id, 5, "tenor", at(500)),
                deadline_set(id, 6, "fees", at(5)),
                term_locked(id, 7, "fees", json!(1)),
            ],
        );

        let overdue: Vec<&str> = overdue_terms(&state, at(100))
            .iter()
            .map(|t| t.term_id.as_str())
            .collect();
        assert_eq!(overdue, vec!["rate"]);
    }
}
