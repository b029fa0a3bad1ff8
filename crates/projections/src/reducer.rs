//! The pure reducer: `(state, event) -> state'`.
//!
//! Every branch is total. Events that reference a missing term, proposal or
//! participant leave the state untouched (and say so at debug level), and
//! counters never drop below zero, so replaying any log always yields a
//! state.

use event_store::{Event, EventPayload, NegotiationStatus};
use indexmap::map::Entry;

use crate::state::{
    ParticipantState, ParticipantStatus, ProjectedState, ProposalState, ProposalStatus, TermState,
};

/// Applies one event to a state, returning the new state.
///
/// Takes the state by value so folding a log never copies the collections.
pub fn apply_event(mut state: ProjectedState, event: &Event) -> ProjectedState {
    state.apply(event);
    state
}

impl ProjectedState {
    /// Applies one event in place.
    pub fn apply(&mut self, event: &Event) {
        let at = event.timestamp;

        match &event.payload {
            EventPayload::DealCreated(d) => {
                self.deal_name = d.deal_name.clone();
                self.deal_type = d.deal_type.clone();
                self.status = d.status;
                self.mode = d.mode.clone();
                self.target_close_date = d.target_close_date;
                self.created_at = Some(at);
                self.created_by = Some(event.actor.id.clone());
                for p in &d.initial_participants {
                    self.participants.insert(
                        p.participant_id.clone(),
                        ParticipantState {
                            participant_id: p.participant_id.clone(),
                            name: p.name.clone(),
                            organization_id: p.organization_id.clone(),
                            party_type: p.party_type,
                            deal_role: p.role,
                            can_approve: p.role.can_approve(),
                            status: ParticipantStatus::Active,
                            joined_at: at,
                            left_at: None,
                            last_updated_at: at,
                            last_updated_by: event.actor.id.clone(),
                        },
                    );
                }
            }
            EventPayload::DealStatusChanged(d) => {
                self.status = d.new_status;
            }
            EventPayload::TermCreated(d) => match self.terms.entry(d.term_id.clone()) {
                Entry::Occupied(_) => {
                    tracing::debug!(
                        term_id = %d.term_id,
                        sequence = %event.sequence,
                        "term already exists, keeping the original"
                    );
                }
                Entry::Vacant(slot) => {
                    slot.insert(TermState {
                        term_id: d.term_id.clone(),
                        label: d.label.clone(),
                        category: d.category.clone(),
                        value_type: d.value_type.clone(),
                        display_order: d.display_order,
                        current_value: d.initial_value.clone(),
                        current_value_text: d.initial_value_text.clone(),
                        original_value: d.initial_value.clone(),
                        negotiation_status: NegotiationStatus::NotStarted,
                        is_locked: false,
                        pending_proposals_count: 0,
                        comment_count: 0,
                        deadline: None,
                        created_at: at,
                        last_updated_at: at,
                        last_updated_by: event.actor.id.clone(),
                    });
                }
            },
            EventPayload::TermUpdated(d) => self.touch_term(&d.term_id, event, |term| {
                if let Some(label) = &d.changes.label {
                    term.label = label.clone();
                }
                if let Some(value_type) = &d.changes.value_type {
                    term.value_type = value_type.clone();
                }
                if let Some(order) = d.changes.display_order {
                    term.display_order = order;
                }
            }),
            EventPayload::TermStatusChanged(d) => self.touch_term(&d.term_id, event, |term| {
                term.negotiation_status = d.new_status;
            }),
            EventPayload::TermLocked(d) => self.touch_term(&d.term_id, event, |term| {
                term.is_locked = true;
                term.negotiation_status = NegotiationStatus::Locked;
                term.current_value = d.final_value.clone();
                term.current_value_text = d.final_value_text.clone();
            }),
            EventPayload::TermUnlocked(d) => self.touch_term(&d.term_id, event, |term| {
                term.is_locked = false;
                term.negotiation_status = d.restore_status.unwrap_or(NegotiationStatus::Agreed);
            }),
            EventPayload::ProposalMade(d) => {
                if self.open_proposal(ProposalState {
                    proposal_id: d.proposal_id.clone(),
                    term_id: d.term_id.clone(),
                    proposed_value: d.proposed_value.clone(),
                    proposed_value_text: d.proposed_value_text.clone(),
                    rationale: d.rationale.clone(),
                    counters_proposal_id: None,
                    proposed_by: event.actor.id.clone(),
                    proposed_by_name: event.actor.name.clone(),
                    proposer_party_type: event.actor.party_type,
                    status: ProposalStatus::Pending,
                    created_at: at,
                    responded_at: None,
                    responded_by: None,
                    response_reason: None,
                    superseded_by: None,
                    last_updated_at: at,
                    last_updated_by: event.actor.id.clone(),
                }) {
                    self.touch_term(&d.term_id, event, |term| {
                        term.pending_proposals_count += 1;
                    });
                }
            }
            EventPayload::CounterProposalMade(d) => {
                self.settle_proposal(
                    &d.original_proposal_id,
                    event,
                    ProposalStatus::Superseded,
                    |p| p.superseded_by = Some(d.proposal_id.clone()),
                );
                self.open_proposal(ProposalState {
                    proposal_id: d.proposal_id.clone(),
                    term_id: d.term_id.clone(),
                    proposed_value: d.proposed_value.clone(),
                    proposed_value_text: d.proposed_value_text.clone(),
                    rationale: d.rationale.clone(),
                    counters_proposal_id: Some(d.original_proposal_id.clone()),
                    proposed_by: event.actor.id.clone(),
                    proposed_by_name: event.actor.name.clone(),
                    proposer_party_type: event.actor.party_type,
                    status: ProposalStatus::Pending,
                    created_at: at,
                    responded_at: None,
                    responded_by: None,
                    response_reason: None,
                    superseded_by: None,
                    last_updated_at: at,
                    last_updated_by: event.actor.id.clone(),
                });
                // One proposal replaced by another: the pending count stays put.
                self.touch_term(&d.term_id, event, |_| {});
            }
            EventPayload::ProposalAccepted(d) => {
                self.settle_proposal(&d.proposal_id, event, ProposalStatus::Accepted, |p| {
                    p.responded_at = Some(at);
                    p.responded_by = Some(event.actor.id.clone());
                });
                self.touch_term(&d.term_id, event, |term| {
                    term.current_value = d.accepted_value.clone();
                    term.current_value_text = d.accepted_value_text.clone();
                    term.negotiation_status = NegotiationStatus::Agreed;
                    term.pending_proposals_count = term.pending_proposals_count.saturating_sub(1);
                });
            }
            EventPayload::ProposalRejected(d) | EventPayload::ProposalWithdrawn(d) => {
                let status = if matches!(event.payload, EventPayload::ProposalRejected(_)) {
                    ProposalStatus::Rejected
                } else {
                    ProposalStatus::Withdrawn
                };
                self.settle_proposal(&d.proposal_id, event, status, |p| {
                    p.responded_at = Some(at);
                    p.responded_by = Some(event.actor.id.clone());
                    p.response_reason = d.reason.clone();
                });
                self.touch_term(&d.term_id, event, |term| {
                    term.pending_proposals_count = term.pending_proposals_count.saturating_sub(1);
                });
            }
            EventPayload::ProposalSuperseded(d) => {
                self.settle_proposal(&d.proposal_id, event, ProposalStatus::Superseded, |p| {
                    p.superseded_by = d.superseded_by.clone();
                });
            }
            EventPayload::CommentAdded(d) => {
                if let Some(term_id) = &d.term_id {
                    self.touch_term(term_id, event, |term| term.comment_count += 1);
                }
            }
            EventPayload::CommentDeleted(d) => {
                if let Some(term_id) = &d.term_id {
                    self.touch_term(term_id, event, |term| {
                        term.comment_count = term.comment_count.saturating_sub(1);
                    });
                }
            }
            EventPayload::ParticipantJoined(d) => {
                self.participants.insert(
                    d.participant_id.clone(),
                    ParticipantState {
                        participant_id: d.participant_id.clone(),
                        name: d.name.clone(),
                        organization_id: d.organization_id.clone(),
                        party_type: d.party_type,
                        deal_role: d.role,
                        can_approve: d.can_approve.unwrap_or_else(|| d.role.can_approve()),
                        status: ParticipantStatus::Active,
                        joined_at: at,
                        left_at: None,
                        last_updated_at: at,
                        last_updated_by: event.actor.id.clone(),
                    },
                );
            }
            EventPayload::ParticipantLeft(d) => {
                self.touch_participant(&d.participant_id, event, |p| {
                    p.status = ParticipantStatus::Inactive;
                    p.left_at = Some(at);
                });
            }
            EventPayload::ParticipantRoleChanged(d) => {
                self.touch_participant(&d.participant_id, event, |p| {
                    p.deal_role = d.new_role;
                    p.can_approve = d.can_approve.unwrap_or_else(|| d.new_role.can_approve());
                });
            }
            EventPayload::DeadlineSet(d) => self.touch_term(&d.term_id, event, |term| {
                term.deadline = Some(d.deadline);
            }),
            EventPayload::DeadlineRemoved(d) => self.touch_term(&d.term_id, event, |term| {
                term.deadline = None;
            }),
            EventPayload::DeadlineExtended(d) => self.touch_term(&d.term_id, event, |term| {
                term.deadline = Some(d.new_deadline);
            }),
            EventPayload::Unrecognized { event_type, .. } => {
                tracing::debug!(
                    event_type,
                    sequence = %event.sequence,
                    "ignoring unrecognized event"
                );
                return;
            }
        }

        self.updated_at = Some(at);
        self.updated_by = Some(event.actor.id.clone());
        self.last_sequence = event.sequence;
    }

    fn touch_term(&mut self, term_id: &str, event: &Event, update: impl FnOnce(&mut TermState)) {
        match self.terms.get_mut(term_id) {
            Some(term) => {
                update(term);
                term.last_updated_at = event.timestamp;
                term.last_updated_by = event.actor.id.clone();
            }
            None => tracing::debug!(
                term_id,
                sequence = %event.sequence,
                event_type = event.type_name(),
                "term not found, skipping"
            ),
        }
    }

    fn touch_participant(
        &mut self,
        participant_id: &str,
        event: &Event,
        update: impl FnOnce(&mut ParticipantState),
    ) {
        match self.participants.get_mut(participant_id) {
            Some(participant) => {
                update(participant);
                participant.last_updated_at = event.timestamp;
                participant.last_updated_by = event.actor.id.clone();
            }
            None => tracing::debug!(
                participant_id,
                sequence = %event.sequence,
                event_type = event.type_name(),
                "participant not found, skipping"
            ),
        }
    }

    /// Inserts a new pending proposal. Returns false if the id is taken.
    fn open_proposal(&mut self, proposal: ProposalState) -> bool {
        match self.proposals.entry(proposal.proposal_id.clone()) {
            Entry::Occupied(_) => {
                tracing::debug!(
                    proposal_id = %proposal.proposal_id,
                    "proposal already exists, keeping the original"
                );
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(proposal);
                true
            }
        }
    }

    /// Moves a pending proposal to a terminal status.
    ///
    /// Proposals that already left `pending` keep their status.
    fn settle_proposal(
        &mut self,
        proposal_id: &str,
        event: &Event,
        status: ProposalStatus,
        update: impl FnOnce(&mut ProposalState),
    ) {
        let Some(proposal) = self.proposals.get_mut(proposal_id) else {
            tracing::debug!(
                proposal_id,
                sequence = %event.sequence,
                "proposal not found, skipping"
            );
            return;
        };
        if proposal.status.is_terminal() {
            tracing::debug!(
                proposal_id,
                current = %proposal.status,
                requested = %status,
                "proposal already settled, keeping its status"
            );
            return;
        }

        proposal.status = status;
        update(proposal);
        proposal.last_updated_at = event.timestamp;
        proposal.last_updated_by = event.actor.id.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use event_store::{DealRole, DealStatus, PartyType};
    use serde_json::json;

    #[test]
    fn deal_created_sets_scalars_and_seeds_participants() {
        let id = deal_id();
        let state = apply_event(ProjectedState::empty(id), &deal_created(id, 1));

        assert_eq!(state.deal_name, "Acme refinancing");
        assert_eq!(state.deal_type, "term_loan");
        assert_eq!(state.status, DealStatus::Draft);
        assert_eq!(state.created_at, Some(at(1)));
        assert_eq!(state.updated_at, Some(at(1)));
        assert_eq!(state.last_sequence.as_u64(), 1);

        let lead = state.participant("lead").unwrap();
        assert_eq!(lead.deal_role, DealRole::DealLead);
        assert!(lead.can_approve);
        assert_eq!(lead.status, ParticipantStatus::Active);

        let reviewer = state.participant("counsel").unwrap();
        assert!(!reviewer.can_approve);
    }

    #[test]
    fn term_created_initialises_counters() {
        let id = deal_id();
        let state = fold(id, &[deal_created(id, 1), term_created(id, 2, "rate", json!(100))]);

        let term = state.term("rate").unwrap();
        assert_eq!(term.current_value, json!(100));
        assert_eq!(term.original_value, json!(100));
        assert_eq!(term.negotiation_status, NegotiationStatus::NotStarted);
        assert!(!term.is_locked);
        assert_eq!(term.pending_proposals_count, 0);
        assert_eq!(term.comment_count, 0);
        assert_eq!(term.last_updated_at, at(2));
    }

    #[test]
    fn duplicate_term_created_keeps_first() {
        let id = deal_id();
        let state = fold(
            id,
            &[
                term_created(id, 1, "rate", json!(100)),
                term_created(id, 2, "rate", json!(999)),
            ],
        );
        assert_eq!(state.term("rate").unwrap().original_value, json!(100));
    }

    #[test]
    fn accepted_proposal_settles_term() {
        let id = deal_id();
        let state = fold(
            id,
            &[
                deal_created(id, 1),
                term_created(id, 2, "rate", json!(100)),
                proposal_made(id, 3, "rate", "p-1", json!(120)),
                proposal_accepted(id, 4, "rate", "p-1", json!(120)),
            ],
        );

        let term = state.term("rate").unwrap();
        assert_eq!(term.current_value, json!(120));
        assert_eq!(term.negotiation_status, NegotiationStatus::Agreed);
        assert_eq!(term.pending_proposals_count, 0);

        let proposal = state.proposal("p-1").unwrap();
        assert_eq!(proposal.status, ProposalStatus::Accepted);
        assert_eq!(proposal.responded_at, Some(at(4)));
        assert_eq!(proposal.proposer_party_type, PartyType::BorrowerSide);
    }

    #[test]
    fn counter_proposal_keeps_pending_count() {
        let id = deal_id();
        let state = fold(
            id,
            &[
                term_created(id, 1, "rate", json!(100)),
                proposal_made(id, 2, "rate", "p-1", json!(120)),
                counter_proposal(id, 3, "rate", "p-2", "p-1", json!(110)),
            ],
        );

        assert_eq!(state.term("rate").unwrap().pending_proposals_count, 1);
        let original = state.proposal("p-1").unwrap();
        assert_eq!(original.status, ProposalStatus::Superseded);
        assert_eq!(original.superseded_by.as_deref(), Some("p-2"));

        let counter = state.proposal("p-2").unwrap();
        assert_eq!(counter.status, ProposalStatus::Pending);
        assert_eq!(counter.counters_proposal_id.as_deref(), Some("p-1"));
    }

    #[test]
    fn rejection_floors_pending_count_at_zero() {
        let id = deal_id();
        let state = fold(
            id,
            &[
                term_created(id, 1, "rate", json!(100)),
                proposal_rejected(id, 2, "rate", "ghost"),
                proposal_rejected(id, 3, "rate", "ghost"),
            ],
        );
        assert_eq!(state.term("rate").unwrap().pending_proposals_count, 0);
    }

    #[test]
    fn settled_proposal_never_returns_to_pending() {
        let id = deal_id();
        let state = fold(
            id,
            &[
                term_created(id, 1, "rate", json!(100)),
                proposal_made(id, 2, "rate", "p-1", json!(120)),
                proposal_rejected(id, 3, "rate", "p-1"),
                proposal_made(id, 4, "rate", "p-1", json!(130)),
                proposal_accepted(id, 5, "rate", "p-1", json!(130)),
            ],
        );

        let proposal = state.proposal("p-1").unwrap();
        assert_eq!(proposal.status, ProposalStatus::Rejected);
        assert_eq!(proposal.proposed_value, json!(120));
    }

    #[test]
    fn lock_and_unlock() {
        let id = deal_id();
        let locked = fold(
            id,
            &[
                term_created(id, 1, "rate", json!(100)),
                term_locked(id, 2, "rate", json!(115)),
            ],
        );
        let term = locked.term("rate").unwrap();
        assert!(term.is_locked);
        assert_eq!(term.negotiation_status, NegotiationStatus::Locked);
        assert_eq!(term.current_value, json!(115));

        let unlocked = apply_event(locked.clone(), &term_unlocked(id, 3, "rate", None));
        let term = unlocked.term("rate").unwrap();
        assert!(!term.is_locked);
        assert_eq!(term.negotiation_status, NegotiationStatus::Agreed);

        let restored = apply_event(
            locked,
            &term_unlocked(id, 3, "rate", Some(NegotiationStatus::Proposed)),
        );
        assert_eq!(
            restored.term("rate").unwrap().negotiation_status,
            NegotiationStatus::Proposed
        );
    }

    #[test]
    fn comments_count_up_and_floor_at_zero() {
        let id = deal_id();
        let state = fold(
            id,
            &[
                term_created(id, 1, "rate", json!(100)),
                comment_added(id, 2, Some("rate")),
                comment_deleted(id, 3, Some("rate")),
                comment_deleted(id, 4, Some("rate")),
                comment_added(id, 5, Some("rate")),
                comment_added(id, 6, None),
            ],
        );
        assert_eq!(state.term("rate").unwrap().comment_count, 1);
    }

    #[test]
    fn participants_are_deactivated_not_removed() {
        let id = deal_id();
        let state = fold(
            id,
            &[
                participant_joined(id, 1, "u-9", DealRole::Observer),
                participant_role_changed(id, 2, "u-9", DealRole::Negotiator),
                participant_left(id, 3, "u-9"),
            ],
        );

        let p = state.participant("u-9").unwrap();
        assert_eq!(p.status, ParticipantStatus::Inactive);
        assert_eq!(p.deal_role, DealRole::Negotiator);
        assert!(p.can_approve);
        assert_eq!(p.left_at, Some(at(3)));
    }

    #[test]
    fn deadlines_overwrite_term_field() {
        let id = deal_id();
        let state = fold(
            id,
            &[
                term_created(id, 1, "rate", json!(100)),
                deadline_set(id, 2, "rate", at(100)),
            ],
        );
        assert_eq!(state.term("rate").unwrap().deadline, Some(at(100)));

        let extended = apply_event(state, &deadline_extended(id, 3, "rate", at(200)));
        assert_eq!(extended.term("rate").unwrap().deadline, Some(at(200)));

        let removed = apply_event(extended, &deadline_removed(id, 4, "rate"));
        assert_eq!(removed.term("rate").unwrap().deadline, None);
    }

    #[test]
    fn events_for_missing_term_are_noops_except_deal_stamp() {
        let id = deal_id();
        let before = fold(id, &[deal_created(id, 1)]);
        let accepted = proposal_accepted(id, 2, "ghost", "p-x", json!(1));
        let after = apply_event(before.clone(), &accepted);

        assert_eq!(after.terms, before.terms);
        assert_eq!(after.proposals, before.proposals);
        assert_eq!(after.updated_at, Some(at(2)));
    }

    #[test]
    fn unrecognized_event_changes_nothing() {
        let id = deal_id();
        let before = fold(id, &[deal_created(id, 1)]);
        let after = apply_event(before.clone(), &unrecognized(id, 2));
        assert_eq!(after, before);
    }

    #[test]
    fn term_updated_merges_changes() {
        let id = deal_id();
        let state = fold(
            id,
            &[
                term_created(id, 1, "rate", json!(100)),
                term_updated(id, 2, "rate", Some("Margin"), None),
            ],
        );
        let term = state.term("rate").unwrap();
        assert_eq!(term.label, "Margin");
        assert_eq!(term.value_type, "percentage");
        assert_eq!(term.current_value, json!(100));
    }

    #[test]
    fn status_events_overwrite() {
        let id = deal_id();
        let state = fold(
            id,
            &[
                deal_created(id, 1),
                deal_status_changed(id, 2, DealStatus::Active),
                term_created(id, 3, "rate", json!(100)),
                term_status_changed(id, 4, "rate", NegotiationStatus::InDiscussion),
            ],
        );
        assert_eq!(state.status, DealStatus::Active);
        assert_eq!(
            state.term("rate").unwrap().negotiation_status,
            NegotiationStatus::InDiscussion
        );
    }
}
