//! Property tests for deal projection.
//!
//! Logs are generated from a small pool of term and proposal ids so that
//! generated events frequently collide: proposals answered twice, terms
//! touched before creation, counters on settled proposals.

use event_store::{AggregateId, Event, NegotiationStatus, Sequence, Snapshot};
use projections::testing::*;
use projections::{
    ProjectedState, ProjectionOptions, ProposalStatus, project, project_all,
    project_from_snapshot, replay_prefixes,
};
use proptest::prelude::*;
use serde_json::json;

const TERMS: [&str; 3] = ["rate", "tenor", "fees"];
const PROPOSALS: [&str; 5] = ["p-0", "p-1", "p-2", "p-3", "p-4"];

#[derive(Debug, Clone)]
enum Op {
    CreateTerm(usize),
    Propose(usize, usize),
    Counter(usize, usize, usize),
    Accept(usize, usize),
    Reject(usize, usize),
    Withdraw(usize, usize),
    Comment(usize),
    Uncomment(usize),
    Lock(usize),
    Unlock(usize),
    Unknown,
}

// ============================================================================
// Strategies
// ============================================================================

fn op() -> impl Strategy<Value = Op> {
    let term = 0..TERMS.len();
    let proposal = 0..PROPOSALS.len();
    prop_oneof![
        3 => term.clone().prop_map(Op::CreateTerm),
        4 => (term.clone(), proposal.clone()).prop_map(|(t, p)| Op::Propose(t, p)),
        2 => (term.clone(), proposal.clone(), proposal.clone())
            .prop_map(|(t, p, o)| Op::Counter(t, p, o)),
        2 => (term.clone(), proposal.clone()).prop_map(|(t, p)| Op::Accept(t, p)),
        2 => (term.clone(), proposal.clone()).prop_map(|(t, p)| Op::Reject(t, p)),
        1 => (term.clone(), proposal).prop_map(|(t, p)| Op::Withdraw(t, p)),
        2 => term.clone().prop_map(Op::Comment),
        2 => term.clone().prop_map(Op::Uncomment),
        1 => term.clone().prop_map(Op::Lock),
        1 => term.prop_map(Op::Unlock),
        1 => Just(Op::Unknown),
    ]
}

fn log() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op(), 0..40)
}

fn to_events(id: AggregateId, ops: &[Op]) -> Vec<Event> {
    let mut events = vec![deal_created(id, 1)];
    for (i, op) in ops.iter().enumerate() {
        let seq = i as u64 + 2;
        let event = match *op {
            Op::CreateTerm(t) => term_created(id, seq, TERMS[t], json!(seq)),
            Op::Propose(t, p) => proposal_made(id, seq, TERMS[t], PROPOSALS[p], json!(seq)),
            Op::Counter(t, p, o) => {
                counter_proposal(id, seq, TERMS[t], PROPOSALS[p], PROPOSALS[o], json!(seq))
            }
            Op::Accept(t, p) => proposal_accepted(id, seq, TERMS[t], PROPOSALS[p], json!(seq)),
            Op::Reject(t, p) => proposal_rejected(id, seq, TERMS[t], PROPOSALS[p]),
            Op::Withdraw(t, p) => proposal_withdrawn(id, seq, TERMS[t], PROPOSALS[p]),
            Op::Comment(t) => comment_added(id, seq, Some(TERMS[t])),
            Op::Uncomment(t) => comment_deleted(id, seq, Some(TERMS[t])),
            Op::Lock(t) => term_locked(id, seq, TERMS[t], json!(seq)),
            Op::Unlock(t) => term_unlocked(id, seq, TERMS[t], None),
            Op::Unknown => unrecognized(id, seq),
        };
        events.push(event);
    }
    events
}

/// A log together with a permutation of its events.
fn shuffled_log() -> impl Strategy<Value = (Vec<Op>, Vec<usize>)> {
    log().prop_flat_map(|ops| {
        let order: Vec<usize> = (0..=ops.len()).collect();
        (Just(ops), Just(order).prop_shuffle())
    })
}

/// A log together with a snapshot cut point inside it.
fn log_with_cut() -> impl Strategy<Value = (Vec<Op>, u64)> {
    log().prop_flat_map(|ops| {
        let len = ops.len() as u64 + 1;
        (Just(ops), 0..=len)
    })
}

fn prefix_states(id: AggregateId, events: &[Event]) -> Vec<(ProjectedState, Event)> {
    let mut states = Vec::new();
    replay_prefixes(id, events, None, |state, event, _| {
        states.push((state.clone(), event.clone()));
    });
    states
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Projection depends on sequence order only, never on input order.
    #[test]
    fn prop_projection_ignores_input_order((ops, order) in shuffled_log()) {
        let id = deal_id();
        let events = to_events(id, &ops);
        let shuffled: Vec<Event> = order.iter().map(|&i| events[i].clone()).collect();

        prop_assert_eq!(project_all(id, &shuffled), project_all(id, &events));
    }

    /// Resuming from any snapshot equals projecting from scratch.
    #[test]
    fn prop_snapshot_resume_is_equivalent((ops, cut) in log_with_cut()) {
        let id = deal_id();
        let events = to_events(id, &ops);

        let base = project(id, &events, &ProjectionOptions::new().until_sequence(cut));
        let snapshot = Snapshot::new(id, Sequence::new(cut), base);

        prop_assert_eq!(project_from_snapshot(&snapshot, &events), project_all(id, &events));
    }

    /// A counter-proposal replaces one proposal with another and leaves the
    /// term's pending count as it was.
    #[test]
    fn prop_counter_proposal_keeps_pending_count(ops in log()) {
        let id = deal_id();
        let events = to_events(id, &ops);
        let states = prefix_states(id, &events);

        for pair in states.windows(2) {
            let (before, _) = &pair[0];
            let (after, event) = &pair[1];
            if event.type_name() != "counter_proposal_made" {
                continue;
            }
            for (term_id, term) in &after.terms {
                let previous = before.term(term_id).map(|t| t.pending_proposals_count);
                prop_assert_eq!(previous, Some(term.pending_proposals_count));
            }
        }
    }

    /// Once a proposal leaves `pending` its status never changes again.
    #[test]
    fn prop_terminal_proposal_status_is_final(ops in log()) {
        let id = deal_id();
        let events = to_events(id, &ops);
        let states = prefix_states(id, &events);

        for pair in states.windows(2) {
            let (before, _) = &pair[0];
            let (after, _) = &pair[1];
            for (proposal_id, proposal) in &before.proposals {
                if proposal.status.is_terminal() {
                    let later = after.proposal(proposal_id).map(|p| p.status);
                    prop_assert_eq!(later, Some(proposal.status));
                }
            }
        }
    }

    /// A term reporting the locked status always carries the lock flag.
    #[test]
    fn prop_locked_status_implies_lock_flag(ops in log()) {
        let id = deal_id();
        let state = project_all(id, &to_events(id, &ops));

        for term in state.terms.values() {
            if term.negotiation_status == NegotiationStatus::Locked {
                prop_assert!(term.is_locked, "{} locked without flag", term.term_id);
            }
        }
    }

    /// Unknown events are carried in the log but change nothing.
    #[test]
    fn prop_unknown_events_are_inert(ops in log()) {
        let id = deal_id();
        let events = to_events(id, &ops);
        let known: Vec<Event> = events
            .iter()
            .filter(|e| e.event_type().is_some())
            .cloned()
            .collect();

        prop_assert_eq!(project_all(id, &events), project_all(id, &known));
    }

    /// Projecting a prefix by sequence equals folding exactly that prefix.
    #[test]
    fn prop_until_sequence_is_prefix_fold((ops, cut) in log_with_cut()) {
        let id = deal_id();
        let events = to_events(id, &ops);
        let prefix: Vec<Event> = events
            .iter()
            .filter(|e| e.sequence.as_u64() <= cut)
            .cloned()
            .collect();

        prop_assert_eq!(
            project(id, &events, &ProjectionOptions::new().until_sequence(cut)),
            fold(id, &prefix)
        );
    }
}

#[test]
fn accepted_counter_proposal_settles_the_term() {
    let id = deal_id();
    let state = project_all(id, &rate_negotiation(id));

    let rate = state.term("rate").unwrap();
    assert_eq!(rate.current_value, json!(4.75));
    assert_eq!(rate.original_value, json!(5.0));
    assert_eq!(rate.negotiation_status, NegotiationStatus::Locked);
    assert_eq!(rate.pending_proposals_count, 0);
    assert_eq!(rate.comment_count, 1);

    assert_eq!(state.proposal("p-1").unwrap().status, ProposalStatus::Superseded);
    assert_eq!(state.proposal("p-2").unwrap().status, ProposalStatus::Accepted);
    assert_eq!(state.last_sequence, Sequence::new(8));
}
