//! Entity-level comparison of two projected states.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use projections::{ProjectedState, ProposalStatus};
use serde::Serialize;
use serde_json::Value;

/// How an entity differs between two states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Removed,
    Modified,
    /// A proposal moved from one status to another.
    StatusChanged,
}

/// One field that differs, with JSON renderings of both sides.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: &'static str,
    pub before: Value,
    pub after: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermChange {
    pub term_id: String,
    pub kind: ChangeKind,
    /// Changed fields; empty for created and removed terms.
    pub fields: Vec<FieldChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantChange {
    pub participant_id: String,
    pub kind: ChangeKind,
    pub fields: Vec<FieldChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalChange {
    pub proposal_id: String,
    pub term_id: String,
    pub kind: ChangeKind,
    pub status_before: Option<ProposalStatus>,
    pub status_after: Option<ProposalStatus>,
}

/// Differences between two states, in first-seen order of entity ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateDiff {
    pub term_changes: Vec<TermChange>,
    pub participant_changes: Vec<ParticipantChange>,
    pub proposal_changes: Vec<ProposalChange>,
}

impl StateDiff {
    pub fn is_empty(&self) -> bool {
        self.term_changes.is_empty()
            && self.participant_changes.is_empty()
            && self.proposal_changes.is_empty()
    }

    pub fn total_changes(&self) -> usize {
        self.term_changes.len() + self.participant_changes.len() + self.proposal_changes.len()
    }
}

/// Compares `before` with `after`.
///
/// Ids are visited in the order of `before` followed by ids that only exist
/// in `after`. Entities that compare equal on the tracked fields are left
/// out.
pub fn compare_states(before: &ProjectedState, after: &ProjectedState) -> StateDiff {
    let mut diff = StateDiff::default();

    for term_id in union_keys(&before.terms, &after.terms) {
        let kind_and_fields = match (before.terms.get(term_id), after.terms.get(term_id)) {
            (None, Some(_)) => Some((ChangeKind::Created, Vec::new())),
            (Some(_), None) => Some((ChangeKind::Removed, Vec::new())),
            (Some(a), Some(b)) => {
                let mut fields = Vec::new();
                if a.current_value != b.current_value {
                    fields.push(FieldChange {
                        field: "current_value",
                        before: a.current_value.clone(),
                        after: b.current_value.clone(),
                    });
                }
                push_if_changed(
                    &mut fields,
                    "negotiation_status",
                    &a.negotiation_status,
                    &b.negotiation_status,
                    |s| Value::from(s.as_str()),
                );
                push_if_changed(&mut fields, "is_locked", &a.is_locked, &b.is_locked, |l| {
                    Value::Bool(*l)
                });
                push_if_changed(
                    &mut fields,
                    "deadline",
                    &a.deadline,
                    &b.deadline,
                    deadline_value,
                );
                (!fields.is_empty()).then_some((ChangeKind::Modified, fields))
            }
            (None, None) => None,
        };
        if let Some((kind, fields)) = kind_and_fields {
            diff.term_changes.push(TermChange {
                term_id: term_id.clone(),
                kind,
                fields,
            });
        }
    }

    for participant_id in union_keys(&before.participants, &after.participants) {
        let kind_and_fields = match (
            before.participants.get(participant_id),
            after.participants.get(participant_id),
        ) {
            (None, Some(_)) => Some((ChangeKind::Created, Vec::new())),
            (Some(_), None) => Some((ChangeKind::Removed, Vec::new())),
            (Some(a), Some(b)) => {
                let mut fields = Vec::new();
                push_if_changed(&mut fields, "status", &a.status, &b.status, |s| {
                    Value::from(s.as_str())
                });
                push_if_changed(&mut fields, "deal_role", &a.deal_role, &b.deal_role, |r| {
                    Value::from(r.as_str())
                });
                (!fields.is_empty()).then_some((ChangeKind::Modified, fields))
            }
            (None, None) => None,
        };
        if let Some((kind, fields)) = kind_and_fields {
            diff.participant_changes.push(ParticipantChange {
                participant_id: participant_id.clone(),
                kind,
                fields,
            });
        }
    }

    for proposal_id in union_keys(&before.proposals, &after.proposals) {
        let a = before.proposals.get(proposal_id);
        let b = after.proposals.get(proposal_id);
        let kind = match (a, b) {
            (None, Some(_)) => ChangeKind::Created,
            (Some(_), None) => ChangeKind::Removed,
            (Some(a), Some(b)) if a.status != b.status => ChangeKind::StatusChanged,
            _ => continue,
        };
        let term_id = a.or(b).map(|p| p.term_id.clone()).unwrap_or_default();
        diff.proposal_changes.push(ProposalChange {
            proposal_id: proposal_id.clone(),
            term_id,
            kind,
            status_before: a.map(|p| p.status),
            status_after: b.map(|p| p.status),
        });
    }

    diff
}

fn union_keys<'a, V>(
    a: &'a IndexMap<String, V>,
    b: &'a IndexMap<String, V>,
) -> impl Iterator<Item = &'a String> + 'a {
    a.keys().chain(b.keys().filter(move |k| !a.contains_key(*k)))
}

fn push_if_changed<T: PartialEq>(
    fields: &mut Vec<FieldChange>,
    field: &'static str,
    before: &T,
    after: &T,
    render: impl Fn(&T) -> Value,
) {
    if before != after {
        fields.push(FieldChange {
            field,
            before: render(before),
            after: render(after),
        });
    }
}

fn deadline_value(deadline: &Option<DateTime<Utc>>) -> Value {
    deadline.map_or(Value::Null, |d| Value::String(d.to_rfc3339()))
}
