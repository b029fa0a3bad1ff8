use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::snapshot::{Snapshot, SnapshotStore};
use crate::{AggregateId, Event, EventQuery, EventStoreError, Result, Sequence};

/// Append-only storage of deal events, keyed by aggregate id.
///
/// Every read returns events ordered by sequence, oldest first, and an
/// unknown aggregate reads as an empty log rather than an error.
///
/// There is no expected-version guard on [`EventStore::append`]: the engine
/// assumes a single writer per aggregate. Two concurrent writers can race
/// for the same sequence; an implementation backed by shared storage must
/// enforce compare-and-swap itself if it needs that guarantee.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events to an aggregate's log.
    ///
    /// The batch is applied atomically. An empty batch is a no-op. Sequences
    /// may arrive out of order but must not repeat or reuse a stored one.
    async fn append(&self, events: Vec<Event>) -> Result<()>;

    /// Retrieves the full log of an aggregate.
    async fn get_events(&self, aggregate_id: AggregateId) -> Result<Vec<Event>>;

    /// Retrieves events with `sequence >= from`.
    async fn get_events_from(&self, aggregate_id: AggregateId, from: Sequence)
    -> Result<Vec<Event>>;

    /// Retrieves events whose timestamp is at or before `until`.
    ///
    /// The filter uses wall-clock timestamps; the result is still ordered
    /// by sequence.
    async fn get_events_until(
        &self,
        aggregate_id: AggregateId,
        until: DateTime<Utc>,
    ) -> Result<Vec<Event>>;

    /// Retrieves events scoped to one term.
    async fn get_term_events(&self, aggregate_id: AggregateId, term_id: &str)
    -> Result<Vec<Event>>;

    /// Retrieves events matching a predicate query.
    async fn query_events(&self, aggregate_id: AggregateId, query: EventQuery)
    -> Result<Vec<Event>>;

    /// Highest sequence seen for the aggregate, `0` if it has no events.
    async fn get_latest_sequence(&self, aggregate_id: AggregateId) -> Result<Sequence>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends a single event.
    async fn append_event(&self, event: Event) -> Result<()> {
        self.append(vec![event]).await
    }

    /// Checks if an aggregate has any events.
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_latest_sequence(aggregate_id).await? > Sequence::initial())
    }

    /// Loads the newest snapshot at or before `at` (or the latest one) and
    /// the events that follow it.
    ///
    /// Without a snapshot, returns the whole log (bounded by `at`).
    async fn load_after_snapshot<S>(
        &self,
        snapshots: &dyn SnapshotStore<S>,
        aggregate_id: AggregateId,
        at: Option<Sequence>,
    ) -> Result<(Option<Snapshot<S>>, Vec<Event>)>
    where
        S: Clone + Send + Sync + 'static,
    {
        let snapshot = match at {
            Some(sequence) => snapshots.get_at_sequence(aggregate_id, sequence).await?,
            None => snapshots.get_latest(aggregate_id).await?,
        };

        let from = snapshot
            .as_ref()
            .map_or(Sequence::first(), |s| s.sequence.next());
        let mut events = self.get_events_from(aggregate_id, from).await?;
        if let Some(at) = at {
            events.retain(|e| e.sequence <= at);
        }
        Ok((snapshot, events))
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates a batch before appending.
///
/// Returns the batch's aggregate id, or `None` for an empty batch. Checks
/// that every event targets the same aggregate, that no sequence repeats
/// within the batch, and that none collides with `taken`.
pub fn validate_events_for_append(
    events: &[Event],
    taken: impl Fn(Sequence) -> bool,
) -> Result<Option<AggregateId>> {
    let Some(first) = events.first() else {
        return Ok(None);
    };
    let aggregate_id = first.aggregate_id;

    let mut seen = HashSet::with_capacity(events.len());
    for event in events {
        if event.aggregate_id != aggregate_id {
            return Err(EventStoreError::MixedAggregates {
                expected: aggregate_id,
                found: event.aggregate_id,
            });
        }
        if !seen.insert(event.sequence) || taken(event.sequence) {
            return Err(EventStoreError::DuplicateSequence {
                aggregate_id,
                sequence: event.sequence,
            });
        }
    }

    Ok(Some(aggregate_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventId;
    use crate::payload::{DeadlineRemovedData, EventPayload};
    use common::RandomIdGenerator;

    fn event(aggregate_id: AggregateId, sequence: u64) -> Event {
        Event::builder(
            EventId::generate(&RandomIdGenerator),
            aggregate_id,
            sequence,
            EventPayload::DeadlineRemoved(DeadlineRemovedData {
                term_id: "rate".into(),
            }),
        )
        .build()
    }

    #[test]
    fn empty_batch_is_valid_and_targets_nothing() {
        assert!(matches!(validate_events_for_append(&[], |_| false), Ok(None)));
    }

    #[test]
    fn mixed_aggregates_are_rejected() {
        let batch = [event(AggregateId::new(), 1), event(AggregateId::new(), 2)];
        assert!(matches!(
            validate_events_for_append(&batch, |_| false),
            Err(EventStoreError::MixedAggregates { .. })
        ));
    }

    #[test]
    fn repeated_sequences_are_rejected() {
        let id = AggregateId::new();
        let batch = [event(id, 2), event(id, 2)];
        assert!(matches!(
            validate_events_for_append(&batch, |_| false),
            Err(EventStoreError::DuplicateSequence { .. })
        ));

        let batch = [event(id, 3)];
        assert!(matches!(
            validate_events_for_append(&batch, |s| s == Sequence::new(3)),
            Err(EventStoreError::DuplicateSequence { .. })
        ));
    }

    #[test]
    fn out_of_order_sequences_are_accepted() {
        let id = AggregateId::new();
        let batch = [event(id, 4), event(id, 2), event(id, 3)];
        assert_eq!(validate_events_for_append(&batch, |_| false).unwrap(), Some(id));
    }
}
