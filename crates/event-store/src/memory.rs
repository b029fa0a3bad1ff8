use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    AggregateId, Event, EventQuery, Result, Sequence,
    store::{EventStore, validate_events_for_append},
};

/// One aggregate's log, kept sorted by sequence.
#[derive(Default)]
struct AggregateLog {
    events: Vec<Event>,
    latest: Sequence,
}

impl AggregateLog {
    fn contains(&self, sequence: Sequence) -> bool {
        self.events
            .binary_search_by_key(&sequence, |e| e.sequence)
            .is_ok()
    }

    fn insert(&mut self, event: Event) {
        self.latest = self.latest.max(event.sequence);
        let index = self.events.partition_point(|e| e.sequence < event.sequence);
        self.events.insert(index, event);
    }
}

/// In-memory event store.
///
/// Appends for all aggregates are serialised behind one write lock; reads
/// share the lock. Each log is stored in sequence order, so out-of-order
/// appends are already sorted when read back.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    logs: Arc<RwLock<HashMap<AggregateId, AggregateLog>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored across all aggregates.
    pub async fn event_count(&self) -> usize {
        self.logs
            .read()
            .await
            .values()
            .map(|log| log.events.len())
            .sum()
    }

    async fn select(
        &self,
        aggregate_id: AggregateId,
        keep: impl Fn(&Event) -> bool,
    ) -> Vec<Event> {
        let logs = self.logs.read().await;
        logs.get(&aggregate_id)
            .map(|log| log.events.iter().filter(|&e| keep(e)).cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    async fn append(&self, events: Vec<Event>) -> Result<()> {
        let mut logs = self.logs.write().await;

        let aggregate_id = match events.first() {
            Some(first) => first.aggregate_id,
            None => return Ok(()),
        };
        let existing = logs.get(&aggregate_id);
        validate_events_for_append(&events, |sequence| {
            existing.is_some_and(|log| log.contains(sequence))
        })?;

        let log = logs.entry(aggregate_id).or_default();
        let count = events.len();
        for event in events {
            log.insert(event);
        }

        metrics::counter!("event_store_events_appended").increment(count as u64);
        tracing::debug!(%aggregate_id, latest = %log.latest, "events appended");
        Ok(())
    }

    async fn get_events(&self, aggregate_id: AggregateId) -> Result<Vec<Event>> {
        Ok(self.select(aggregate_id, |_| true).await)
    }

    async fn get_events_from(
        &self,
        aggregate_id: AggregateId,
        from: Sequence,
    ) -> Result<Vec<Event>> {
        Ok(self.select(aggregate_id, |e| e.sequence >= from).await)
    }

    async fn get_events_until(
        &self,
        aggregate_id: AggregateId,
        until: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        Ok(self.select(aggregate_id, |e| e.timestamp <= until).await)
    }

    async fn get_term_events(
        &self,
        aggregate_id: AggregateId,
        term_id: &str,
    ) -> Result<Vec<Event>> {
        Ok(self
            .select(aggregate_id, |e| e.term_id() == Some(term_id))
            .await)
    }

    async fn query_events(
        &self,
        aggregate_id: AggregateId,
        query: EventQuery,
    ) -> Result<Vec<Event>> {
        let events = self.select(aggregate_id, |e| query.matches(e)).await;
        Ok(query.paginate(events))
    }

    async fn get_latest_sequence(&self, aggregate_id: AggregateId) -> Result<Sequence> {
        let logs = self.logs.read().await;
        Ok(logs
            .get(&aggregate_id)
            .map_or(Sequence::initial(), |log| log.latest))
    }
}
