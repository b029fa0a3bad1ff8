//! A deal's recording and query surface.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{IdGenerator, RandomIdGenerator};
use event_store::{
    Actor, AggregateId, Event, EventBuilder, EventId, EventPayload, EventStore, EventStoreExt,
    InMemoryEventStore, InMemorySnapshotStore, Sequence, Snapshot, SnapshotStore,
};
use projections::{
    DealStats, ProjectedState, TermHistoryEntry, TermState, overdue_terms, project_all,
    project_from_snapshot, term_history,
};
use timeline::{
    ActivitySummary, Milestone, ReplayOptions, ReplayOutcome, ScenarioMeta, TimeTravelController,
    WhatIfScenario, activity_summary, create_what_if_scenario, find_milestones,
    replay_with_callback,
};
use tokio::sync::watch;

use crate::config::EngineConfig;
use crate::error::Result;

/// Records events for one deal and answers questions about its history.
///
/// Sequences are assigned here as `latest + 1`, so a session assumes it is
/// the only writer for its deal.
pub struct DealSession<E, S> {
    aggregate_id: AggregateId,
    events: Arc<E>,
    snapshots: Arc<S>,
    ids: Arc<dyn IdGenerator>,
    config: EngineConfig,
}

/// A session over the in-process stores.
pub type InMemoryDealSession =
    DealSession<InMemoryEventStore, InMemorySnapshotStore<ProjectedState>>;

impl InMemoryDealSession {
    /// Creates a session with fresh in-memory stores and random ids.
    pub fn in_memory(aggregate_id: AggregateId, config: EngineConfig) -> Self {
        Self::new(
            aggregate_id,
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemorySnapshotStore::new()),
            Arc::new(RandomIdGenerator),
            config,
        )
    }
}

impl<E, S> Clone for DealSession<E, S> {
    fn clone(&self) -> Self {
        Self {
            aggregate_id: self.aggregate_id,
            events: Arc::clone(&self.events),
            snapshots: Arc::clone(&self.snapshots),
            ids: Arc::clone(&self.ids),
            config: self.config.clone(),
        }
    }
}

impl<E, S> DealSession<E, S>
where
    E: EventStore,
    S: SnapshotStore<ProjectedState> + 'static,
{
    pub fn new(
        aggregate_id: AggregateId,
        events: Arc<E>,
        snapshots: Arc<S>,
        ids: Arc<dyn IdGenerator>,
        config: EngineConfig,
    ) -> Self {
        Self {
            aggregate_id,
            events,
            snapshots,
            ids,
            config,
        }
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns a reference to the underlying event store.
    pub fn event_store(&self) -> &E {
        &self.events
    }

    pub async fn latest_sequence(&self) -> Result<Sequence> {
        Ok(self.events.get_latest_sequence(self.aggregate_id).await?)
    }

    /// Records one event stamped with the current time.
    pub async fn record(&self, actor: Actor, payload: EventPayload) -> Result<Event> {
        self.record_at(actor, payload, Utc::now()).await
    }

    /// Records one event with an explicit timestamp.
    #[tracing::instrument(
        skip(self, actor, payload),
        fields(aggregate_id = %self.aggregate_id, event_type = payload.type_name())
    )]
    pub async fn record_at(
        &self,
        actor: Actor,
        payload: EventPayload,
        timestamp: DateTime<Utc>,
    ) -> Result<Event> {
        let before = self.latest_sequence().await?;
        let correlation_id = self.ids.next_id().to_string();
        let event = self
            .stamp(before.next(), payload, &actor, timestamp, &correlation_id)
            .build();

        self.commit(before, vec![event.clone()], timestamp).await?;
        Ok(event)
    }

    /// Records several events as one atomic batch.
    ///
    /// The events get consecutive sequences, the same timestamp and a shared
    /// correlation id. An empty batch records nothing.
    #[tracing::instrument(
        skip(self, actor, payloads),
        fields(aggregate_id = %self.aggregate_id, count = payloads.len())
    )]
    pub async fn record_batch(
        &self,
        actor: Actor,
        payloads: Vec<EventPayload>,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        if payloads.is_empty() {
            return Ok(Vec::new());
        }

        let before = self.latest_sequence().await?;
        let correlation_id = self.ids.next_id().to_string();
        let mut sequence = before;
        let events: Vec<Event> = payloads
            .into_iter()
            .map(|payload| {
                sequence = sequence.next();
                self.stamp(sequence, payload, &actor, timestamp, &correlation_id)
                    .build()
            })
            .collect();

        self.commit(before, events.clone(), timestamp).await?;
        Ok(events)
    }

    /// Appends events that were built elsewhere, such as a history loaded
    /// from an export.
    #[tracing::instrument(
        skip(self, events),
        fields(aggregate_id = %self.aggregate_id, count = events.len())
    )]
    pub async fn import(&self, events: Vec<Event>) -> Result<()> {
        let Some(timestamp) = events.iter().map(|e| e.timestamp).max() else {
            return Ok(());
        };
        let before = self.latest_sequence().await?;
        self.commit(before, events, timestamp).await
    }

    /// The deal as of its latest event, resumed from the newest snapshot.
    pub async fn current_state(&self) -> Result<ProjectedState> {
        self.load_state(None).await
    }

    /// The deal as of `sequence`, resumed from the newest snapshot at or
    /// before it.
    pub async fn state_at(&self, sequence: impl Into<Sequence>) -> Result<ProjectedState> {
        self.load_state(Some(sequence.into())).await
    }

    /// The full log, oldest first.
    pub async fn events(&self) -> Result<Vec<Event>> {
        Ok(self.events.get_events(self.aggregate_id).await?)
    }

    /// A cursor over the log as it stands now. Later recordings are not
    /// visible to it.
    pub async fn time_travel(&self) -> Result<TimeTravelController> {
        let events = self.events().await?;
        Ok(TimeTravelController::new(self.aggregate_id, &events))
    }

    /// Projects `payloads` as if they had been recorded right after
    /// `base_sequence`.
    ///
    /// The hypothetical events are numbered `base_sequence + 1` onwards,
    /// stamped with the scenario's creation time and never appended.
    #[tracing::instrument(
        skip(self, actor, payloads, meta),
        fields(aggregate_id = %self.aggregate_id, scenario = %meta.name)
    )]
    pub async fn what_if(
        &self,
        base_sequence: Sequence,
        actor: Actor,
        payloads: Vec<EventPayload>,
        meta: ScenarioMeta,
    ) -> Result<WhatIfScenario> {
        let base_state = self.state_at(base_sequence).await?;
        let correlation_id = self.ids.next_id().to_string();
        let mut sequence = base_sequence;
        let hypothetical: Vec<Event> = payloads
            .into_iter()
            .map(|payload| {
                sequence = sequence.next();
                self.stamp(sequence, payload, &actor, meta.created_at, &correlation_id)
                    .metadata("hypothetical", serde_json::Value::Bool(true))
                    .build()
            })
            .collect();

        Ok(create_what_if_scenario(
            &base_state,
            base_sequence,
            &hypothetical,
            meta,
            self.ids.as_ref(),
        ))
    }

    /// Replays the log from the start, pausing for the configured step delay
    /// between events.
    pub async fn replay<F>(
        &self,
        on_step: F,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<ReplayOutcome>
    where
        F: FnMut(&ProjectedState, &Event, usize),
    {
        let events = self.events().await?;
        let mut options = ReplayOptions::new().step_delay(self.config.replay_step_delay());
        if let Some(cancel) = cancel {
            options = options.cancel_on(cancel);
        }
        Ok(replay_with_callback(self.aggregate_id, &events, on_step, options).await)
    }

    /// The evolution of one term.
    pub async fn term_history(&self, term_id: &str) -> Result<Vec<TermHistoryEntry>> {
        let events = self
            .events
            .get_term_events(self.aggregate_id, term_id)
            .await?;
        Ok(term_history(term_id, &events))
    }

    pub async fn activity_summary(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<ActivitySummary> {
        Ok(activity_summary(&self.events().await?, start, end))
    }

    pub async fn milestones(&self) -> Result<Vec<Milestone>> {
        Ok(find_milestones(&self.events().await?))
    }

    pub async fn stats(&self) -> Result<DealStats> {
        Ok(DealStats::from_state(&self.current_state().await?))
    }

    /// Unsettled terms whose deadline is before `now`.
    pub async fn overdue_terms(&self, now: DateTime<Utc>) -> Result<Vec<TermState>> {
        let state = self.current_state().await?;
        Ok(overdue_terms(&state, now).into_iter().cloned().collect())
    }

    fn stamp(
        &self,
        sequence: Sequence,
        payload: EventPayload,
        actor: &Actor,
        timestamp: DateTime<Utc>,
        correlation_id: &str,
    ) -> EventBuilder {
        let id = EventId::generate(self.ids.as_ref());
        Event::builder(id, self.aggregate_id, sequence, payload)
            .timestamp(timestamp)
            .actor(actor.clone())
            .correlation_id(correlation_id)
    }

    async fn commit(
        &self,
        before: Sequence,
        events: Vec<Event>,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let count = events.len();
        let Some(lowest) = events.iter().map(|e| e.sequence).min() else {
            return Ok(());
        };
        let after = events
            .iter()
            .map(|e| e.sequence)
            .max()
            .unwrap_or(before)
            .max(before);

        // Snapshots at or after a backfilled sequence no longer match the log.
        let mut invalidated = 0;
        if lowest <= before {
            invalidated = self
                .snapshots
                .discard_from(self.aggregate_id, lowest)
                .await?;
            if invalidated > 0 {
                tracing::info!(
                    aggregate_id = %self.aggregate_id,
                    %lowest,
                    invalidated,
                    "snapshots invalidated by backfill"
                );
            }
        }

        self.events.append(events).await?;
        metrics::counter!("engine_events_recorded").increment(count as u64);

        if invalidated > 0 || self.config.snapshot_policy().should_snapshot(before, after) {
            self.try_snapshot(after, timestamp).await;
        }
        Ok(())
    }

    /// Saves a snapshot at `sequence`. The events are already durable at
    /// this point, so a failure is logged and counted, never returned.
    async fn try_snapshot(&self, sequence: Sequence, timestamp: DateTime<Utc>) {
        if let Err(error) = self.save_snapshot(sequence, timestamp).await {
            metrics::counter!("engine_snapshot_failures").increment(1);
            tracing::warn!(
                aggregate_id = %self.aggregate_id,
                %sequence,
                %error,
                "snapshot not saved, reads fall back to the event log"
            );
        }
    }

    async fn save_snapshot(&self, sequence: Sequence, timestamp: DateTime<Utc>) -> Result<()> {
        let state = self.state_at(sequence).await?;
        let mut snapshot = Snapshot::new(self.aggregate_id, sequence, state);
        snapshot.timestamp = timestamp;
        self.snapshots.save(snapshot).await?;

        metrics::counter!("engine_snapshots_saved").increment(1);
        tracing::info!(aggregate_id = %self.aggregate_id, %sequence, "snapshot saved");
        Ok(())
    }

    async fn load_state(&self, at: Option<Sequence>) -> Result<ProjectedState> {
        let snapshots: &dyn SnapshotStore<ProjectedState> = self.snapshots.as_ref();
        let (snapshot, events) = self
            .events
            .load_after_snapshot(snapshots, self.aggregate_id, at)
            .await?;
        Ok(match snapshot {
            Some(snapshot) => project_from_snapshot(&snapshot, &events),
            None => project_all(self.aggregate_id, &events),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::SequentialIdGenerator;
    use event_store::DealRole;
    use projections::testing::*;
    use serde_json::json;

    type Session = DealSession<InMemoryEventStore, InMemorySnapshotStore<ProjectedState>>;

    fn session(interval: u64) -> (Session, Arc<InMemorySnapshotStore<ProjectedState>>) {
        let snapshots = Arc::new(InMemorySnapshotStore::new());
        let session = DealSession::new(
            deal_id(),
            Arc::new(InMemoryEventStore::new()),
            Arc::clone(&snapshots),
            Arc::new(SequentialIdGenerator::new()),
            EngineConfig::default().with_snapshot_interval(interval),
        );
        (session, snapshots)
    }

    fn payloads(id: AggregateId) -> Vec<EventPayload> {
        vec![
            deal_created(id, 1).payload,
            term_created(id, 2, "rate", json!(5.0)).payload,
            term_created(id, 3, "tenor", json!(36)).payload,
        ]
    }

    #[tokio::test]
    async fn batch_gets_consecutive_sequences_and_one_correlation() {
        let (session, _) = session(0);
        let events = session
            .record_batch(lead(), payloads(session.aggregate_id()), at(1))
            .await
            .unwrap();

        let sequences: Vec<u64> = events.iter().map(|e| e.sequence.as_u64()).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert!(events.iter().all(|e| e.correlation_id == events[0].correlation_id));
        assert!(events.iter().all(|e| e.timestamp == at(1) && e.actor.id == "lead"));
        assert_eq!(session.latest_sequence().await.unwrap(), Sequence::new(3));
    }

    #[tokio::test]
    async fn record_appends_after_the_latest() {
        let (session, _) = session(0);
        let id = session.aggregate_id();
        session
            .record_batch(lead(), payloads(id), at(1))
            .await
            .unwrap();

        let event = session
            .record_at(
                borrower(),
                proposal_made(id, 0, "rate", "p-1", json!(4.5)).payload,
                at(2),
            )
            .await
            .unwrap();
        assert_eq!(event.sequence, Sequence::new(4));

        let state = session.current_state().await.unwrap();
        assert_eq!(state.term("rate").unwrap().pending_proposals_count, 1);
        assert_eq!(state.proposal("p-1").unwrap().proposed_by, "alice");
    }

    #[tokio::test]
    async fn empty_batch_records_nothing() {
        let (session, snapshots) = session(1);
        let events = session.record_batch(lead(), Vec::new(), at(1)).await.unwrap();
        assert!(events.is_empty());
        assert_eq!(session.latest_sequence().await.unwrap(), Sequence::initial());
        assert_eq!(snapshots.snapshot_count(session.aggregate_id()).await, 0);
    }

    #[tokio::test]
    async fn snapshots_follow_the_interval() {
        let (session, snapshots) = session(2);
        let id = session.aggregate_id();

        session
            .record_batch(lead(), payloads(id), at(1))
            .await
            .unwrap();
        assert_eq!(snapshots.snapshot_count(id).await, 1);

        session
            .record_at(
                lead(),
                participant_joined(id, 0, "u-1", DealRole::Observer).payload,
                at(2),
            )
            .await
            .unwrap();
        assert_eq!(snapshots.snapshot_count(id).await, 2);

        let latest = snapshots.get_latest(id).await.unwrap().unwrap();
        assert_eq!(latest.sequence, Sequence::new(4));
        assert_eq!(latest.timestamp, at(2));
        assert_eq!(latest.state, session.current_state().await.unwrap());
    }

    #[tokio::test]
    async fn state_at_ignores_later_snapshots() {
        let (session, _) = session(1);
        let id = session.aggregate_id();
        session
            .record_batch(lead(), payloads(id), at(1))
            .await
            .unwrap();

        let early = session.state_at(2).await.unwrap();
        assert!(early.term("rate").is_some());
        assert!(early.term("tenor").is_none());
        assert_eq!(early.last_sequence, Sequence::new(2));
    }
}
