use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{AggregateId, Result, Sequence};

/// A materialized state of an aggregate as of a specific sequence.
///
/// Snapshots bound replay cost: projection can resume from `state` and only
/// fold events whose sequence is strictly greater than `sequence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<S> {
    /// The aggregate this snapshot belongs to.
    pub aggregate_id: AggregateId,

    /// Sequence of the last event folded into `state`.
    pub sequence: Sequence,

    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// The materialized state.
    pub state: S,
}

impl<S> Snapshot<S> {
    /// Creates a snapshot stamped with the current time.
    pub fn new(aggregate_id: AggregateId, sequence: Sequence, state: S) -> Self {
        Self {
            aggregate_id,
            sequence,
            timestamp: Utc::now(),
            state,
        }
    }
}

/// Storage for snapshots, keyed by aggregate id and sequence.
#[async_trait]
pub trait SnapshotStore<S>: Send + Sync
where
    S: Clone + Send + Sync + 'static,
{
    /// Saves a snapshot. A snapshot at the same sequence is replaced.
    async fn save(&self, snapshot: Snapshot<S>) -> Result<()>;

    /// Returns the snapshot with the highest sequence.
    async fn get_latest(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot<S>>>;

    /// Returns the latest snapshot with `sequence <= at`.
    async fn get_at_sequence(
        &self,
        aggregate_id: AggregateId,
        at: Sequence,
    ) -> Result<Option<Snapshot<S>>>;

    /// Drops every snapshot with `sequence >= from`, returning how many were
    /// dropped. Used when an event lands behind a snapshot that already
    /// folded past it.
    async fn discard_from(&self, aggregate_id: AggregateId, from: Sequence) -> Result<usize>;
}

/// In-memory snapshot store keeping every snapshot ordered by sequence.
#[derive(Clone)]
pub struct InMemorySnapshotStore<S> {
    snapshots: Arc<RwLock<HashMap<AggregateId, Vec<Snapshot<S>>>>>,
}

impl<S> Default for InMemorySnapshotStore<S> {
    fn default() -> Self {
        Self {
            snapshots: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<S> InMemorySnapshotStore<S> {
    /// Creates a new empty snapshot store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of snapshots held for an aggregate.
    pub async fn snapshot_count(&self, aggregate_id: AggregateId) -> usize {
        self.snapshots
            .read()
            .await
            .get(&aggregate_id)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl<S> SnapshotStore<S> for InMemorySnapshotStore<S>
where
    S: Clone + Send + Sync + 'static,
{
    async fn save(&self, snapshot: Snapshot<S>) -> Result<()> {
        let mut snapshots = self.snapshots.write().await;
        let list = snapshots.entry(snapshot.aggregate_id).or_default();
        match list.binary_search_by_key(&snapshot.sequence, |s| s.sequence) {
            Ok(index) => list[index] = snapshot,
            Err(index) => list.insert(index, snapshot),
        }
        Ok(())
    }

    async fn get_latest(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot<S>>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .get(&aggregate_id)
            .and_then(|list| list.last())
            .cloned())
    }

    async fn get_at_sequence(
        &self,
        aggregate_id: AggregateId,
        at: Sequence,
    ) -> Result<Option<Snapshot<S>>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(&aggregate_id).and_then(|list| {
            let end = list.partition_point(|s| s.sequence <= at);
            end.checked_sub(1).map(|index| list[index].clone())
        }))
    }

    async fn discard_from(&self, aggregate_id: AggregateId, from: Sequence) -> Result<usize> {
        let mut snapshots = self.snapshots.write().await;
        let Some(list) = snapshots.get_mut(&aggregate_id) else {
            return Ok(0);
        };
        let keep = list.partition_point(|s| s.sequence < from);
        let dropped = list.len() - keep;
        list.truncate(keep);
        Ok(dropped)
    }
}

/// Decides when the owning application takes a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotPolicy {
    /// Number of sequences between snapshots. `0` disables snapshotting.
    pub interval: u64,
}

impl SnapshotPolicy {
    pub fn every(interval: u64) -> Self {
        Self { interval }
    }

    pub fn disabled() -> Self {
        Self { interval: 0 }
    }

    /// Returns true if a batch that moved the log from `before` to `after`
    /// crossed a snapshot boundary.
    pub fn should_snapshot(&self, before: Sequence, after: Sequence) -> bool {
        if self.interval == 0 || after <= before {
            return false;
        }
        before.as_u64() / self.interval != after.as_u64() / self.interval
    }
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self::every(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(id: AggregateId, sequence: u64) -> Snapshot<String> {
        Snapshot::new(id, Sequence::new(sequence), format!("state@{sequence}"))
    }

    #[tokio::test]
    async fn snapshot_save_and_retrieve_latest() {
        let store = InMemorySnapshotStore::new();
        let id = AggregateId::new();

        store.save(snapshot(id, 10)).await.unwrap();
        store.save(snapshot(id, 5)).await.unwrap();

        let latest = store.get_latest(id).await.unwrap().unwrap();
        assert_eq!(latest.sequence, Sequence::new(10));
        assert_eq!(latest.state, "state@10");
    }

    #[tokio::test]
    async fn snapshot_not_found() {
        let store: InMemorySnapshotStore<String> = InMemorySnapshotStore::new();
        let id = AggregateId::new();

        assert!(store.get_latest(id).await.unwrap().is_none());
        assert!(
            store
                .get_at_sequence(id, Sequence::new(3))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn get_at_sequence_picks_latest_not_after() {
        let store = InMemorySnapshotStore::new();
        let id = AggregateId::new();
        for sequence in [5, 10, 15] {
            store.save(snapshot(id, sequence)).await.unwrap();
        }

        let at = |s| store.get_at_sequence(id, Sequence::new(s));
        assert!(at(4).await.unwrap().is_none());
        assert_eq!(at(5).await.unwrap().unwrap().sequence, Sequence::new(5));
        assert_eq!(at(14).await.unwrap().unwrap().sequence, Sequence::new(10));
        assert_eq!(at(99).await.unwrap().unwrap().sequence, Sequence::new(15));
    }

    #[tokio::test]
    async fn saving_same_sequence_replaces() {
        let store = InMemorySnapshotStore::new();
        let id = AggregateId::new();
        store.save(snapshot(id, 5)).await.unwrap();
        store
            .save(Snapshot::new(id, Sequence::new(5), "replaced".to_string()))
            .await
            .unwrap();

        assert_eq!(store.snapshot_count(id).await, 1);
        assert_eq!(store.get_latest(id).await.unwrap().unwrap().state, "replaced");
    }

    #[tokio::test]
    async fn discard_from_drops_at_and_after() {
        let store = InMemorySnapshotStore::new();
        let id = AggregateId::new();
        for sequence in [5, 10, 15] {
            store.save(snapshot(id, sequence)).await.unwrap();
        }

        assert_eq!(store.discard_from(id, Sequence::new(10)).await.unwrap(), 2);
        assert_eq!(store.snapshot_count(id).await, 1);
        assert_eq!(store.get_latest(id).await.unwrap().unwrap().sequence, Sequence::new(5));
        assert_eq!(store.discard_from(AggregateId::new(), Sequence::first()).await.unwrap(), 0);
    }

    #[test]
    fn policy_triggers_when_crossing_interval() {
        let policy = SnapshotPolicy::every(10);
        assert!(!policy.should_snapshot(Sequence::new(0), Sequence::new(9)));
        assert!(policy.should_snapshot(Sequence::new(9), Sequence::new(10)));
        assert!(policy.should_snapshot(Sequence::new(8), Sequence::new(13)));
        assert!(!policy.should_snapshot(Sequence::new(10), Sequence::new(19)));
        assert!(!SnapshotPolicy::disabled().should_snapshot(Sequence::new(0), Sequence::new(100)));
    }
}
