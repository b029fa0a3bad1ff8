//! Cursor-based navigation over a deal's history.

use chrono::{DateTime, Utc};
use event_store::{AggregateId, Event, Sequence};
use projections::{ProjectedState, sorted_by_sequence};
use serde::Serialize;

/// What the controller shows at its current position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeTravelState {
    /// Timestamp of the last event at or before the cursor.
    pub current_timestamp: Option<DateTime<Utc>>,
    pub current_sequence: Sequence,
    pub projected_state: ProjectedState,
    pub is_at_latest: bool,
    pub total_events: usize,
}

/// A cursor over a fixed, sequence-sorted event list.
///
/// The list is captured at construction; events appended to the store
/// afterwards are not seen. Moving forward folds only the new events onto
/// the cached state, moving backward refolds from empty.
#[derive(Debug, Clone)]
pub struct TimeTravelController {
    aggregate_id: AggregateId,
    events: Vec<Event>,
    current: Sequence,
    cached: ProjectedState,
    cached_through: Sequence,
}

impl TimeTravelController {
    /// Creates a controller positioned at the latest event.
    pub fn new(aggregate_id: AggregateId, events: &[Event]) -> Self {
        let events: Vec<Event> = sorted_by_sequence(events).into_iter().cloned().collect();
        let current = events.last().map_or(Sequence::initial(), |e| e.sequence);
        Self {
            aggregate_id,
            events,
            current,
            cached: ProjectedState::empty(aggregate_id),
            cached_through: Sequence::initial(),
        }
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn current_sequence(&self) -> Sequence {
        self.current
    }

    /// Sequence of the last captured event, or `0` with no events.
    pub fn max_sequence(&self) -> Sequence {
        self.events.last().map_or(Sequence::initial(), |e| e.sequence)
    }

    fn min_sequence(&self) -> Sequence {
        self.events.first().map_or(Sequence::initial(), |e| e.sequence)
    }

    pub fn is_at_latest(&self) -> bool {
        self.current == self.max_sequence()
    }

    /// Projects the history up to the cursor.
    pub fn state(&mut self) -> TimeTravelState {
        if self.current < self.cached_through {
            self.cached = ProjectedState::empty(self.aggregate_id);
            self.cached_through = Sequence::initial();
        }

        let from = self
            .events
            .partition_point(|e| e.sequence <= self.cached_through);
        let to = self.events.partition_point(|e| e.sequence <= self.current);
        for event in &self.events[from..to.max(from)] {
            self.cached.apply(event);
        }
        self.cached_through = self.current;

        TimeTravelState {
            current_timestamp: self.events[..to].last().map(|e| e.timestamp),
            current_sequence: self.current,
            projected_state: self.cached.clone(),
            is_at_latest: self.is_at_latest(),
            total_events: self.events.len(),
        }
    }

    /// Moves to `sequence`, clamped to `[0, max_sequence]`.
    pub fn go_to_sequence(&mut self, sequence: impl Into<Sequence>) {
        self.current = sequence.into().min(self.max_sequence());
    }

    /// Moves to the greatest sequence whose event happened at or before `at`.
    ///
    /// Navigates by wall-clock time: if clocks and sequences disagree, the
    /// timestamps win. With no such event the cursor goes to `0`.
    pub fn go_to_timestamp(&mut self, at: DateTime<Utc>) {
        self.current = self
            .events
            .iter()
            .filter(|e| e.timestamp <= at)
            .map(|e| e.sequence)
            .max()
            .unwrap_or_default();
    }

    /// Moves to the next event after the cursor. Returns false at the end.
    pub fn step_forward(&mut self) -> bool {
        let next = self.events.partition_point(|e| e.sequence <= self.current);
        match self.events.get(next) {
            Some(event) => {
                self.current = event.sequence;
                true
            }
            None => false,
        }
    }

    /// Moves to the previous event before the cursor. Returns false at the start.
    pub fn step_backward(&mut self) -> bool {
        let before = self.events.partition_point(|e| e.sequence < self.current);
        match before.checked_sub(1).and_then(|i| self.events.get(i)) {
            Some(event) => {
                self.current = event.sequence;
                true
            }
            None => false,
        }
    }

    pub fn go_to_latest(&mut self) {
        self.current = self.max_sequence();
    }

    /// Moves to the first event's sequence, or `0` with no events.
    pub fn go_to_start(&mut self) {
        self.current = self.min_sequence();
    }

    /// Returns the captured events with `start <= timestamp <= end`.
    pub fn events_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .collect()
    }

    /// Position of the cursor between the first and last event, in percent.
    pub fn position_percent(&self) -> f64 {
        let (first, last) = (self.min_sequence().as_u64(), self.max_sequence().as_u64());
        if self.events.is_empty() {
            return 0.0;
        }
        if first == last {
            return 100.0;
        }
        let offset = self.current.as_u64().saturating_sub(first) as f64;
        (offset * 100.0 / (last - first) as f64).clamp(0.0, 100.0)
    }

    /// Moves to the existing sequence closest to `percent` of the way from
    /// the first to the last event. Ties go to the lower sequence.
    pub fn go_to_percent(&mut self, percent: f64) {
        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        let (first, last) = (self.min_sequence().as_u64(), self.max_sequence().as_u64());
        let target = first as f64 + (last - first) as f64 * percent / 100.0;

        let mut closest: Option<(Sequence, f64)> = None;
        for event in &self.events {
            let distance = (event.sequence.as_u64() as f64 - target).abs();
            if closest.is_none_or(|(_, best)| distance < best) {
                closest = Some((event.sequence, distance));
            }
        }
        self.current = closest.map_or(Sequence::initial(), |(sequence, _)| sequence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use projections::project_all;
    use projections::testing::*;
    use serde_json::json;

    fn gapped(id: AggregateId) -> Vec<Event> {
        vec![
            deal_created(id, 1),
            term_created(id, 2, "rate", json!(5)),
            proposal_made(id, 10, "rate", "p-1", json!(4)),
        ]
    }

    #[test]
    fn starts_at_latest() {
        let id = deal_id();
        let events = rate_negotiation(id);
        let mut controller = TimeTravelController::new(id, &events);

        let state = controller.state();
        assert!(state.is_at_latest);
        assert_eq!(state.current_sequence, Sequence::new(8));
        assert_eq!(state.total_events, 8);
        assert_eq!(state.current_timestamp, Some(at(8)));
        assert_eq!(state.projected_state, project_all(id, &events));
    }

    #[test]
    fn empty_history() {
        let id = deal_id();
        let mut controller = TimeTravelController::new(id, &[]);

        assert_eq!(controller.max_sequence(), Sequence::initial());
        assert!(!controller.step_forward());
        assert!(!controller.step_backward());
        controller.go_to_percent(50.0);
        assert_eq!(controller.position_percent(), 0.0);

        let state = controller.state();
        assert_eq!(state.projected_state, ProjectedState::empty(id));
        assert_eq!(state.current_timestamp, None);
        assert!(state.is_at_latest);
    }

    #[test]
    fn go_to_sequence_clamps() {
        let id = deal_id();
        let mut controller = TimeTravelController::new(id, &rate_negotiation(id));

        controller.go_to_sequence(99);
        assert_eq!(controller.current_sequence(), Sequence::new(8));
        controller.go_to_sequence(0);
        assert_eq!(controller.current_sequence(), Sequence::initial());
        assert_eq!(controller.state().projected_state, ProjectedState::empty(id));
    }

    #[test]
    fn stepping_moves_between_existing_sequences() {
        let id = deal_id();
        let mut controller = TimeTravelController::new(id, &gapped(id));

        assert!(controller.step_backward());
        assert_eq!(controller.current_sequence(), Sequence::new(2));
        assert!(controller.step_backward());
        assert_eq!(controller.current_sequence(), Sequence::new(1));
        assert!(!controller.step_backward());
        assert_eq!(controller.current_sequence(), Sequence::new(1));

        controller.go_to_sequence(5);
        assert!(controller.step_forward());
        assert_eq!(controller.current_sequence(), Sequence::new(10));
        assert!(!controller.step_forward());
    }

    #[test]
    fn go_to_timestamp_trusts_clocks() {
        let id = deal_id();
        // Sequence 3 was stamped before sequence 2.
        let mut early = term_created(id, 3, "tenor", json!(36));
        early.timestamp = at(1);
        let events = vec![
            deal_created(id, 1),
            term_created(id, 2, "rate", json!(5)),
            early,
        ];
        let mut controller = TimeTravelController::new(id, &events);

        controller.go_to_timestamp(at(1));
        assert_eq!(controller.current_sequence(), Sequence::new(3));

        controller.go_to_timestamp(at(0));
        assert_eq!(controller.current_sequence(), Sequence::initial());
    }

    #[test]
    fn go_to_start_and_latest() {
        let id = deal_id();
        let mut controller = TimeTravelController::new(id, &gapped(id));

        controller.go_to_start();
        assert_eq!(controller.current_sequence(), Sequence::new(1));
        assert_eq!(controller.position_percent(), 0.0);

        controller.go_to_latest();
        assert_eq!(controller.current_sequence(), Sequence::new(10));
        assert_eq!(controller.position_percent(), 100.0);
    }

    #[test]
    fn go_to_percent_snaps_to_existing_sequences() {
        let id = deal_id();
        let mut controller = TimeTravelController::new(id, &gapped(id));

        controller.go_to_percent(50.0);
        assert_eq!(controller.current_sequence(), Sequence::new(2));
        controller.go_to_percent(90.0);
        assert_eq!(controller.current_sequence(), Sequence::new(10));
        controller.go_to_percent(-20.0);
        assert_eq!(controller.current_sequence(), Sequence::new(1));
        controller.go_to_percent(250.0);
        assert_eq!(controller.current_sequence(), Sequence::new(10));
    }

    #[test]
    fn go_to_percent_on_dense_log() {
        let id = deal_id();
        let events: Vec<Event> = (1..=5).map(|s| comment_added(id, s, None)).collect();
        let mut controller = TimeTravelController::new(id, &events);

        controller.go_to_percent(50.0);
        assert_eq!(controller.current_sequence(), Sequence::new(3));
        assert_eq!(controller.position_percent(), 50.0);
    }

    #[test]
    fn single_event_is_always_at_hundred_percent() {
        let id = deal_id();
        let controller = TimeTravelController::new(id, &[deal_created(id, 4)]);
        assert_eq!(controller.position_percent(), 100.0);
    }

    #[test]
    fn cached_state_matches_fresh_projection_in_any_direction() {
        let id = deal_id();
        let events = rate_negotiation(id);
        let mut controller = TimeTravelController::new(id, &events);

        for target in [3u64, 6, 2, 8, 0, 5, 5, 7] {
            controller.go_to_sequence(target);
            let expected = projections::project(
                id,
                &events,
                &projections::ProjectionOptions::new().until_sequence(target),
            );
            assert_eq!(controller.state().projected_state, expected, "at {target}");
        }
    }

    #[test]
    fn events_in_range_is_inclusive() {
        let id = deal_id();
        let controller = TimeTravelController::new(id, &rate_negotiation(id));

        let sequences: Vec<u64> = controller
            .events_in_range(at(3), at(5))
            .iter()
            .map(|e| e.sequence.as_u64())
            .collect();
        assert_eq!(sequences, vec![3, 4, 5]);
    }

    #[test]
    fn latest_round_trip_is_stable() {
        let id = deal_id();
        let mut controller = TimeTravelController::new(id, &rate_negotiation(id));

        controller.go_to_latest();
        let first = controller.state();
        controller.go_to_start();
        let _ = controller.state();
        controller.go_to_latest();
        let second = controller.state();

        assert_eq!(first.projected_state, second.projected_state);
    }
}
