//! Paced, cancellable replay for animating a deal's history.
//!
//! Unpaced, uncancellable replays are [`projections::replay_prefixes`]
//! as is. Otherwise the same fold runs over [`projections::replay_order`]
//! with a pause between steps and a cancellation check.

use std::time::Duration;

use event_store::{AggregateId, Event, Sequence};
use projections::{ProjectedState, replay_order, replay_prefixes};
use tokio::sync::watch;

/// How a replay is paced and bounded.
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Stop after the last event with `sequence <= until_sequence`.
    pub until_sequence: Option<Sequence>,
    /// Pause between consecutive steps.
    pub step_delay: Option<Duration>,
    /// Replay stops once this channel reads `true`.
    pub cancel: Option<watch::Receiver<bool>>,
}

impl ReplayOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn until_sequence(mut self, until: impl Into<Sequence>) -> Self {
        self.until_sequence = Some(until.into());
        self
    }

    /// Sets the pause between steps. A zero duration means no pause.
    pub fn step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = (!delay.is_zero()).then_some(delay);
        self
    }

    pub fn cancel_on(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// How a replay ended.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    /// Number of events applied (and callbacks made).
    pub steps: usize,
    pub cancelled: bool,
    /// State after the last applied event.
    pub final_state: ProjectedState,
}

/// Replays `events` in sequence order, calling `on_step` with the state
/// after each event, the event and its index.
///
/// Cancellation is checked before every step and during every pause; the
/// step in progress when the signal arrives is not applied.
pub async fn replay_with_callback<F>(
    aggregate_id: AggregateId,
    events: &[Event],
    mut on_step: F,
    options: ReplayOptions,
) -> ReplayOutcome
where
    F: FnMut(&ProjectedState, &Event, usize),
{
    let ReplayOptions {
        until_sequence,
        step_delay,
        mut cancel,
    } = options;

    if step_delay.is_none() && cancel.is_none() {
        let mut steps = 0;
        let final_state =
            replay_prefixes(aggregate_id, events, until_sequence, |state, event, index| {
                on_step(state, event, index);
                steps += 1;
            });
        return ReplayOutcome {
            steps,
            cancelled: false,
            final_state,
        };
    }

    let mut state = ProjectedState::empty(aggregate_id);
    let mut steps = 0;
    let mut cancelled = false;

    for (index, event) in replay_order(events, until_sequence).enumerate() {
        if is_cancelled(cancel.as_ref()) {
            cancelled = true;
            break;
        }

        if index > 0
            && let Some(delay) = step_delay
        {
            match cancel.as_mut() {
                Some(rx) => {
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancellation(rx) => {
                            cancelled = true;
                            break;
                        }
                    }
                }
                None => tokio::time::sleep(delay).await,
            }
        }

        state.apply(event);
        on_step(&state, event, index);
        steps += 1;
    }

    if cancelled {
        tracing::debug!(%aggregate_id, steps, "replay cancelled");
    }

    ReplayOutcome {
        steps,
        cancelled,
        final_state: state,
    }
}

fn is_cancelled(cancel: Option<&watch::Receiver<bool>>) -> bool {
    cancel.is_some_and(|rx| *rx.borrow())
}

/// Resolves once the flag reads `true`. Never resolves if the sender is gone.
async fn cancellation(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}
