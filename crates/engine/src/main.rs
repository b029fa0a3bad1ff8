//! Replays an exported deal history and prints its summary.
//!
//! Usage: `deal-replay <events.json>` where the file holds a JSON array of
//! events for a single deal.

use std::error::Error;

use engine::{EngineConfig, InMemoryDealSession, init_tracing};
use event_store::Event;
use serde_json::json;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = EngineConfig::from_env();
    init_tracing(&config);

    let path = std::env::args()
        .nth(1)
        .ok_or("usage: deal-replay <events.json>")?;
    let events: Vec<Event> = serde_json::from_str(&tokio::fs::read_to_string(&path).await?)?;
    let Some(aggregate_id) = events.first().map(|e| e.aggregate_id) else {
        tracing::warn!(%path, "no events to replay");
        return Ok(());
    };

    let session = InMemoryDealSession::in_memory(aggregate_id, config);
    session.import(events).await?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received SIGINT, stopping replay");
            let _ = cancel_tx.send(true);
        }
    });

    let outcome = session
        .replay(
            |state, event, index| {
                tracing::info!(
                    index,
                    sequence = %event.sequence,
                    event_type = event.type_name(),
                    actor = %event.actor.name,
                    terms = state.terms.len(),
                    "replayed"
                );
            },
            Some(cancel_rx),
        )
        .await?;

    let report = json!({
        "aggregate_id": aggregate_id,
        "steps": outcome.steps,
        "cancelled": outcome.cancelled,
        "stats": session.stats().await?,
        "milestones": session.milestones().await?,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
