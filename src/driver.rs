//! Progress Driver — advances a random order on every tick.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::TrackError;
use crate::stages::StageTable;
use crate::transitions::TransitionSender;

/// Spawn the driver task: every `period`, pick one order uniformly at
/// random, advance it, and enqueue a transition signal.
///
/// The pick does not check whether the order is already terminal; a wasted
/// tick on a completed order is absorbed by the stage table as a no-op.
/// Enqueueing is best-effort: on a full queue the signal is dropped and
/// logged, never retried, and the timer is never blocked. The task exits
/// only when the consumer side of the queue is gone.
pub fn spawn_driver(
    stages: Arc<StageTable>,
    transitions: TransitionSender,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately; consume it so the first
        // advance fires after a full period has elapsed.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let order_id = rand::thread_rng().gen_range(0..stages.order_count());
            let Some(stage_index) = stages.advance(order_id) else {
                continue;
            };
            debug!(order_id, stage = stages.name(stage_index), "order advanced");
            match transitions.signal(order_id) {
                Ok(()) => {}
                Err(TrackError::QueueFull { .. }) => {
                    warn!(order_id, "transition queue full; signal dropped");
                }
                Err(_) => {
                    // Dispatcher gone: nobody left to notify.
                    break;
                }
            }
        }
    })
}
