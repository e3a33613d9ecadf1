//! Notification Dispatcher — drains the transition queue and fans each
//! signal out to the order's watchers.
//!
//! One process-lifetime task. Per signal: read the order's current stage,
//! snapshot its watcher set, and push to each watcher in turn. Registry
//! changes after the snapshot do not affect the iteration in flight; a
//! watcher whose channel is already gone is skipped silently. Delivering
//! the terminal stage closes the watcher's channel through the same
//! idempotent cleanup a disconnect uses, so a subscriber never outlives
//! its final event.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::events::StageEvent;
use crate::registry::SubscriptionRegistry;
use crate::stages::StageTable;
use crate::transitions::TransitionReceiver;

/// Spawn the dispatcher worker. It runs until the transition queue closes.
pub fn spawn_dispatcher(
    stages: Arc<StageTable>,
    registry: Arc<SubscriptionRegistry>,
    mut transitions: TransitionReceiver,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(order_id) = transitions.next_signal().await {
            dispatch(&stages, &registry, order_id).await;
        }
        info!("transition queue closed; dispatcher exiting");
    })
}

/// Deliver one order's current stage to everyone watching it.
async fn dispatch(stages: &StageTable, registry: &SubscriptionRegistry, order_id: usize) {
    let Some(stage_index) = stages.current(order_id) else {
        return;
    };
    let stage = stages.name(stage_index).to_string();
    let terminal = stages.is_terminal(stage_index);

    for subscriber in registry.watchers_of(order_id) {
        // Raced with a concurrent cleanup: already gone, not a fault.
        let Some(sender) = registry.sender_for(subscriber) else {
            continue;
        };
        let event = StageEvent::new(order_id, stage.clone());
        if sender.send(event).await.is_err() {
            // Receiver dropped mid-push; same cleanup path as a disconnect.
            registry.unregister(subscriber);
            continue;
        }
        debug!(%subscriber, order_id, stage = %stage, "pushed");
        if terminal {
            // No more updates will ever come: close the channel now.
            registry.unregister(subscriber);
        }
    }
}
