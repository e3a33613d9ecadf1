//! Event payload pushed over a subscriber's channel.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single stage notification for one order.
///
/// The event ID is a fresh UUID per event; it carries no meaning beyond
/// uniqueness and traceability across the transport boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    pub order_id: usize,
    pub event_id: Uuid,
    /// Stage name, free text (e.g. "In Transit").
    pub stage: String,
}

impl StageEvent {
    pub fn new(order_id: usize, stage: impl Into<String>) -> Self {
        Self {
            order_id,
            event_id: Uuid::new_v4(),
            stage: stage.into(),
        }
    }
}
