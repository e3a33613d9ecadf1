//! Stage Table — the ordered pipeline stage names and each order's current
//! position in them.
//!
//! # Thread Safety
//!
//! The stage name list is immutable for the process lifetime. Each order's
//! position is a dedicated `AtomicUsize`; `advance` uses a CAS loop so
//! concurrent advances on the same order are linearizable, and advances on
//! different orders never contend. Readers may race with `advance` freely —
//! they observe either the old or the new index, both valid.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Pipeline stage names plus the current-stage index per order.
///
/// Orders are identified by their index into the table: `0..order_count`.
/// An order's index is monotonically non-decreasing and never exceeds the
/// terminal index; advancing a terminal order is an idempotent no-op.
#[derive(Debug)]
pub struct StageTable {
    stages: Vec<String>,
    current: Vec<AtomicUsize>,
}

impl StageTable {
    /// Build a table with every order at the initial stage (index 0).
    ///
    /// `stages` must be non-empty; `TrackerConfig::validate` enforces this
    /// before the table is constructed.
    pub fn new(stages: Vec<String>, order_count: usize) -> Self {
        let current = (0..order_count).map(|_| AtomicUsize::new(0)).collect();
        Self { stages, current }
    }

    #[must_use]
    pub fn order_count(&self) -> usize {
        self.current.len()
    }

    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Index of the terminal stage.
    #[must_use]
    pub fn terminal_index(&self) -> usize {
        self.stages.len() - 1
    }

    #[must_use]
    pub fn is_terminal(&self, stage_index: usize) -> bool {
        stage_index >= self.terminal_index()
    }

    /// Resolve a stage index to its name.
    #[must_use]
    pub fn name(&self, stage_index: usize) -> &str {
        &self.stages[stage_index.min(self.terminal_index())]
    }

    /// Current stage index of an order, or `None` for an unknown order ID.
    #[must_use]
    pub fn current(&self, order_id: usize) -> Option<usize> {
        self.current
            .get(order_id)
            .map(|idx| idx.load(Ordering::Acquire))
    }

    /// Advance an order by exactly one stage, returning the resulting index.
    ///
    /// A no-op when the order is already terminal — a driver that keeps
    /// firing after completion must not error. Returns `None` for an unknown
    /// order ID.
    pub fn advance(&self, order_id: usize) -> Option<usize> {
        let slot = self.current.get(order_id)?;
        let terminal = self.terminal_index();
        match slot.fetch_update(Ordering::AcqRel, Ordering::Acquire, |idx| {
            (idx < terminal).then_some(idx + 1)
        }) {
            Ok(previous) => Some(previous + 1),
            Err(terminal_idx) => Some(terminal_idx),
        }
    }
}
