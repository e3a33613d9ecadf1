//! Transition Queue — the bounded hand-off between the progress driver and
//! the notification dispatcher.
//!
//! Producer side never blocks: a full queue drops the signal (the caller
//! logs it and moves on — state already reflects the latest stage, so the
//! next successful signal delivers current truth). Consumer side suspends
//! its own task until a signal arrives. Dropping every sender closes the
//! queue; `next_signal` then returns `None`, which is the dispatcher's
//! shutdown sentinel.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::errors::TrackError;

/// Create a transition queue of the given capacity.
pub fn transition_queue(capacity: usize) -> (TransitionSender, TransitionReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (TransitionSender { tx }, TransitionReceiver { rx })
}

/// Producer half. Cloneable; the queue closes when all clones are dropped.
#[derive(Clone)]
pub struct TransitionSender {
    tx: mpsc::Sender<usize>,
}

impl TransitionSender {
    /// Enqueue a "this order changed" signal, best-effort.
    pub fn signal(&self, order_id: usize) -> Result<(), TrackError> {
        self.tx.try_send(order_id).map_err(|err| match err {
            TrySendError::Full(_) => TrackError::QueueFull { order_id },
            TrySendError::Closed(_) => TrackError::QueueClosed,
        })
    }
}

/// Consumer half, owned by the dispatcher.
pub struct TransitionReceiver {
    rx: mpsc::Receiver<usize>,
}

impl TransitionReceiver {
    /// Await the next signal; `None` once the queue is closed and drained.
    pub async fn next_signal(&mut self) -> Option<usize> {
        self.rx.recv().await
    }
}
