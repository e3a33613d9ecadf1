//! Typed error hierarchy for the ordercast core.
//!
//! One enum covers the tracker: boundary-level order lookup failures and
//! transition-queue capacity signals. Queue-full is recoverable: the driver
//! drops the signal and keeps ticking, so the variant carries the order that
//! was dropped rather than aborting anything.

use thiserror::Error;

/// Errors from the tracking core.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackError {
    #[error("Unknown order {id}; valid order IDs are 0..{count}")]
    UnknownOrder { id: usize, count: usize },

    #[error("Transition queue full; dropped signal for order {order_id}")]
    QueueFull { order_id: usize },

    #[error("Transition queue closed")]
    QueueClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_order_carries_id_and_range() {
        let err = TrackError::UnknownOrder { id: 9, count: 4 };
        match &err {
            TrackError::UnknownOrder { id, count } => {
                assert_eq!(*id, 9);
                assert_eq!(*count, 4);
            }
            _ => panic!("Expected UnknownOrder variant"),
        }
        assert!(err.to_string().contains("9"));
        assert!(err.to_string().contains("0..4"));
    }

    #[test]
    fn queue_full_carries_dropped_order() {
        let err = TrackError::QueueFull { order_id: 2 };
        match &err {
            TrackError::QueueFull { order_id } => assert_eq!(*order_id, 2),
            _ => panic!("Expected QueueFull variant"),
        }
        assert!(err.to_string().contains("order 2"));
    }

    #[test]
    fn variants_are_distinct() {
        let full = TrackError::QueueFull { order_id: 0 };
        let closed = TrackError::QueueClosed;
        assert!(matches!(full, TrackError::QueueFull { .. }));
        assert!(!matches!(closed, TrackError::QueueFull { .. }));
    }

    #[test]
    fn all_variants_implement_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&TrackError::UnknownOrder { id: 0, count: 1 });
        assert_std_error(&TrackError::QueueFull { order_id: 0 });
        assert_std_error(&TrackError::QueueClosed);
    }
}
