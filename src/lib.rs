//! # ordercast
//!
//! Tracks a small fixed set of orders through a linear pipeline and pushes
//! stage changes to subscribers over long-lived SSE connections.
//!
//! The core is four cooperating pieces:
//! - [`stages::StageTable`] — stage names plus one atomic position per order
//! - [`registry::SubscriptionRegistry`] — who watches which order, and how
//!   to reach them
//! - a bounded [`transitions`] queue decoupling the progress
//!   [`driver`] (producer) from the notification [`dispatcher`] (consumer)
//! - [`server`] — the subscription endpoint and HTTP surface
//!
//! Delivery is lossy: a full transition queue drops the signal, and the
//! next successful one carries current truth. Per order, delivered
//! stages are a subsequence of the true sequence, never regressing, always
//! ending at the terminal stage.

pub mod config;
pub mod dispatcher;
pub mod driver;
pub mod errors;
pub mod events;
pub mod registry;
pub mod server;
pub mod stages;
pub mod transitions;
