//! HTTP surface: the subscription endpoint, read-only order snapshots, and
//! server wire-up.
//!
//! `build_router` returns the bare router so tests can drive it in-process;
//! `start_server` attaches middleware, spawns the driver and dispatcher
//! tasks, and serves until ctrl-c.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info};

use crate::config::TrackerConfig;
use crate::dispatcher::spawn_dispatcher;
use crate::driver::spawn_driver;
use crate::errors::TrackError;
use crate::events::StageEvent;
use crate::registry::{SubscriberId, SubscriptionRegistry};
use crate::stages::StageTable;
use crate::transitions::transition_queue;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub stages: Arc<StageTable>,
    pub registry: Arc<SubscriptionRegistry>,
    pub subscriber_buffer: usize,
    pub subscriber_timeout: Duration,
}

pub type SharedState = Arc<AppState>;

// ── Response payload types ────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct OrderSnapshot {
    pub order_id: usize,
    pub stage_index: usize,
    pub stage: String,
    pub terminal: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
    version: &'static str,
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/subscribe/{order_id}", get(subscribe))
        .route("/orders", get(list_orders))
        .route("/orders/{order_id}", get(get_order))
        .route("/health", get(health))
        .with_state(state)
}

// ── GET /subscribe/{order_id} (SSE) ───────────────────────────────────

/// Per-connection cleanup hook: dropping the response stream — client
/// disconnect, timeout expiry, or normal end — deregisters the subscriber.
struct CleanupGuard {
    subscriber: SubscriberId,
    registry: Arc<SubscriptionRegistry>,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        // Idempotent: terminal delivery may have already removed the entry.
        if self.registry.unregister(self.subscriber) {
            debug!(subscriber = %self.subscriber, "subscriber gone; cleaned up");
        }
    }
}

async fn subscribe(
    State(state): State<SharedState>,
    Path(order_id): Path<usize>,
) -> Result<Response, ApiError> {
    let count = state.stages.order_count();
    if order_id >= count {
        return Err(ApiError::NotFound(
            TrackError::UnknownOrder { id: order_id, count }.to_string(),
        ));
    }

    let subscriber = SubscriberId::new();
    let (tx, rx) = mpsc::channel(state.subscriber_buffer);
    state.registry.register(order_id, subscriber, tx.clone());
    info!(%subscriber, order_id, "subscribed");

    // Immediate push of present truth: the caller always receives at least
    // one event, even if no transition ever fires afterwards.
    // In-range ID, so the table entry exists for the process lifetime.
    let stage_index = state.stages.current(order_id).unwrap_or_default();
    let stage = state.stages.name(stage_index).to_string();
    // Freshly created channel; the buffer cannot be full.
    let _ = tx.try_send(StageEvent::new(order_id, stage));
    drop(tx);

    if state.stages.is_terminal(stage_index) {
        // Already complete: that one push is all this subscriber will ever
        // receive. Close the channel so the stream ends after draining.
        state.registry.unregister(subscriber);
    }

    let guard = CleanupGuard {
        subscriber,
        registry: Arc::clone(&state.registry),
    };
    let events = ReceiverStream::new(rx)
        .map(move |event| {
            let _ = &guard; // owned by the stream; Drop runs cleanup
            Ok::<_, Infallible>(
                Event::default()
                    .event("stage")
                    .id(event.event_id.to_string())
                    .data(event.stage),
            )
        })
        .take_until(tokio::time::sleep(state.subscriber_timeout));

    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));

    Ok((headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response())
}

// ── GET /orders, /orders/{order_id} ───────────────────────────────────

fn snapshot(stages: &StageTable, order_id: usize) -> Option<OrderSnapshot> {
    let stage_index = stages.current(order_id)?;
    Some(OrderSnapshot {
        order_id,
        stage_index,
        stage: stages.name(stage_index).to_string(),
        terminal: stages.is_terminal(stage_index),
    })
}

async fn list_orders(State(state): State<SharedState>) -> Json<Vec<OrderSnapshot>> {
    let snapshots = (0..state.stages.order_count())
        .filter_map(|order_id| snapshot(&state.stages, order_id))
        .collect();
    Json(snapshots)
}

async fn get_order(
    State(state): State<SharedState>,
    Path(order_id): Path<usize>,
) -> Result<Json<OrderSnapshot>, ApiError> {
    snapshot(&state.stages, order_id).map(Json).ok_or_else(|| {
        ApiError::NotFound(
            TrackError::UnknownOrder {
                id: order_id,
                count: state.stages.order_count(),
            }
            .to_string(),
        )
    })
}

// ── GET /health ───────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        service: "ordercast",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ── Server wire-up ────────────────────────────────────────────────────

/// Start the tracker: spawn the progress driver and notification
/// dispatcher, then serve the HTTP surface until ctrl-c.
pub async fn start_server(config: TrackerConfig) -> Result<()> {
    config.validate()?;

    let stages = Arc::new(StageTable::new(config.stages.clone(), config.order_count));
    let registry = Arc::new(SubscriptionRegistry::new());
    let (transitions_tx, transitions_rx) = transition_queue(config.queue_capacity);

    let driver = spawn_driver(
        Arc::clone(&stages),
        transitions_tx,
        config.advance_interval(),
    );
    let dispatcher = spawn_dispatcher(Arc::clone(&stages), Arc::clone(&registry), transitions_rx);

    let state = Arc::new(AppState {
        stages,
        registry,
        subscriber_buffer: config.subscriber_buffer,
        subscriber_timeout: config.subscriber_timeout(),
    });

    let mut app = build_router(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );
    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!("ordercast listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Aborting the driver drops the only queue producer; the dispatcher
    // drains what is left and exits on the closed-queue sentinel.
    driver.abort();
    let _ = dispatcher.await;
    info!("ordercast shut down");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; serve until the process is killed.
        std::future::pending::<()>().await;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state(subscriber_timeout: Duration) -> SharedState {
        let config = TrackerConfig::default();
        Arc::new(AppState {
            stages: Arc::new(StageTable::new(config.stages.clone(), config.order_count)),
            registry: Arc::new(SubscriptionRegistry::new()),
            subscriber_buffer: config.subscriber_buffer,
            subscriber_timeout,
        })
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = build_router(test_state(Duration::from_secs(120)));
        let resp = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["service"], "ordercast");
    }

    #[tokio::test]
    async fn orders_listing_snapshots_every_order() {
        let state = test_state(Duration::from_secs(120));
        state.stages.advance(2);
        let app = build_router(Arc::clone(&state));

        let resp = app.oneshot(get_request("/orders")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let orders: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(orders.as_array().unwrap().len(), 4);
        assert_eq!(orders[0]["stage"], "Accepted");
        assert_eq!(orders[2]["stage"], "Inventory Confirmed");
        assert_eq!(orders[2]["terminal"], false);
    }

    #[tokio::test]
    async fn single_order_snapshot_and_unknown_id() {
        let app = build_router(test_state(Duration::from_secs(120)));
        let resp = app
            .clone()
            .oneshot(get_request("/orders/3"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.oneshot(get_request("/orders/17")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].as_str().unwrap().contains("Unknown order 17"));
    }

    #[tokio::test]
    async fn subscribe_to_unknown_order_is_a_usage_error() {
        let state = test_state(Duration::from_secs(120));
        let app = build_router(Arc::clone(&state));
        let resp = app.oneshot(get_request("/subscribe/99")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        // The usage error never touched core state.
        assert_eq!(state.registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn subscribe_pushes_current_stage_immediately() {
        let state = test_state(Duration::from_secs(120));
        let app = build_router(Arc::clone(&state));

        let resp = app.oneshot(get_request("/subscribe/0")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );

        let mut body = resp.into_body().into_data_stream();
        let first = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let frame = String::from_utf8(first.to_vec()).unwrap();
        assert!(frame.contains("event: stage"));
        assert!(frame.contains("data: Accepted"));
        assert_eq!(state.registry.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn subscribe_to_terminal_order_yields_one_push_then_closure() {
        let state = test_state(Duration::from_secs(120));
        let terminal = state.stages.terminal_index();
        for _ in 0..terminal {
            state.stages.advance(1);
        }
        let app = build_router(Arc::clone(&state));

        let resp = app.oneshot(get_request("/subscribe/1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        // The whole body terminates without waiting out the timeout: the
        // channel was closed right after the immediate push.
        let bytes = tokio::time::timeout(
            Duration::from_secs(5),
            resp.into_body().collect(),
        )
        .await
        .unwrap()
        .unwrap()
        .to_bytes();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(body.matches("data: Completed").count(), 1);
        assert_eq!(state.registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn timeout_expiry_closes_the_stream_and_cleans_up() {
        let state = test_state(Duration::from_millis(50));
        let app = build_router(Arc::clone(&state));

        let resp = app.oneshot(get_request("/subscribe/0")).await.unwrap();
        // Order 0 never advances here, so only the timeout ends the body.
        let bytes = tokio::time::timeout(
            Duration::from_secs(5),
            resp.into_body().collect(),
        )
        .await
        .unwrap()
        .unwrap()
        .to_bytes();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("data: Accepted"));
        // Guard ran on stream end.
        assert_eq!(state.registry.subscriber_count(), 0);
    }
}
