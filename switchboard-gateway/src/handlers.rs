//! # Request Handlers
//!
//! The OpenAI-compatible completion endpoint (unary and SSE streaming),
//! the models listing, health/metrics, and the administrative surface over
//! the smart router.
//!
//! ## Streaming
//!
//! Streaming responses are server-sent events: every upstream delta is one
//! `data: <json>` frame, a heartbeat comment frame goes out every 30
//! seconds while the upstream is quiet, and the stream always terminates
//! with `data: [DONE]`. Failures before the first delta surface as plain
//! HTTP errors (the client still gets a status code); failures after
//! partial delivery are reported in-band as an error frame, because the
//! status line is already on the wire.

use crate::gateway_error::GatewayError;
use crate::server::AppState;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{Response, StatusCode};
use axum::response::Json;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use switchboard_router::config::RouterConfig;
use switchboard_router::error::RouterError;
use switchboard_router::models::{ChatRequest, SelectionResult, StreamChunk};
use switchboard_router::router::ChunkSink;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Chat completions, unary and streaming.
pub async fn chat_completions(
    State(state): State<AppState>,
    Json(mut request): Json<ChatRequest>,
) -> Result<Response<Body>, GatewayError> {
    if request.model.is_empty() {
        return Err(GatewayError::InvalidRequest {
            message: "model must not be empty".to_string(),
        });
    }
    if request.messages.is_empty() {
        return Err(GatewayError::InvalidRequest {
            message: "messages must not be empty".to_string(),
        });
    }
    if request.request_id.is_none() {
        request.request_id = Some(uuid::Uuid::new_v4().to_string());
    }

    if request.stream.unwrap_or(false) {
        return stream_chat_completions(state, request).await;
    }

    let request_id = request.request_id.clone().unwrap_or_default();
    let started = Instant::now();
    let (selection, response) = state.router.route(request).await.inspect_err(|e| {
        tracing::warn!(request_id = %request_id, error = %e, "chat completion failed");
    })?;

    tracing::info!(
        request_id = %request_id,
        provider = %selection.provider_name,
        attempts = selection.attempts,
        latency_ms = started.elapsed().as_millis() as u64,
        "chat completion served"
    );

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/json")
        .header("x-request-id", request_id)
        .header("x-selected-provider", &selection.provider_name)
        .body(Body::from(serde_json::to_string(&response)?))
        .unwrap())
}

/// Events flowing from the routing task to the SSE encoder.
enum StreamEvent {
    Chunk(StreamChunk),
    Completed(Box<Result<SelectionResult, RouterError>>),
}

struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
}

#[async_trait::async_trait]
impl ChunkSink for EventSink {
    async fn deliver(&mut self, chunk: StreamChunk) -> bool {
        self.tx.send(StreamEvent::Chunk(chunk)).await.is_ok()
    }
}

async fn stream_chat_completions(
    state: AppState,
    request: ChatRequest,
) -> Result<Response<Body>, GatewayError> {
    let request_id = request.request_id.clone().unwrap_or_default();
    let (tx, mut rx) = mpsc::channel::<StreamEvent>(64);

    let router = state.router.clone();
    let worker_request_id = request_id.clone();
    tokio::spawn(async move {
        let mut sink = EventSink { tx: tx.clone() };
        let outcome = router.route_stream(request, &mut sink).await;
        if let Err(e) = &outcome {
            tracing::warn!(request_id = %worker_request_id, error = %e, "stream routing failed");
        }
        let _ = tx.send(StreamEvent::Completed(Box::new(outcome))).await;
    });

    // The first event decides between a plain HTTP error and an SSE body:
    // nothing has been written yet, so pre-delivery failures keep their
    // proper status codes.
    let first_event = match rx.recv().await {
        Some(StreamEvent::Completed(outcome)) => match *outcome {
            Err(e) => return Err(e.into()),
            Ok(selection) => StreamEvent::Completed(Box::new(Ok(selection))),
        },
        Some(event) => event,
        None => {
            return Err(GatewayError::Internal {
                message: "stream worker exited without a result".to_string(),
            })
        }
    };

    // Encoder task: turns events into SSE frames and keeps the connection
    // warm with a heartbeat while the upstream is quiet.
    let (frame_tx, frame_rx) = mpsc::channel::<Bytes>(64);
    let encoder_request_id = request_id.clone();
    tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        heartbeat.tick().await;

        let mut pending = Some(first_event);
        loop {
            let event = match pending.take() {
                Some(event) => Some(event),
                None => tokio::select! {
                    event = rx.recv() => event,
                    _ = heartbeat.tick() => {
                        let ping = Bytes::from_static(b"event: heartbeat\ndata: ping\n\n");
                        if frame_tx.send(ping).await.is_err() {
                            return;
                        }
                        continue;
                    }
                },
            };

            match event {
                Some(StreamEvent::Chunk(chunk)) => {
                    if let Ok(json) = serde_json::to_string(&chunk) {
                        let frame = Bytes::from(format!("data: {json}\n\n"));
                        if frame_tx.send(frame).await.is_err() {
                            return;
                        }
                    }
                }
                Some(StreamEvent::Completed(outcome)) => {
                    match *outcome {
                        Ok(selection) => {
                            log_stream_completion(&encoder_request_id, &selection)
                        }
                        Err(e) => {
                            // Partial output already reached the client;
                            // report in-band and terminate.
                            let frame = json!({"error": {"message": e.to_string()}});
                            let _ = frame_tx
                                .send(Bytes::from(format!("data: {frame}\n\n")))
                                .await;
                        }
                    }
                    let _ = frame_tx.send(Bytes::from_static(b"data: [DONE]\n\n")).await;
                    return;
                }
                None => return,
            }
        }
    });

    let body = Body::from_stream(ReceiverStream::new(frame_rx).map(Ok::<_, Infallible>));

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream")
        .header("cache-control", "no-cache")
        .header("connection", "keep-alive")
        .header("x-request-id", request_id)
        .body(body)
        .unwrap())
}

fn log_stream_completion(request_id: &str, selection: &SelectionResult) {
    tracing::info!(
        request_id = %request_id,
        provider = %selection.provider_name,
        attempts = selection.attempts,
        "streaming completion finished"
    );
}

/// Models reachable through the configured fleet, OpenAI list shape.
pub async fn list_models(State(state): State<AppState>) -> Json<Value> {
    let mut data = Vec::new();
    for (name, provider) in &state.config.providers {
        if !provider.enabled {
            continue;
        }
        for model in provider.model_mapping.keys() {
            data.push(json!({
                "id": model,
                "object": "model",
                "owned_by": name,
            }));
        }
    }
    data.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));
    Json(json!({ "object": "list", "data": data }))
}

/// Liveness endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let statuses = state.router.provider_statuses().await;
    let healthy = statuses.iter().filter(|s| s.health.is_healthy).count();
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "providers": statuses.len(),
        "providers_healthy": healthy,
    }))
}

/// Router metrics snapshot.
pub async fn metrics(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::to_value(state.router.get_metrics()).unwrap_or_default())
}

/// Per-provider status: breaker, health, weight and live load.
pub async fn list_providers(State(state): State<AppState>) -> Json<Value> {
    let statuses = state.router.provider_statuses().await;
    Json(json!({
        "strategy": state.router.strategy_name().await,
        "providers": statuses,
    }))
}

#[derive(Debug, Deserialize)]
pub struct WeightUpdate {
    weight: i64,
}

/// Change one provider's weight at runtime.
pub async fn update_provider_weight(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(update): Json<WeightUpdate>,
) -> Result<Json<Value>, GatewayError> {
    if update.weight < 0 {
        return Err(GatewayError::InvalidRequest {
            message: format!("weight must be non-negative, got {}", update.weight),
        });
    }
    state
        .router
        .update_provider_weight(&name, update.weight as u32)
        .await?;
    Ok(Json(json!({ "provider": name, "weight": update.weight })))
}

/// Manually close one provider's circuit breaker.
pub async fn reset_breaker(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    state.router.reset_breaker(&name).await?;
    Ok(Json(json!({ "provider": name, "breaker": "closed" })))
}

/// Current configuration with secrets redacted; the router section is the
/// live one, which may have drifted from the file through admin updates.
pub async fn get_config(State(state): State<AppState>) -> Json<Value> {
    let redacted = state.config.redacted();
    Json(json!({
        "server": redacted.server,
        "providers": redacted.providers,
        "router": state.router.current_config().await,
        "logging": redacted.logging,
    }))
}

/// Swap the live router configuration (strategy, weights, breaker, probe
/// cadence). Does not touch the provider fleet or server settings.
pub async fn update_router_config(
    State(state): State<AppState>,
    Json(new_config): Json<RouterConfig>,
) -> Result<Json<Value>, GatewayError> {
    state.router.update_config(new_config).await?;
    Ok(Json(json!({ "router": state.router.current_config().await })))
}
