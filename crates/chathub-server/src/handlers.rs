//! Connection handlers for the chat hub server.
//!
//! This module handles the connection lifecycle and event decoding.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::BytesMut;
use chathub_core::{Hub, HubStats, Outbound};
use chathub_protocol::{codec, ClientEvent, ProtocolError, ServerEvent};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Shared server state.
pub struct AppState {
    /// The chat hub.
    pub hub: Hub,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            hub: Hub::new(config.hub_config()),
            config,
        }
    }
}

/// Build the HTTP router.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route(&state.config.transport.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/broadcast", post(broadcast_handler))
        .with_state(state)
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let app = build_app(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Chat hub listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.hub.session_count(),
    }))
}

/// Online users and room occupancy.
async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<HubStats> {
    Json(state.hub.stats())
}

/// Body of an operator announcement.
#[derive(Debug, Deserialize)]
struct Announcement {
    message: String,
}

/// Operator announcement to every connected session.
async fn broadcast_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Announcement>,
) -> Response {
    match state.hub.announce(&body.message) {
        Ok(count) => Json(serde_json::json!({
            "status": "broadcast_sent",
            "count": count,
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Announcement rejected");
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "status": "rejected",
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    if state.hub.session_count() >= state.config.limits.max_connections {
        warn!(
            limit = state.config.limits.max_connections,
            "Connection refused, server full"
        );
        metrics::record_connection_rejected();
        return (StatusCode::SERVICE_UNAVAILABLE, "server full").into_response();
    }

    ws.max_message_size(state.config.limits.max_frame_size)
        .on_upgrade(move |socket| handle_websocket(socket, state))
        .into_response()
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let connection_id = Uuid::new_v4().simple().to_string();
    debug!(connection = %connection_id, "WebSocket connected");

    let (sender, mut receiver) = socket.split();
    let (outbox, rx) = chathub_core::outbox();

    // Replies follow the encoding the client last used.
    let binary = Arc::new(AtomicBool::new(false));
    let mut writer = pusher_loop(rx, sender, Arc::clone(&binary), connection_id.clone());

    if let Err(e) = state.hub.connect(&connection_id, outbox) {
        error!(connection = %connection_id, error = %e, "Failed to register session");
        writer.abort();
        return;
    }
    metrics::set_active_rooms(state.hub.room_count());

    // Read buffer for partial binary frames
    let mut read_buffer = BytesMut::with_capacity(4096);

    loop {
        tokio::select! {
            // The writer stops when the hub asks to close or the socket is gone.
            _ = &mut writer => {
                debug!(connection = %connection_id, "Writer finished");
                break;
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        binary.store(false, Ordering::Relaxed);
                        metrics::record_event(text.len(), "inbound");
                        match codec::decode_text::<ClientEvent>(&text) {
                            Ok(event) => dispatch(&state, &connection_id, event),
                            Err(e) => reject_malformed(&state, &connection_id, &e),
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        binary.store(true, Ordering::Relaxed);
                        metrics::record_event(data.len(), "inbound");
                        read_buffer.extend_from_slice(&data);

                        loop {
                            match codec::decode_from::<ClientEvent>(&mut read_buffer) {
                                Ok(Some(event)) => dispatch(&state, &connection_id, event),
                                Ok(None) => break,
                                Err(e) => {
                                    reject_malformed(&state, &connection_id, &e);
                                    read_buffer.clear();
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        // Transport-level keepalive; the WebSocket layer answers pings.
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %connection_id, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(connection = %connection_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    writer.abort();
    state.hub.disconnect(&connection_id);
    metrics::set_active_rooms(state.hub.room_count());

    debug!(connection = %connection_id, "WebSocket disconnected");
}

/// Spawn the task that drains a session's outbox into its socket.
fn pusher_loop(
    mut rx: UnboundedReceiver<Outbound>,
    mut sender: SplitSink<WebSocket, Message>,
    binary: Arc<AtomicBool>,
    connection_id: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Event(event) => {
                    let message = match encode_event(&event, binary.load(Ordering::Relaxed)) {
                        Ok(message) => message,
                        Err(e) => {
                            error!(connection = %connection_id, error = %e, "Failed to encode event");
                            continue;
                        }
                    };
                    if sender.send(message).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    })
}

fn encode_event(event: &ServerEvent, binary: bool) -> Result<Message, ProtocolError> {
    let message = if binary {
        Message::Binary(codec::encode(event)?.to_vec())
    } else {
        Message::Text(codec::encode_text(event)?)
    };
    let len = match &message {
        Message::Binary(data) => data.len(),
        Message::Text(text) => text.len(),
        _ => 0,
    };
    metrics::record_event(len, "outbound");
    Ok(message)
}

/// Hand a decoded event to the hub.
fn dispatch(state: &AppState, connection_id: &str, event: ClientEvent) {
    let joins_room = matches!(event, ClientEvent::JoinRoom(_));

    let result = match event {
        ClientEvent::PongCheck(echoed) => state
            .hub
            .pong(connection_id, echoed)
            .map(metrics::record_heartbeat_latency),
        other => state.hub.handle(connection_id, other),
    };

    match result {
        Ok(()) if joins_room => metrics::set_active_rooms(state.hub.room_count()),
        Ok(()) => {}
        Err(e) => metrics::record_rejection(e.kind()),
    }
}

fn reject_malformed(state: &AppState, connection_id: &str, err: &ProtocolError) {
    warn!(connection = %connection_id, error = %err, "Malformed event");
    metrics::record_rejection("malformed");
    state.hub.send_to(
        connection_id,
        ServerEvent::Error("malformed event".to_string()),
    );
}
