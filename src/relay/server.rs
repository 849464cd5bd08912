//! HTTP + WebSocket front end for the connection slot
//!
//! `POST /mcp` submits one command; `GET /ws` is where the editor extension
//! connects to receive them.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::core::config::RelaySettings;
use crate::core::error::{FailureKind, InterpretError, Result};
use crate::llm::interpreter::validate_candidate;
use crate::relay::slot::{ConnectionHandle, ConnectionSlot};

#[derive(Debug, Serialize)]
struct SubmitResponse {
    status: &'static str,
    reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    connection: Option<String>,
}

impl SubmitResponse {
    fn rejected(status: StatusCode, reason: &'static str) -> Response {
        (
            status,
            Json(SubmitResponse {
                status: "rejected",
                reason,
                connection: None,
            }),
        )
            .into_response()
    }
}

/// Construct the router with the submission and upgrade routes installed
pub fn build_router(slot: Arc<ConnectionSlot>) -> Router {
    Router::new()
        .route("/mcp", post(submit_command))
        .route("/ws", get(upgrade))
        .with_state(slot)
}

/// Bind the listener described by `settings`
pub async fn bind(settings: &RelaySettings) -> Result<TcpListener> {
    let listener = TcpListener::bind((settings.host.as_str(), settings.port)).await?;
    Ok(listener)
}

/// Serve until the listener fails
pub async fn serve(listener: TcpListener, slot: Arc<ConnectionSlot>) -> Result<()> {
    let addr: SocketAddr = listener.local_addr()?;
    info!("MCP relay listening at http://{}", addr);
    axum::serve(listener, build_router(slot)).await?;
    Ok(())
}

async fn submit_command(State(slot): State<Arc<ConnectionSlot>>, body: Bytes) -> Response {
    let candidate: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "submission is not JSON");
            return SubmitResponse::rejected(StatusCode::BAD_REQUEST, "malformed_command");
        }
    };

    let command = match validate_candidate(&candidate) {
        Ok(command) => command,
        Err(e) => {
            warn!(kind = ?e.kind(), "submission rejected: {}", e);
            return SubmitResponse::rejected(StatusCode::UNPROCESSABLE_ENTITY, rejection_reason(&e));
        }
    };

    if let Ok(pretty) = serde_json::to_string_pretty(&command) {
        debug!("received MCP:\n{}", pretty);
    }

    match slot.forward(&command) {
        Ok(delivery) => (
            StatusCode::OK,
            Json(SubmitResponse {
                status: "accepted",
                reason: "delivered",
                connection: Some(delivery.connection.to_string()),
            }),
        )
            .into_response(),
        Err(e) => SubmitResponse::rejected(StatusCode::SERVICE_UNAVAILABLE, e.kind().reason()),
    }
}

fn rejection_reason(error: &InterpretError) -> &'static str {
    match error.kind() {
        FailureKind::MalformedCompletion => "malformed_command",
        kind => kind.reason(),
    }
}

async fn upgrade(State(slot): State<Arc<ConnectionSlot>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, slot))
}

/// Own one control surface connection for its lifetime.
///
/// Once replaced, the connection stops receiving commands but stays open
/// until the peer closes it.
async fn handle_socket(socket: WebSocket, slot: Arc<ConnectionSlot>) {
    let (handle, mut outbound) = ConnectionHandle::channel();
    let id = handle.id();
    slot.on_connection_accepted(handle);

    let (mut sink, mut stream) = socket.split();
    let mut registered = true;

    loop {
        tokio::select! {
            message = outbound.recv(), if registered => match message {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        debug!(connection = %id, error = %e, "send error");
                        break;
                    }
                }
                // Every sender is gone: this connection was replaced
                None => registered = false,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {
                    // One-directional relay
                }
                Some(Err(e)) => {
                    debug!(connection = %id, error = %e, "receive error");
                    break;
                }
            },
        }
    }

    slot.on_connection_closed(id);
}
