//! Webhook ingestion endpoint

use axum::{
    Json,
    body::{self, Body},
    extract::{ConnectInfo, Request, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};

use crate::SharedState;
use crate::error::WebhookerError;
use crate::notify::DispatchResult;
use crate::payload::{InboundEvent, extract_message, interpret};

/// Handles POST /webhook.
///
/// The sender gets 200 whenever its body could be read, whatever the payload
/// looks like and whether or not the notification went out. Only a failure to
/// read the request itself produces the generic 500.
pub async fn handle_webhook(AxumState(state): AxumState<SharedState>, req: Request) -> Response {
    let event = match read_event(req, state.config.server.max_body_bytes).await {
        Ok(event) => event,
        Err(e) => {
            error!("Error while handling webhook: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": "Internal server error"
                })),
            )
                .into_response();
        }
    };

    let payload = interpret(event.content_type(), &event.body);
    state.sink.record(&event, &payload);

    match extract_message(&payload) {
        Some(message) => match &state.notifier {
            Some(notifier) => match notifier.dispatch(&message).await {
                DispatchResult::Sent(status) => {
                    info!("[{}] Notification dispatched (status {})", event.id, status);
                }
                DispatchResult::Failed(reason) => {
                    warn!("[{}] Notification not delivered: {}", event.id, reason);
                }
            },
            None => {
                warn!(
                    "[{}] Message extracted but no notify token is configured; skipping",
                    event.id
                );
            }
        },
        None => debug!("[{}] No data.message in payload", event.id),
    }

    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "message": "Webhook received successfully",
            "timestamp": event.timestamp(),
        })),
    )
        .into_response()
}

/// Handles GET /webhook
pub async fn webhook_info() -> impl IntoResponse {
    Json(json!({
        "message": "Webhook endpoint is ready",
        "methods": ["POST"],
        "endpoint": "/webhook",
    }))
}

async fn read_event(req: Request, limit: usize) -> Result<InboundEvent, WebhookerError> {
    let (parts, body): (_, Body) = req.into_parts();
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let bytes = body::to_bytes(body, limit)
        .await
        .map_err(|e| WebhookerError::RequestReadFailed(e.to_string()))?;

    Ok(InboundEvent::from_parts(&parts, bytes, peer))
}
