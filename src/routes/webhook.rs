// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook route for Stripe events.

use crate::services::stripe::verify_webhook_signature;
use crate::services::{WebhookEvent, WebhookOutcome};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Header carrying the processor's HMAC signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook/stripe", post(handle_event))
}

#[derive(Serialize)]
struct WebhookAck {
    received: bool,
    outcome: &'static str,
}

fn ack(outcome: &'static str) -> (StatusCode, Json<WebhookAck>) {
    (
        StatusCode::OK,
        Json(WebhookAck {
            received: true,
            outcome,
        }),
    )
}

/// Handle a webhook event (POST).
///
/// The raw body is verified before parsing. Events that cannot be tied to an
/// account are acknowledged so the processor stops retrying them; database
/// and processor failures answer 500 so it redelivers.
async fn handle_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        tracing::warn!("Security Alert: Webhook missing signature header");
        return StatusCode::BAD_REQUEST.into_response();
    };

    if verify_webhook_signature(&body, signature, &state.config.stripe_webhook_secret, Utc::now())
        .is_err()
    {
        tracing::warn!("Security Alert: Webhook signature verification failed");
        return StatusCode::BAD_REQUEST.into_response();
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed webhook payload");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match state.billing.apply_event(&event).await {
        Ok(WebhookOutcome::Applied) => ack("applied").into_response(),
        Ok(WebhookOutcome::Ignored) => ack("ignored").into_response(),
        Ok(WebhookOutcome::Dropped(_)) => ack("dropped").into_response(),
        Err(e) => {
            tracing::error!(
                event_id = %event.id,
                event_type = %event.event_type,
                error = %e,
                "Webhook processing failed"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
