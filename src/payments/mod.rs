pub mod signature;
pub mod stripe;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::Json,
};
use serde_json::{json, Value};

use crate::{
    errors::{AppError, AppResult},
    server::AppState,
};
use stripe::{CheckoutRequest, WebhookEvent};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Create a Stripe Checkout session
pub async fn checkout_handler(
    State(state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(request) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;

    let session = stripe::create_checkout_session(&state.config.stripe, &state.http_client, &request).await?;

    tracing::info!(session_id = %session.id, "Checkout session created");
    Ok(Json(json!({
        "success": true,
        "sessionId": session.id,
        "url": session.url,
    })))
}

/// Receive a Stripe webhook.
///
/// Without a webhook secret the event is acknowledged and ignored.
pub async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let stripe_config = &state.config.stripe;
    let Some(secret) = stripe_config.webhook_secret() else {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not configured, ignoring webhook");
        return Ok(Json(json!({ "received": true, "verified": false })));
    };

    let header = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());
    signature::verify(
        header,
        &body,
        secret,
        stripe_config.webhook_tolerance_seconds,
        chrono::Utc::now().timestamp(),
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "Rejected webhook signature");
        AppError::bad_request(format!("Webhook signature verification failed: {}", e))
    })?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request(format!("Invalid webhook payload: {}", e)))?;

    tracing::info!(event_id = %event.id, event_type = %event.kind, livemode = event.livemode, "Stripe webhook received");

    Ok(Json(json!({
        "received": true,
        "verified": true,
        "type": event.kind,
    })))
}
