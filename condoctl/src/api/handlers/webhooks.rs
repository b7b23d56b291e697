//! Inbound notifications from the payment gateway.

use crate::{AppState, api::models::payments::WebhookAck, errors::Result};
use axum::{Json, extract::State, http::HeaderMap};

/// Gateway notification endpoint. Public; when a webhook secret is configured the
/// `x-signature` header must verify, otherwise every payload is acknowledged.
#[utoipa::path(
    post,
    path = "/webhooks/payments",
    tag = "payments",
    summary = "Payment gateway webhook",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Notification acknowledged", body = WebhookAck),
        (status = 400, description = "Signature did not verify"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn payment_webhook(State(state): State<AppState>, headers: HeaderMap, body: String) -> Result<Json<WebhookAck>> {
    let event = state.payment_provider.validate_webhook(&headers, &body).await?;

    if let Some(event) = event {
        tracing::debug!("Payment webhook event {} ({:?})", event.event_type, event.resource_id);
        // Processing failures are logged but still acknowledged so the gateway stops retrying
        if let Err(e) = state.payment_provider.process_webhook_event(&event).await {
            tracing::error!("Failed to process payment webhook event {}: {}", event.event_type, e);
        }
    }

    Ok(Json(WebhookAck { received: true }))
}
