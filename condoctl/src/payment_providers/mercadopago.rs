//! MercadoPago QR checkout.
//!
//! Preferences are placeholders: the checkout link is derived from the fee id and the QR
//! image is static. Webhooks are accepted and, when a secret is configured, authenticated
//! with MercadoPago's `x-signature` scheme:
//!
//! - header `x-signature: ts=<unix seconds>,v1=<hex hmac>`
//! - signed manifest `id:<data.id>;request-id:<x-request-id>;ts:<ts>;`
//! - HMAC-SHA256 keyed with the webhook secret

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::fmt::Write as _;
use url::Url;

use crate::{
    config::MercadoPagoConfig,
    db::models::fees::FeeDBResponse,
    payment_providers::{PaymentError, PaymentPreference, PaymentProvider, Result, WebhookEvent, ensure_payable, placeholder_qr_base64},
};

type HmacSha256 = Hmac<Sha256>;

pub struct MercadoPagoProvider {
    checkout_base_url: Url,
    webhook_secret: Option<String>,
}

impl From<MercadoPagoConfig> for MercadoPagoProvider {
    fn from(config: MercadoPagoConfig) -> Self {
        Self {
            checkout_base_url: config.checkout_base_url,
            webhook_secret: config.webhook_secret,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NotificationBody {
    #[serde(rename = "type")]
    event_type: Option<String>,
    action: Option<String>,
    data: Option<NotificationData>,
}

#[derive(Debug, Deserialize)]
struct NotificationData {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number id, got {other}"))),
    }
}

/// Split `ts=...,v1=...` into its parts
fn parse_signature_header(value: &str) -> Option<(&str, &str)> {
    let mut ts = None;
    let mut v1 = None;
    for part in value.split(',') {
        match part.trim().split_once('=') {
            Some(("ts", v)) => ts = Some(v.trim()),
            Some(("v1", v)) => v1 = Some(v.trim()),
            _ => {}
        }
    }
    Some((ts?, v1?))
}

/// Hex HMAC-SHA256 of the signed manifest
pub(crate) fn sign_manifest(secret: &str, data_id: &str, request_id: &str, ts: &str) -> Option<String> {
    let manifest = format!("id:{data_id};request-id:{request_id};ts:{ts};");
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(manifest.as_bytes());
    let hex = mac.finalize().into_bytes().iter().fold(String::with_capacity(64), |mut hex, byte| {
        let _ = write!(hex, "{byte:02x}");
        hex
    });
    Some(hex)
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

fn header<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}

#[async_trait]
impl PaymentProvider for MercadoPagoProvider {
    async fn create_payment_preference(&self, fee: &FeeDBResponse) -> Result<PaymentPreference> {
        ensure_payable(fee)?;
        let init_point = format!("{}/{}", self.checkout_base_url.as_str().trim_end_matches('/'), fee.id);
        tracing::info!("Created MercadoPago preference for fee {} ({} {})", fee.id, fee.unit_code, fee.period);

        Ok(PaymentPreference {
            init_point,
            qr_code_base64: placeholder_qr_base64(),
        })
    }

    async fn validate_webhook(&self, headers: &axum::http::HeaderMap, body: &str) -> Result<Option<WebhookEvent>> {
        // Unknown payloads are acknowledged so the gateway stops retrying
        let notification = match serde_json::from_str::<NotificationBody>(body) {
            Ok(notification) => Some(notification),
            Err(e) => {
                if !body.trim().is_empty() {
                    tracing::debug!("Ignoring unparseable webhook body: {e}");
                }
                None
            }
        };
        let data_id = notification.as_ref().and_then(|n| n.data.as_ref()).map(|d| d.id.clone());

        if let Some(secret) = &self.webhook_secret {
            let signature = header(headers, "x-signature").ok_or_else(|| {
                tracing::warn!("Webhook without x-signature header");
                PaymentError::InvalidSignature
            })?;
            let (ts, v1) = parse_signature_header(signature).ok_or(PaymentError::InvalidSignature)?;
            let request_id = header(headers, "x-request-id").unwrap_or("");

            let expected =
                sign_manifest(secret, data_id.as_deref().unwrap_or(""), request_id, ts).ok_or(PaymentError::InvalidSignature)?;
            if !constant_time_eq(expected.as_bytes(), v1.to_ascii_lowercase().as_bytes()) {
                tracing::warn!("Webhook signature mismatch");
                return Err(PaymentError::InvalidSignature);
            }
        }

        let event = notification.map(|n| WebhookEvent {
            event_type: n.event_type.or(n.action).unwrap_or_else(|| "unknown".to_string()),
            resource_id: data_id,
        });
        Ok(event)
    }

    async fn process_webhook_event(&self, event: &WebhookEvent) -> Result<()> {
        // Payments are reconciled manually by an administrator
        tracing::info!(
            "Received MercadoPago {} notification for {}",
            event.event_type,
            event.resource_id.as_deref().unwrap_or("<none>")
        );
        Ok(())
    }
}
