//! Payment gateway abstraction layer
//!
//! Residents can pay a fee through an external checkout. This module defines the
//! `PaymentProvider` trait that builds checkout preferences and accepts gateway webhooks.
//! Recording a payment against a fee always goes through [`crate::billing`]; providers
//! never write to the database themselves.

use async_trait::async_trait;
use axum::http::StatusCode;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use rust_decimal::Decimal;

use crate::{api::models::fees::FeeStatus, config::PaymentConfig, db::models::fees::FeeDBResponse};

pub mod dummy;
pub mod mercadopago;

/// Image shown while no real QR is generated by the gateway
const PLACEHOLDER_QR_PNG: &[u8] = include_bytes!("placeholder_qr.png");

pub(crate) fn placeholder_qr_base64() -> String {
    BASE64_STANDARD.encode(PLACEHOLDER_QR_PNG)
}

/// Reject fees a checkout makes no sense for
pub(crate) fn ensure_payable(fee: &FeeDBResponse) -> Result<()> {
    if fee.status == FeeStatus::Paid {
        return Err(PaymentError::InvalidData(format!("Fee {} is already paid", fee.id)));
    }
    if fee.amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidData(format!("Fee {} has nothing to pay", fee.id)));
    }
    Ok(())
}

/// Create a payment provider from configuration
///
/// This is the single point where we convert config into provider instances.
/// Adding a new provider requires adding a match arm here.
pub fn create_provider(config: PaymentConfig) -> Box<dyn PaymentProvider> {
    match config {
        PaymentConfig::MercadoPago(mp_config) => Box::new(mercadopago::MercadoPagoProvider::from(mp_config)),
        PaymentConfig::Dummy(dummy_config) => Box::new(dummy::DummyProvider::from(dummy_config)),
    }
}

/// Result type for payment provider operations
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors that can occur while talking to a payment gateway
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment provider API error: {0}")]
    ProviderApi(String),

    #[error("Invalid payment data: {0}")]
    InvalidData(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,
}

impl From<PaymentError> for StatusCode {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidData(_) | PaymentError::InvalidSignature => StatusCode::BAD_REQUEST,
            PaymentError::ProviderApi(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Checkout data for a single fee
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentPreference {
    /// URL the payer is sent to
    pub init_point: String,
    /// PNG of the QR code, base64 encoded
    pub qr_code_base64: String,
}

/// Represents a webhook event from a payment gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    /// Type of event (e.g., "payment")
    pub event_type: String,
    /// Gateway-side id of the object the event is about, if any
    pub resource_id: Option<String>,
}

/// Abstract payment gateway interface
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Build the checkout preference for a fee
    async fn create_payment_preference(&self, fee: &FeeDBResponse) -> Result<PaymentPreference>;

    /// Validate and extract a webhook event from raw request data
    ///
    /// Returns None if this provider doesn't support webhooks.
    /// Returns Err if validation fails (invalid signature, malformed data, etc.)
    async fn validate_webhook(&self, headers: &axum::http::HeaderMap, body: &str) -> Result<Option<WebhookEvent>>;

    /// Process a validated webhook event. Must be safe to call repeatedly with the same event.
    async fn process_webhook_event(&self, event: &WebhookEvent) -> Result<()>;
}
