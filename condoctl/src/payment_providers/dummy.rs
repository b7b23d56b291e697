//! Dummy payment provider implementation
//!
//! Points the checkout at a local URL and ignores webhooks. Useful for development and
//! for demos without gateway credentials.

use async_trait::async_trait;
use url::Url;

use crate::{
    config::DummyConfig,
    db::models::fees::FeeDBResponse,
    payment_providers::{PaymentPreference, PaymentProvider, Result, WebhookEvent, ensure_payable, placeholder_qr_base64},
};

pub struct DummyProvider {
    checkout_base_url: Url,
}

impl From<DummyConfig> for DummyProvider {
    fn from(config: DummyConfig) -> Self {
        Self {
            checkout_base_url: config.checkout_base_url,
        }
    }
}

#[async_trait]
impl PaymentProvider for DummyProvider {
    async fn create_payment_preference(&self, fee: &FeeDBResponse) -> Result<PaymentPreference> {
        ensure_payable(fee)?;

        let mut init_point = self.checkout_base_url.clone();
        init_point
            .query_pairs_mut()
            .append_pair("fee_id", &fee.id.to_string())
            .append_pair("amount", &fee.amount.to_string());

        tracing::info!("Dummy provider created checkout for fee {}", fee.id);
        Ok(PaymentPreference {
            init_point: init_point.to_string(),
            qr_code_base64: placeholder_qr_base64(),
        })
    }

    async fn validate_webhook(&self, _headers: &axum::http::HeaderMap, _body: &str) -> Result<Option<WebhookEvent>> {
        // Dummy provider doesn't use webhooks
        Ok(None)
    }

    async fn process_webhook_event(&self, _event: &WebhookEvent) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment_providers::test_support::sample_fee;

    #[tokio::test]
    async fn test_dummy_checkout_url_carries_fee() {
        let provider = DummyProvider::from(DummyConfig::default());
        let fee = sample_fee();

        let preference = provider.create_payment_preference(&fee).await.unwrap();
        let url = Url::parse(&preference.init_point).unwrap();
        let query: std::collections::HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(query.get("fee_id").map(|v| v.to_string()), Some(fee.id.to_string()));
        assert_eq!(query.get("amount").map(|v| v.to_string()), Some("1500.00".to_string()));
    }

    #[tokio::test]
    async fn test_dummy_webhook_not_supported() {
        let provider = DummyProvider::from(DummyConfig::default());
        let result = provider.validate_webhook(&axum::http::HeaderMap::new(), "{}").await;
        assert_eq!(result.unwrap(), None);
    }
}
