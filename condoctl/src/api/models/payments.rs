//! API models for the payment gateway integration.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::payment_providers::PaymentPreference;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionData {
    /// Base64-encoded PNG of the QR code to scan
    pub qr_code_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PointOfInteraction {
    pub transaction_data: TransactionData,
}

/// Checkout information for paying a fee through the gateway
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentPreferenceResponse {
    /// URL the payer is redirected to
    pub init_point: String,
    pub point_of_interaction: PointOfInteraction,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

impl From<PaymentPreference> for PaymentPreferenceResponse {
    fn from(preference: PaymentPreference) -> Self {
        Self {
            init_point: preference.init_point,
            point_of_interaction: PointOfInteraction {
                transaction_data: TransactionData {
                    qr_code_base64: preference.qr_code_base64,
                },
            },
        }
    }
}
