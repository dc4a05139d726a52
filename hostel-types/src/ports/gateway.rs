//! Payment gateway port.

use crate::domain::{GatewayOrder, GatewayOrderRequest, GatewayRefund, GatewayRefundRequest};

/// Errors from a payment gateway adapter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    /// The gateway understood the request and refused it.
    #[error("Gateway rejected the request: {0}")]
    Rejected(String),

    #[error("Gateway unreachable: {0}")]
    Transport(String),

    #[error("Unexpected gateway response: {0}")]
    InvalidResponse(String),

    #[error("Gateway is not configured: {0}")]
    NotConfigured(String),
}

/// An online payment provider (Razorpay-style orders API).
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Short provider name for logs and responses.
    fn provider(&self) -> &'static str;

    /// Public key id the checkout widget needs, if any.
    fn key_id(&self) -> Option<String>;

    async fn create_order(&self, req: GatewayOrderRequest) -> Result<GatewayOrder, GatewayError>;

    async fn refund(&self, req: GatewayRefundRequest) -> Result<GatewayRefund, GatewayError>;

    /// Checks the checkout signature over `order_id|payment_id`.
    fn verify_payment_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;

    /// Checks the signature over a raw webhook body.
    fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool;
}
