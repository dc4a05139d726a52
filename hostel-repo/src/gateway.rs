//! Payment gateway adapters.
//!
//! `HttpGateway` speaks a Razorpay-style orders API; `SandboxGateway` mints
//! ids locally and signs with the same scheme so the checkout and webhook
//! flows can be exercised without a provider account.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use hostel_types::domain::{GatewayOrder, GatewayOrderRequest, GatewayRefund, GatewayRefundRequest};
use hostel_types::{Currency, GatewayError, PaymentGateway};

use crate::security::{checkout_payload, sign_payload, verify_signature};

/// Which gateway adapter to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatewayMode {
    #[default]
    Sandbox,
    Http,
}

impl FromStr for GatewayMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sandbox" => Ok(GatewayMode::Sandbox),
            "http" | "razorpay" => Ok(GatewayMode::Http),
            other => anyhow::bail!("Unknown GATEWAY_MODE '{other}' (expected sandbox or http)"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub mode: GatewayMode,
    pub base_url: Option<String>,
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
    pub webhook_secret: Option<String>,
}

const SANDBOX_KEY_ID: &str = "rzp_sandbox";
const SANDBOX_KEY_SECRET: &str = "sandbox_key_secret";
const SANDBOX_WEBHOOK_SECRET: &str = "sandbox_webhook_secret";

/// Builds the configured gateway adapter.
pub fn build_gateway(config: &GatewayConfig) -> anyhow::Result<Gateway> {
    match config.mode {
        GatewayMode::Sandbox => Ok(Gateway::Sandbox(SandboxGateway::new(
            config.key_secret.as_deref().unwrap_or(SANDBOX_KEY_SECRET),
            config
                .webhook_secret
                .as_deref()
                .unwrap_or(SANDBOX_WEBHOOK_SECRET),
        ))),
        GatewayMode::Http => {
            let (Some(base_url), Some(key_id), Some(key_secret), Some(webhook_secret)) = (
                config.base_url.as_deref(),
                config.key_id.as_deref(),
                config.key_secret.as_deref(),
                config.webhook_secret.as_deref(),
            ) else {
                anyhow::bail!(
                    "GATEWAY_MODE=http requires GATEWAY_BASE_URL, GATEWAY_KEY_ID, \
                     GATEWAY_KEY_SECRET and GATEWAY_WEBHOOK_SECRET"
                );
            };
            Ok(Gateway::Http(HttpGateway::new(
                base_url,
                key_id,
                key_secret,
                webhook_secret,
            )))
        }
    }
}

/// Gateway chosen at startup.
pub enum Gateway {
    Sandbox(SandboxGateway),
    Http(HttpGateway),
}

#[async_trait]
impl PaymentGateway for Gateway {
    fn provider(&self) -> &'static str {
        match self {
            Gateway::Sandbox(g) => g.provider(),
            Gateway::Http(g) => g.provider(),
        }
    }

    fn key_id(&self) -> Option<String> {
        match self {
            Gateway::Sandbox(g) => g.key_id(),
            Gateway::Http(g) => g.key_id(),
        }
    }

    async fn create_order(&self, req: GatewayOrderRequest) -> Result<GatewayOrder, GatewayError> {
        match self {
            Gateway::Sandbox(g) => g.create_order(req).await,
            Gateway::Http(g) => g.create_order(req).await,
        }
    }

    async fn refund(&self, req: GatewayRefundRequest) -> Result<GatewayRefund, GatewayError> {
        match self {
            Gateway::Sandbox(g) => g.refund(req).await,
            Gateway::Http(g) => g.refund(req).await,
        }
    }

    fn verify_payment_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        match self {
            Gateway::Sandbox(g) => g.verify_payment_signature(order_id, payment_id, signature),
            Gateway::Http(g) => g.verify_payment_signature(order_id, payment_id, signature),
        }
    }

    fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool {
        match self {
            Gateway::Sandbox(g) => g.verify_webhook_signature(body, signature),
            Gateway::Http(g) => g.verify_webhook_signature(body, signature),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sandbox
// ─────────────────────────────────────────────────────────────────────────────

/// Local gateway that never leaves the process.
#[derive(Debug, Clone)]
pub struct SandboxGateway {
    key_secret: String,
    webhook_secret: String,
}

impl Default for SandboxGateway {
    fn default() -> Self {
        Self::new(SANDBOX_KEY_SECRET, SANDBOX_WEBHOOK_SECRET)
    }
}

impl SandboxGateway {
    pub fn new(key_secret: &str, webhook_secret: &str) -> Self {
        Self {
            key_secret: key_secret.to_string(),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    /// Signature a real checkout widget would hand back.
    pub fn sign_checkout(&self, order_id: &str, payment_id: &str) -> String {
        sign_payload(checkout_payload(order_id, payment_id).as_bytes(), &self.key_secret)
    }

    /// Signature a real gateway would put on a webhook body.
    pub fn sign_webhook(&self, body: &[u8]) -> String {
        sign_payload(body, &self.webhook_secret)
    }

    fn sandbox_id(prefix: &str) -> String {
        let bytes: [u8; 7] = rand::random();
        format!("{prefix}_sbx_{}", hex::encode(bytes))
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    fn provider(&self) -> &'static str {
        "sandbox"
    }

    fn key_id(&self) -> Option<String> {
        Some(SANDBOX_KEY_ID.to_string())
    }

    async fn create_order(&self, req: GatewayOrderRequest) -> Result<GatewayOrder, GatewayError> {
        if req.amount_minor <= 0 {
            return Err(GatewayError::Rejected(
                "Order amount must be positive".to_string(),
            ));
        }
        let order = GatewayOrder {
            order_id: Self::sandbox_id("order"),
            amount_minor: req.amount_minor,
            currency: req.currency,
            status: "created".to_string(),
        };
        tracing::info!(order_id = %order.order_id, receipt = %req.receipt, "Sandbox order created");
        Ok(order)
    }

    async fn refund(&self, req: GatewayRefundRequest) -> Result<GatewayRefund, GatewayError> {
        if req.amount_minor <= 0 {
            return Err(GatewayError::Rejected(
                "Refund amount must be positive".to_string(),
            ));
        }
        Ok(GatewayRefund {
            refund_id: Self::sandbox_id("rfnd"),
            amount_minor: req.amount_minor,
            status: "processed".to_string(),
        })
    }

    fn verify_payment_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_signature(
            checkout_payload(order_id, payment_id).as_bytes(),
            signature,
            &self.key_secret,
        )
    }

    fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool {
        verify_signature(body, signature, &self.webhook_secret)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP (Razorpay-style)
// ─────────────────────────────────────────────────────────────────────────────

/// Client for a Razorpay-compatible REST API.
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
    webhook_secret: String,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: Currency,
    receipt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
    currency: Currency,
    status: String,
}

#[derive(Debug, Serialize)]
struct RefundBody<'a> {
    amount: i64,
    receipt: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
    amount: i64,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    description: String,
}

impl HttpGateway {
    pub fn new(base_url: &str, key_id: &str, key_secret: &str, webhook_secret: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    async fn post<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        tracing::debug!(%status, %url, "Gateway response");

        if status.is_success() {
            return serde_json::from_str(&text)
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()));
        }

        let message = serde_json::from_str::<ErrorResponse>(&text)
            .map(|e| match e.error.code {
                Some(code) => format!("{code}: {}", e.error.description),
                None => e.error.description,
            })
            .unwrap_or_else(|_| format!("HTTP {status}"));

        if status.is_client_error() {
            Err(GatewayError::Rejected(message))
        } else {
            Err(GatewayError::Transport(message))
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    fn provider(&self) -> &'static str {
        "razorpay"
    }

    fn key_id(&self) -> Option<String> {
        Some(self.key_id.clone())
    }

    async fn create_order(&self, req: GatewayOrderRequest) -> Result<GatewayOrder, GatewayError> {
        let body = CreateOrderBody {
            amount: req.amount_minor,
            currency: req.currency,
            receipt: &req.receipt,
            notes: req.notes.as_ref(),
        };
        let order: OrderResponse = self.post("/orders", &body).await?;

        tracing::info!(
            order_id = %order.id,
            amount = order.amount,
            currency = %order.currency,
            "Gateway order created"
        );

        Ok(GatewayOrder {
            order_id: order.id,
            amount_minor: order.amount,
            currency: order.currency,
            status: order.status,
        })
    }

    async fn refund(&self, req: GatewayRefundRequest) -> Result<GatewayRefund, GatewayError> {
        let body = RefundBody {
            amount: req.amount_minor,
            receipt: &req.receipt,
        };
        let path = format!("/payments/{}/refund", req.gateway_payment_id);
        let refund: RefundResponse = self.post(&path, &body).await?;

        Ok(GatewayRefund {
            refund_id: refund.id,
            amount_minor: refund.amount,
            status: refund.status,
        })
    }

    fn verify_payment_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_signature(
            checkout_payload(order_id, payment_id).as_bytes(),
            signature,
            &self.key_secret,
        )
    }

    fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool {
        verify_signature(body, signature, &self.webhook_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn order_request(amount_minor: i64) -> GatewayOrderRequest {
        GatewayOrderRequest {
            amount_minor,
            currency: Currency::INR,
            receipt: "pay_receipt_1".to_string(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_sandbox_order_and_signatures() {
        let gateway = SandboxGateway::default();
        let order = gateway.create_order(order_request(850000)).await.unwrap();
        assert!(order.order_id.starts_with("order_sbx_"));
        assert_eq!(order.amount_minor, 850000);

        let signature = gateway.sign_checkout(&order.order_id, "pay_123");
        assert!(gateway.verify_payment_signature(&order.order_id, "pay_123", &signature));
        assert!(!gateway.verify_payment_signature(&order.order_id, "pay_999", &signature));

        let body = br#"{"event":"payment.captured"}"#;
        let signature = gateway.sign_webhook(body);
        assert!(gateway.verify_webhook_signature(body, &signature));
        assert!(!gateway.verify_webhook_signature(b"{}", &signature));
    }

    #[tokio::test]
    async fn test_sandbox_rejects_non_positive_amounts() {
        let gateway = SandboxGateway::default();
        assert!(matches!(
            gateway.create_order(order_request(0)).await,
            Err(GatewayError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_http_gateway_creates_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(header_exists("authorization"))
            .and(body_partial_json(json!({"amount": 850000, "currency": "INR"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "order_Lx1",
                "entity": "order",
                "amount": 850000,
                "currency": "INR",
                "status": "created"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = HttpGateway::new(&server.uri(), "rzp_test", "secret", "whsec");
        let order = gateway.create_order(order_request(850000)).await.unwrap();
        assert_eq!(order.order_id, "order_Lx1");
        assert_eq!(order.currency, Currency::INR);
    }

    #[tokio::test]
    async fn test_http_gateway_maps_client_errors_to_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payments/pay_1/refund"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": "BAD_REQUEST_ERROR", "description": "The amount is invalid"}
            })))
            .mount(&server)
            .await;

        let gateway = HttpGateway::new(&server.uri(), "rzp_test", "secret", "whsec");
        let err = gateway
            .refund(GatewayRefundRequest {
                gateway_payment_id: "pay_1".to_string(),
                amount_minor: 100,
                receipt: "rf_1".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::Rejected("BAD_REQUEST_ERROR: The amount is invalid".to_string())
        );
    }

    #[tokio::test]
    async fn test_http_gateway_server_errors_are_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let gateway = HttpGateway::new(&server.uri(), "rzp_test", "secret", "whsec");
        assert!(matches!(
            gateway.create_order(order_request(100)).await,
            Err(GatewayError::Transport(_))
        ));
    }

    #[test]
    fn test_http_mode_requires_credentials() {
        let config = GatewayConfig {
            mode: GatewayMode::Http,
            base_url: Some("https://api.razorpay.com/v1".into()),
            ..Default::default()
        };
        assert!(build_gateway(&config).is_err());
        assert_eq!("SANDBOX".parse::<GatewayMode>().unwrap(), GatewayMode::Sandbox);
    }
}
