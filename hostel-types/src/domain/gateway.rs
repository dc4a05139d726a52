//! Payment gateway messages.
//!
//! Amounts crossing the gateway boundary are integers in minor units
//! (paise / cents).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::money::Currency;
use crate::error::DomainError;

/// Order creation request sent to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayOrderRequest {
    pub amount_minor: i64,
    pub currency: Currency,
    /// Our reference for the order (the payment id)
    pub receipt: String,
    pub notes: Option<serde_json::Value>,
}

/// An order as the gateway reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GatewayOrder {
    pub order_id: String,
    pub amount_minor: i64,
    pub currency: Currency,
    pub status: String,
}

/// Refund request for a captured gateway payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayRefundRequest {
    pub gateway_payment_id: String,
    pub amount_minor: i64,
    pub receipt: String,
}

/// A refund as the gateway reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub refund_id: String,
    pub amount_minor: i64,
    pub status: String,
}

/// Asynchronous notification pushed by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GatewayWebhook {
    #[schema(example = "payment.captured")]
    pub event: String,
    #[serde(default)]
    pub payload: GatewayWebhookPayload,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GatewayWebhookPayload {
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub refund_id: Option<String>,
    /// Minor units
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub error_description: Option<String>,
}

/// What a gateway webhook means for us.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCallback {
    PaymentCaptured {
        order_id: String,
        gateway_payment_id: String,
        amount_minor: Option<i64>,
        currency: Option<Currency>,
    },
    PaymentFailed {
        order_id: String,
        gateway_payment_id: Option<String>,
        reason: String,
    },
    RefundProcessed {
        gateway_refund_id: String,
        gateway_payment_id: Option<String>,
    },
    Ignored {
        event: String,
    },
}

fn required(field: Option<String>, name: &str, event: &str) -> Result<String, DomainError> {
    field
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| DomainError::validation(format!("{event} webhook is missing {name}")))
}

impl TryFrom<GatewayWebhook> for GatewayCallback {
    type Error = DomainError;

    fn try_from(hook: GatewayWebhook) -> Result<Self, Self::Error> {
        let GatewayWebhook { event, payload } = hook;
        let callback = match event.as_str() {
            "payment.captured" | "order.paid" => GatewayCallback::PaymentCaptured {
                order_id: required(payload.order_id, "order_id", &event)?,
                gateway_payment_id: required(payload.payment_id, "payment_id", &event)?,
                amount_minor: payload.amount,
                currency: payload.currency.map(|c| c.parse()).transpose()?,
            },
            "payment.failed" => GatewayCallback::PaymentFailed {
                order_id: required(payload.order_id, "order_id", &event)?,
                gateway_payment_id: payload.payment_id,
                reason: payload
                    .error_description
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| "Payment failed at gateway".to_string()),
            },
            "refund.processed" => GatewayCallback::RefundProcessed {
                gateway_refund_id: required(payload.refund_id, "refund_id", &event)?,
                gateway_payment_id: payload.payment_id,
            },
            _ => GatewayCallback::Ignored { event },
        };
        Ok(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook(json: serde_json::Value) -> GatewayWebhook {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_captured_webhook_converts() {
        let callback = GatewayCallback::try_from(hook(serde_json::json!({
            "event": "payment.captured",
            "payload": {"order_id": "order_1", "payment_id": "pay_1", "amount": 850000, "currency": "inr"}
        })))
        .unwrap();
        assert_eq!(
            callback,
            GatewayCallback::PaymentCaptured {
                order_id: "order_1".into(),
                gateway_payment_id: "pay_1".into(),
                amount_minor: Some(850000),
                currency: Some(Currency::INR),
            }
        );
    }

    #[test]
    fn test_unknown_captured_currency_is_rejected() {
        let result = GatewayCallback::try_from(hook(serde_json::json!({
            "event": "payment.captured",
            "payload": {"order_id": "order_1", "payment_id": "pay_1", "currency": "XYZ"}
        })));
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[test]
    fn test_failed_webhook_defaults_reason() {
        let callback = GatewayCallback::try_from(hook(serde_json::json!({
            "event": "payment.failed",
            "payload": {"order_id": "order_1"}
        })))
        .unwrap();
        assert!(matches!(
            callback,
            GatewayCallback::PaymentFailed { reason, .. } if reason == "Payment failed at gateway"
        ));
    }

    #[test]
    fn test_missing_ids_are_rejected() {
        let result = GatewayCallback::try_from(hook(serde_json::json!({
            "event": "payment.captured",
            "payload": {"order_id": "order_1"}
        })));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_event_is_ignored() {
        let callback =
            GatewayCallback::try_from(hook(serde_json::json!({"event": "settlement.processed"})))
                .unwrap();
        assert_eq!(
            callback,
            GatewayCallback::Ignored {
                event: "settlement.processed".into()
            }
        );
    }
}
