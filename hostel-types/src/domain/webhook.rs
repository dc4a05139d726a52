//! Outbox events and the endpoints they are delivered to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::ids::WebhookEndpointId;
use crate::error::DomainError;

/// Delivery attempts before an event is left as failed.
pub const MAX_DELIVERY_ATTEMPTS: i32 = 5;

string_enum! {
    /// Delivery status of an outbox event.
    WebhookStatus {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
}

impl Default for WebhookStatus {
    fn default() -> Self {
        WebhookStatus::Pending
    }
}

string_enum! {
    /// Domain event names published to webhook endpoints.
    EventType {
        PaymentCreated => "payment.created",
        PaymentCompleted => "payment.completed",
        PaymentFailed => "payment.failed",
        PaymentRefunded => "payment.refunded",
        RefundProcessed => "refund.processed",
        BookingConfirmed => "booking.confirmed",
        PaymentReminder => "payment.reminder",
    }
}

/// Something that happened, before fan-out to endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    pub event_type: EventType,
    pub payload: serde_json::Value,
}

impl DomainEvent {
    pub fn new<T: Serialize>(event_type: EventType, payload: &T) -> Result<Self, DomainError> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| DomainError::validation(format!("Unserializable event payload: {e}")))?;
        Ok(Self {
            event_type,
            payload,
        })
    }

    /// One outbox row per active endpoint subscribed to this event.
    pub fn fan_out(&self, endpoints: &[WebhookEndpoint]) -> Vec<WebhookEvent> {
        endpoints
            .iter()
            .filter(|e| e.subscribes_to(self.event_type))
            .map(|e| WebhookEvent::new(e.id, self.event_type, self.payload.clone()))
            .collect()
    }
}

/// A registered receiver of outbox events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WebhookEndpoint {
    pub id: WebhookEndpointId,
    pub url: String,
    /// HMAC key for the `X-Webhook-Signature` header
    #[serde(skip_serializing)]
    pub secret: String,
    /// Subscribed events; empty means all
    pub events: Vec<EventType>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl WebhookEndpoint {
    pub fn new(url: String, secret: String, events: Vec<EventType>) -> Result<Self, DomainError> {
        let url = url.trim().to_string();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(DomainError::validation(
                "Webhook url must start with http:// or https://",
            ));
        }
        if secret.len() < 16 {
            return Err(DomainError::validation(
                "Webhook secret must be at least 16 characters",
            ));
        }
        Ok(Self {
            id: WebhookEndpointId::new(),
            url,
            secret,
            events,
            is_active: true,
            created_at: Utc::now(),
        })
    }

    pub fn subscribes_to(&self, event_type: EventType) -> bool {
        self.is_active && (self.events.is_empty() || self.events.contains(&event_type))
    }
}

/// An outbox row awaiting delivery to one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub endpoint_id: WebhookEndpointId,
    pub event_type: EventType,
    pub payload: serde_json::Value,
    pub status: WebhookStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub last_error: Option<String>,
}

impl WebhookEvent {
    pub fn new(
        endpoint_id: WebhookEndpointId,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint_id,
            event_type,
            payload,
            status: WebhookStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
            attempts: 0,
            last_error: None,
        }
    }

    /// JSON body POSTed to the endpoint.
    pub fn envelope(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "event": self.event_type,
            "created_at": self.created_at,
            "data": self.payload,
        })
    }

    /// Whether a failed delivery should go back in the queue.
    pub fn can_retry(&self) -> bool {
        self.attempts < MAX_DELIVERY_ATTEMPTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(events: Vec<EventType>) -> WebhookEndpoint {
        WebhookEndpoint::new(
            "https://example.com/hooks".into(),
            "whsec_0123456789abcdef".into(),
            events,
        )
        .unwrap()
    }

    #[test]
    fn test_fan_out_respects_subscriptions() {
        let all = endpoint(vec![]);
        let payments_only = endpoint(vec![EventType::PaymentCompleted]);
        let mut inactive = endpoint(vec![]);
        inactive.is_active = false;

        let event = DomainEvent::new(
            EventType::RefundProcessed,
            &serde_json::json!({"refund_id": "r1"}),
        )
        .unwrap();
        let rows = event.fan_out(&[all.clone(), payments_only.clone(), inactive]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].endpoint_id, all.id);

        let completed = DomainEvent::new(EventType::PaymentCompleted, &serde_json::json!({}))
            .unwrap();
        assert_eq!(completed.fan_out(&[all, payments_only]).len(), 2);
    }

    #[test]
    fn test_endpoint_validation() {
        assert!(WebhookEndpoint::new("ftp://x".into(), "whsec_0123456789abcdef".into(), vec![]).is_err());
        assert!(WebhookEndpoint::new("https://x".into(), "short".into(), vec![]).is_err());
    }

    #[test]
    fn test_event_names_round_trip() {
        for event in EventType::ALL {
            assert_eq!(event.as_str().parse::<EventType>().unwrap(), *event);
        }
        assert_eq!(
            serde_json::to_value(EventType::PaymentReminder).unwrap(),
            "payment.reminder"
        );
    }

    #[test]
    fn test_retry_budget() {
        let mut event = WebhookEvent::new(
            WebhookEndpointId::new(),
            EventType::PaymentCreated,
            serde_json::json!({}),
        );
        event.attempts = MAX_DELIVERY_ATTEMPTS - 1;
        assert!(event.can_retry());
        event.attempts = MAX_DELIVERY_ATTEMPTS;
        assert!(!event.can_retry());
    }
}
