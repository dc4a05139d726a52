//! Outbox delivery worker.
//!
//! Polls `webhook_events` for pending rows, POSTs the signed envelope to the
//! endpoint and records the outcome. Failed deliveries go back to `pending`
//! until the attempt budget is spent.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use hostel_types::domain::MAX_DELIVERY_ATTEMPTS;
use hostel_types::{HostelRepository, RepoError, WebhookEndpoint, WebhookEvent, WebhookStatus};

use crate::security::sign_payload;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const EVENT_HEADER: &str = "X-Webhook-Event";

const BATCH_SIZE: i64 = 10;

pub struct WebhookWorker<R> {
    repo: Arc<R>,
    client: reqwest::Client,
    poll_interval: Duration,
}

impl<R: HostelRepository> WebhookWorker<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            repo,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[instrument(skip(self))]
    pub async fn run(self) {
        info!(interval_ms = self.poll_interval.as_millis() as u64, "Starting webhook worker");
        loop {
            if let Err(e) = self.run_once().await {
                error!("Failed to fetch webhooks: {}", e);
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Delivers one batch of pending events. Returns how many were attempted.
    pub async fn run_once(&self) -> Result<usize, RepoError> {
        let batch = self.repo.get_pending_webhooks(BATCH_SIZE).await?;
        if !batch.is_empty() {
            info!("Processing {} pending webhooks", batch.len());
        }
        let count = batch.len();
        for (event, endpoint) in batch {
            self.deliver(event, endpoint).await;
        }
        Ok(count)
    }

    #[instrument(skip(self, event, endpoint), fields(event_id = %event.id, event_type = %event.event_type))]
    async fn deliver(&self, event: WebhookEvent, endpoint: WebhookEndpoint) {
        let (status, last_error) = match self.send(&event, &endpoint).await {
            Ok(()) => (WebhookStatus::Completed, None),
            Err(reason) if event.attempts + 1 < MAX_DELIVERY_ATTEMPTS => {
                warn!(attempt = event.attempts + 1, %reason, "Webhook delivery failed, will retry");
                (WebhookStatus::Pending, Some(reason))
            }
            Err(reason) => {
                error!(attempts = event.attempts + 1, %reason, "Webhook delivery failed permanently");
                (WebhookStatus::Failed, Some(reason))
            }
        };

        if let Err(e) = self
            .repo
            .update_webhook_status(event.id, status, last_error)
            .await
        {
            error!("Failed to update webhook status: {}", e);
        }
    }

    async fn send(&self, event: &WebhookEvent, endpoint: &WebhookEndpoint) -> Result<(), String> {
        let body = serde_json::to_vec(&event.envelope()).map_err(|e| e.to_string())?;
        let signature = sign_payload(&body, &endpoint.secret);

        let response = self
            .client
            .post(&endpoint.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(EVENT_HEADER, event.event_type.as_str())
            .body(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if response.status().is_success() {
            info!(url = %endpoint.url, "Webhook delivered");
            Ok(())
        } else {
            Err(format!("HTTP {}", response.status()))
        }
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::SqliteRepo;
    use crate::security::verify_signature;
    use hostel_types::{DomainEvent, EventType, UnitOfWork};
    use serde_json::json;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET: &str = "whsec_test_0123456789";

    async fn setup(server: &MockServer) -> Arc<SqliteRepo> {
        let repo = Arc::new(SqliteRepo::new("sqlite::memory:").await.unwrap());
        let endpoint = WebhookEndpoint::new(
            format!("{}/hooks", server.uri()),
            SECRET.to_string(),
            vec![EventType::PaymentCompleted],
        )
        .unwrap();
        repo.create_webhook_endpoint(&endpoint).await.unwrap();

        let mut uow = UnitOfWork::new();
        uow.emit(DomainEvent::new(EventType::PaymentCompleted, &json!({"amount": "100.00"})).unwrap());
        // not subscribed, must not be queued
        uow.emit(DomainEvent::new(EventType::PaymentCreated, &json!({})).unwrap());
        repo.commit(uow).await.unwrap();
        repo
    }

    #[tokio::test]
    async fn test_delivers_signed_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks"))
            .and(header_exists(SIGNATURE_HEADER))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let repo = setup(&server).await;
        let worker = WebhookWorker::new(repo.clone());
        assert_eq!(worker.run_once().await.unwrap(), 1);
        assert_eq!(worker.run_once().await.unwrap(), 0);

        let requests = server.received_requests().await.unwrap();
        let request = &requests[0];
        let signature = request.headers.get(SIGNATURE_HEADER).unwrap().to_str().unwrap();
        assert!(verify_signature(&request.body, signature, SECRET));

        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body["event"], "payment.completed");
        assert_eq!(body["data"]["amount"], "100.00");
    }

    #[tokio::test]
    async fn test_failed_delivery_retries_then_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let repo = setup(&server).await;
        let worker = WebhookWorker::new(repo.clone());

        for _ in 0..MAX_DELIVERY_ATTEMPTS {
            assert_eq!(worker.run_once().await.unwrap(), 1);
        }
        assert_eq!(worker.run_once().await.unwrap(), 0);
        assert_eq!(
            server.received_requests().await.unwrap().len(),
            MAX_DELIVERY_ATTEMPTS as usize
        );
    }
}
