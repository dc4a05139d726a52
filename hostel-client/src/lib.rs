//! # Hostel Client SDK
//!
//! A typed Rust client for the hostel payments API.
//!
//! ```ignore
//! let client = HostelClient::new("http://localhost:3000").with_api_key("sk_...");
//! let hostels = client.list_hostels().await?;
//! ```

use std::fmt;

use chrono::NaiveDate;
use reqwest::{Client, Method, RequestBuilder};
use serde::{Serialize, de::DeserializeOwned};

use hostel_types::{
    ApiKeyCreatedResponse, ApiKeyId, ApiKeyInfo, AsOfQuery, Booking, BookingId, BootstrapRequest,
    CheckoutResponse, CreateApiKeyRequest, CreateBookingRequest, CreateHostelRequest,
    CreatePaymentRequest, CreateRefundRequest, CreateScheduleRequest, DispatchRemindersRequest,
    DispatchRemindersResponse, GenerateDueRequest, GenerateDueResponse, Hostel, HostelId, Ledger,
    LedgerQuery, ManualPaymentRequest, OverduePayment, OverdueReport, Payment, PaymentId,
    PaymentListQuery, PaymentSchedule, PaymentSummary, ProcessedRefundResponse, Refund, RefundId,
    RegisterWebhookRequest, RejectRefundRequest, Reminder, RequestAdvanceRequest, ScheduleId,
    SummaryQuery, UpdatePaymentStatusRequest, VerifyCheckoutRequest, WebhookResponse,
};

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// HTTP status of an API error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Booking lifecycle actions, as they appear in the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    Approve,
    Reject,
    Confirm,
    CheckIn,
    CheckOut,
    Cancel,
}

impl BookingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingAction::Approve => "approve",
            BookingAction::Reject => "reject",
            BookingAction::Confirm => "confirm",
            BookingAction::CheckIn => "check-in",
            BookingAction::CheckOut => "check-out",
            BookingAction::Cancel => "cancel",
        }
    }
}

impl fmt::Display for BookingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schedule lifecycle actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleAction {
    Pause,
    Resume,
    Cancel,
}

impl ScheduleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleAction::Pause => "pause",
            ScheduleAction::Resume => "resume",
            ScheduleAction::Cancel => "cancel",
        }
    }
}

/// Hostel payments API client.
pub struct HostelClient {
    base_url: String,
    api_key: Option<String>,
    http: Client,
}

impl HostelClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            http: Client::new(),
        }
    }

    /// Sets the API key sent as a bearer token.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Checks if the API is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    // ── access ──────────────────────────────────────────────────────────────

    /// Issues the first (global) API key. Needs no key.
    pub async fn bootstrap(&self, name: &str) -> Result<ApiKeyCreatedResponse, ClientError> {
        let req = BootstrapRequest {
            name: name.to_string(),
        };
        self.send(Method::POST, "/api/bootstrap", Some(&req)).await
    }

    pub async fn create_api_key(
        &self,
        name: &str,
        hostel_id: Option<HostelId>,
    ) -> Result<ApiKeyCreatedResponse, ClientError> {
        let req = CreateApiKeyRequest {
            name: name.to_string(),
            hostel_id,
        };
        self.send(Method::POST, "/api/keys", Some(&req)).await
    }

    pub async fn list_api_keys(&self) -> Result<Vec<ApiKeyInfo>, ClientError> {
        self.get("/api/keys").await
    }

    pub async fn delete_api_key(&self, id: ApiKeyId) -> Result<(), ClientError> {
        self.send_empty(Method::DELETE, &format!("/api/keys/{}", id)).await
    }

    pub async fn register_webhook(
        &self,
        req: &RegisterWebhookRequest,
    ) -> Result<WebhookResponse, ClientError> {
        self.send(Method::POST, "/api/webhooks", Some(req)).await
    }

    pub async fn list_webhooks(&self) -> Result<Vec<WebhookResponse>, ClientError> {
        self.get("/api/webhooks").await
    }

    // ── hostels ─────────────────────────────────────────────────────────────

    pub async fn create_hostel(&self, req: &CreateHostelRequest) -> Result<Hostel, ClientError> {
        self.send(Method::POST, "/api/hostels", Some(req)).await
    }

    pub async fn list_hostels(&self) -> Result<Vec<Hostel>, ClientError> {
        self.get("/api/hostels").await
    }

    pub async fn get_hostel(&self, id: HostelId) -> Result<Hostel, ClientError> {
        self.get(&format!("/api/hostels/{}", id)).await
    }

    pub async fn list_bookings(&self, hostel_id: HostelId) -> Result<Vec<Booking>, ClientError> {
        self.get(&format!("/api/hostels/{}/bookings", hostel_id)).await
    }

    /// Overdue payments of a hostel, most overdue first.
    pub async fn list_overdue(
        &self,
        hostel_id: HostelId,
        today: Option<NaiveDate>,
    ) -> Result<Vec<OverduePayment>, ClientError> {
        self.get_query(
            &format!("/api/hostels/{}/payments/overdue", hostel_id),
            &AsOfQuery { today },
        )
        .await
    }

    pub async fn list_schedules(
        &self,
        hostel_id: HostelId,
    ) -> Result<Vec<PaymentSchedule>, ClientError> {
        self.get(&format!("/api/hostels/{}/schedules", hostel_id)).await
    }

    pub async fn ledger(&self, hostel_id: HostelId, query: &LedgerQuery) -> Result<Ledger, ClientError> {
        self.get_query(&format!("/api/hostels/{}/ledger", hostel_id), query)
            .await
    }

    pub async fn summary(
        &self,
        hostel_id: HostelId,
        query: &SummaryQuery,
    ) -> Result<PaymentSummary, ClientError> {
        self.get_query(&format!("/api/hostels/{}/reports/summary", hostel_id), query)
            .await
    }

    pub async fn overdue_report(
        &self,
        hostel_id: HostelId,
        today: Option<NaiveDate>,
    ) -> Result<OverdueReport, ClientError> {
        self.get_query(
            &format!("/api/hostels/{}/reports/overdue", hostel_id),
            &AsOfQuery { today },
        )
        .await
    }

    // ── bookings ────────────────────────────────────────────────────────────

    pub async fn create_booking(&self, req: &CreateBookingRequest) -> Result<Booking, ClientError> {
        self.send(Method::POST, "/api/bookings", Some(req)).await
    }

    pub async fn get_booking(&self, id: BookingId) -> Result<Booking, ClientError> {
        self.get(&format!("/api/bookings/{}", id)).await
    }

    pub async fn booking_action(
        &self,
        id: BookingId,
        action: BookingAction,
    ) -> Result<Booking, ClientError> {
        self.send::<_, ()>(Method::POST, &format!("/api/bookings/{}/{}", id, action), None)
            .await
    }

    /// Requests the booking advance; returns the open advance if one exists.
    pub async fn request_advance(
        &self,
        id: BookingId,
        req: &RequestAdvanceRequest,
    ) -> Result<Payment, ClientError> {
        self.send(Method::POST, &format!("/api/bookings/{}/advance", id), Some(req))
            .await
    }

    // ── payments ────────────────────────────────────────────────────────────

    pub async fn create_payment(&self, req: &CreatePaymentRequest) -> Result<Payment, ClientError> {
        self.send(Method::POST, "/api/payments", Some(req)).await
    }

    pub async fn list_payments(&self, query: &PaymentListQuery) -> Result<Vec<Payment>, ClientError> {
        self.get_query("/api/payments", query).await
    }

    pub async fn get_payment(&self, id: PaymentId) -> Result<Payment, ClientError> {
        self.get(&format!("/api/payments/{}", id)).await
    }

    pub async fn record_manual_payment(
        &self,
        req: &ManualPaymentRequest,
    ) -> Result<Payment, ClientError> {
        self.send(Method::POST, "/api/payments/manual", Some(req)).await
    }

    pub async fn update_payment_status(
        &self,
        id: PaymentId,
        req: &UpdatePaymentStatusRequest,
    ) -> Result<Payment, ClientError> {
        self.send(Method::POST, &format!("/api/payments/{}/status", id), Some(req))
            .await
    }

    pub async fn checkout(&self, id: PaymentId) -> Result<CheckoutResponse, ClientError> {
        self.send::<_, ()>(Method::POST, &format!("/api/payments/{}/checkout", id), None)
            .await
    }

    pub async fn verify_checkout(&self, req: &VerifyCheckoutRequest) -> Result<Payment, ClientError> {
        self.send(Method::POST, "/api/payments/verify", Some(req)).await
    }

    pub async fn list_reminders(&self, id: PaymentId) -> Result<Vec<Reminder>, ClientError> {
        self.get(&format!("/api/payments/{}/reminders", id)).await
    }

    // ── refunds ─────────────────────────────────────────────────────────────

    pub async fn request_refund(
        &self,
        payment_id: PaymentId,
        req: &CreateRefundRequest,
    ) -> Result<Refund, ClientError> {
        self.send(
            Method::POST,
            &format!("/api/payments/{}/refunds", payment_id),
            Some(req),
        )
        .await
    }

    pub async fn list_refunds(&self, payment_id: PaymentId) -> Result<Vec<Refund>, ClientError> {
        self.get(&format!("/api/payments/{}/refunds", payment_id)).await
    }

    pub async fn process_refund(&self, id: RefundId) -> Result<ProcessedRefundResponse, ClientError> {
        self.send::<_, ()>(Method::POST, &format!("/api/refunds/{}/process", id), None)
            .await
    }

    pub async fn reject_refund(&self, id: RefundId, reason: &str) -> Result<Refund, ClientError> {
        let req = RejectRefundRequest {
            reason: reason.to_string(),
        };
        self.send(Method::POST, &format!("/api/refunds/{}/reject", id), Some(&req))
            .await
    }

    // ── schedules & reminders ───────────────────────────────────────────────

    pub async fn create_schedule(
        &self,
        req: &CreateScheduleRequest,
    ) -> Result<PaymentSchedule, ClientError> {
        self.send(Method::POST, "/api/schedules", Some(req)).await
    }

    pub async fn get_schedule(&self, id: ScheduleId) -> Result<PaymentSchedule, ClientError> {
        self.get(&format!("/api/schedules/{}", id)).await
    }

    /// Pauses, resumes or cancels a schedule. `today` only matters for resume.
    pub async fn schedule_action(
        &self,
        id: ScheduleId,
        action: ScheduleAction,
        today: Option<NaiveDate>,
    ) -> Result<PaymentSchedule, ClientError> {
        self.send(
            Method::POST,
            &format!("/api/schedules/{}/{}", id, action.as_str()),
            Some(&AsOfQuery { today }),
        )
        .await
    }

    pub async fn generate_due(&self, req: &GenerateDueRequest) -> Result<GenerateDueResponse, ClientError> {
        self.send(Method::POST, "/api/schedules/generate", Some(req)).await
    }

    pub async fn dispatch_reminders(
        &self,
        req: &DispatchRemindersRequest,
    ) -> Result<DispatchRemindersResponse, ClientError> {
        self.send(Method::POST, "/api/reminders/dispatch", Some(req)).await
    }

    // ── plumbing ────────────────────────────────────────────────────────────

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.request(Method::GET, path).send().await?;
        Self::handle_response(resp).await
    }

    async fn get_query<T: DeserializeOwned, Q: Serialize>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T, ClientError> {
        let resp = self.request(Method::GET, path).query(query).send().await?;
        Self::handle_response(resp).await
    }

    async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError> {
        let mut req = self.request(method, path);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        Self::handle_response(resp).await
    }

    async fn send_empty(&self, method: Method, path: &str) -> Result<(), ClientError> {
        let resp = self.request(method, path).send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::api_error(status, resp).await)
        }
    }

    async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            Err(Self::api_error(status, resp).await)
        }
    }

    async fn api_error(status: reqwest::StatusCode, resp: reqwest::Response) -> ClientError {
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or(body);
        ClientError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_client_creation() {
        let client = HostelClient::new("http://localhost:3000");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_client_with_trailing_slash() {
        let client = HostelClient::new("http://localhost:3000/");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn booking_actions_use_url_spelling() {
        assert_eq!(BookingAction::CheckIn.to_string(), "check-in");
        assert_eq!(BookingAction::CheckOut.as_str(), "check-out");
    }

    #[tokio::test]
    async fn sends_bearer_key_and_decodes_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/hostels"))
            .and(header("Authorization", "Bearer sk_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = HostelClient::new(server.uri()).with_api_key("sk_test");
        let hostels = client.list_hostels().await.unwrap();
        assert!(hostels.is_empty());
    }

    #[tokio::test]
    async fn surfaces_api_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/keys"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(json!({"error": "Key is scoped to a hostel", "code": 403})),
            )
            .mount(&server)
            .await;

        let client = HostelClient::new(server.uri()).with_api_key("sk_scoped");
        let err = client.list_api_keys().await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("scoped"));
    }

    #[tokio::test]
    async fn overdue_passes_reference_date() {
        let server = MockServer::start().await;
        let hostel_id = HostelId::new();
        Mock::given(method("GET"))
            .and(path(format!("/api/hostels/{}/payments/overdue", hostel_id)))
            .and(query_param("today", "2026-03-11"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = HostelClient::new(server.uri()).with_api_key("sk_test");
        let overdue = client
            .list_overdue(hostel_id, NaiveDate::from_ymd_opt(2026, 3, 11))
            .await
            .unwrap();
        assert!(overdue.is_empty());
    }

    #[tokio::test]
    async fn delete_accepts_no_content() {
        let server = MockServer::start().await;
        let id = ApiKeyId::new();
        Mock::given(method("DELETE"))
            .and(path(format!("/api/keys/{}", id)))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = HostelClient::new(server.uri()).with_api_key("sk_test");
        client.delete_api_key(id).await.unwrap();
    }
}
