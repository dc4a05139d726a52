//! Data Transfer Objects (DTOs) for requests and responses.
//!
//! Money travels as decimal strings (`"8500.00"`) so no precision is lost in
//! JSON. Dates are ISO 8601.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{
    ApiKeyId, BookingId, Currency, EventType, Frequency, GatewayOrder, HostelId, Payment,
    PaymentId, PaymentMethod, PaymentStatus, PaymentType, Refund, WebhookEndpointId,
};

// ─────────────────────────────────────────────────────────────────────────────
// API Key DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request for the first API key.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BootstrapRequest {
    /// Name for the API key
    #[schema(example = "admin")]
    pub name: String,
}

/// Request to create a new API key.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateApiKeyRequest {
    /// Name for the API key
    #[schema(example = "front-desk")]
    pub name: String,
    /// Restrict the key to one hostel; omit for a global key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostel_id: Option<HostelId>,
}

/// A freshly created key. The raw key is only ever shown here.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyCreatedResponse {
    pub id: ApiKeyId,
    /// The generated API key (shown only once)
    #[schema(example = "sk_abc123xyz...")]
    pub api_key: String,
    pub hostel_id: Option<HostelId>,
    /// Informational message
    pub message: String,
}

/// API key info (without the raw key).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyInfo {
    pub id: ApiKeyId,
    pub name: String,
    pub hostel_id: Option<HostelId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Webhook DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to register a webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterWebhookRequest {
    /// The URL to receive webhook notifications
    #[schema(example = "https://example.com/webhook")]
    pub url: String,
    /// Event types to subscribe to. If empty, subscribes to all events.
    #[serde(default)]
    #[schema(example = json!(["payment.completed", "refund.processed"]))]
    pub events: Vec<EventType>,
}

/// A registered webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookResponse {
    pub id: WebhookEndpointId,
    #[schema(example = "https://example.com/webhook")]
    pub url: String,
    /// Secret key for verifying webhook signatures (HMAC-SHA256); only returned on creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub events: Vec<EventType>,
    pub is_active: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Hostel DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create a hostel.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateHostelRequest {
    #[schema(example = "Green Park Boys Hostel")]
    pub name: String,
    #[serde(default = "default_currency")]
    pub currency: Currency,
}

fn default_currency() -> Currency {
    Currency::INR
}

// ─────────────────────────────────────────────────────────────────────────────
// Booking DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create a booking.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateBookingRequest {
    pub hostel_id: HostelId,
    pub student_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "double")]
    pub room_type: Option<String>,
    #[schema(example = "2026-07-01")]
    pub check_in_date: NaiveDate,
    #[schema(example = 6)]
    pub stay_duration_months: u32,
    #[schema(value_type = String, example = "8500.00")]
    pub quoted_rent_monthly: Decimal,
    #[serde(default)]
    #[schema(value_type = String, example = "10000.00")]
    pub security_deposit: Decimal,
    #[serde(default)]
    #[schema(value_type = String, example = "5000.00")]
    pub advance_amount: Decimal,
    /// Must equal rent x duration within 0.01; computed when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "51000.00")]
    pub total_amount: Option<Decimal>,
}

/// Request for the booking advance payment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RequestAdvanceRequest {
    /// Defaults to the check-in date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Defaults to `upi`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<PaymentMethod>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create a pending payment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    pub hostel_id: HostelId,
    pub payer_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,
    pub payment_type: PaymentType,
    #[schema(value_type = String, example = "8500.00")]
    pub amount: Decimal,
    /// Must match the hostel's currency when given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(default = "default_method")]
    pub method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Replaying a key returns the payment created the first time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

fn default_method() -> PaymentMethod {
    PaymentMethod::DEFAULT_DUE
}

/// Request to record money already received offline.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ManualPaymentRequest {
    pub hostel_id: HostelId,
    pub payer_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,
    pub payment_type: PaymentType,
    #[schema(value_type = String, example = "8500.00")]
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    /// Any method except `gateway`
    pub method: PaymentMethod,
    #[schema(example = "UTR1234567890")]
    pub transaction_reference: String,
    /// Defaults to now
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

/// Filters for listing payments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PaymentListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostel_id: Option<HostelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_to: Option<NaiveDate>,
}

/// Request to move a payment to a new status.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdatePaymentStatusRequest {
    /// `processing`, `completed` or `failed`
    pub status: PaymentStatus,
    /// Required for `processing`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_reference: Option<String>,
    /// Required for `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

/// An overdue payment with its age.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OverduePayment {
    #[serde(flatten)]
    pub payment: Payment,
    pub days_overdue: i64,
}

/// Open payments past their due date for one hostel.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OverdueReport {
    pub hostel_id: HostelId,
    pub currency: Currency,
    pub as_of: NaiveDate,
    pub count: usize,
    #[schema(value_type = String, example = "17000.00")]
    pub total_amount: Decimal,
    pub payments: Vec<OverduePayment>,
}

/// Gateway order handed to the payer's checkout.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutResponse {
    pub payment_id: PaymentId,
    pub order: GatewayOrder,
    /// Public gateway key for the checkout widget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

/// Checkout result posted back by the payer's browser.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyCheckoutRequest {
    #[schema(example = "order_sbx_1a2b3c")]
    pub order_id: String,
    #[schema(example = "pay_29QQoUBi66xm2f")]
    pub gateway_payment_id: String,
    /// hex HMAC-SHA256 of `order_id|gateway_payment_id`
    pub signature: String,
}

/// Outcome of a gateway webhook.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GatewayWebhookAck {
    /// `processed`, `duplicate` or `ignored`
    pub status: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Refund DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to refund part or all of a completed payment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateRefundRequest {
    #[schema(value_type = String, example = "2500.00")]
    pub amount: Decimal,
    #[schema(example = "Security deposit returned at checkout")]
    pub reason: String,
}

/// Request to reject a pending refund.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RejectRefundRequest {
    pub reason: String,
}

/// A processed refund together with the payment it applied to.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessedRefundResponse {
    pub refund: Refund,
    pub payment: Payment,
}

// ─────────────────────────────────────────────────────────────────────────────
// Ledger & Report DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Query for a hostel ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LedgerQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "0.00")]
    pub opening_balance: Option<Decimal>,
}

/// Query for a payment summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SummaryQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
    /// Reference date for overdue figures; defaults to today (UTC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today: Option<NaiveDate>,
}

/// Query carrying only a reference date.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AsOfQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today: Option<NaiveDate>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Schedule & Reminder DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create a recurring schedule.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateScheduleRequest {
    pub hostel_id: HostelId,
    pub payer_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<BookingId>,
    #[serde(default = "default_schedule_type")]
    pub payment_type: PaymentType,
    #[schema(value_type = String, example = "8500.00")]
    pub amount: Decimal,
    #[serde(default = "default_method")]
    pub method: PaymentMethod,
    #[serde(default = "default_frequency")]
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_schedule_type() -> PaymentType {
    PaymentType::Rent
}

fn default_frequency() -> Frequency {
    Frequency::Monthly
}

/// Request to generate payments that have fallen due.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct GenerateDueRequest {
    /// Defaults to today (UTC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDate>,
    /// Restrict to one hostel (required for hostel-scoped keys)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostel_id: Option<HostelId>,
}

/// Payments created by a generation run.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateDueResponse {
    pub as_of: NaiveDate,
    pub schedules_processed: usize,
    pub payments: Vec<Payment>,
}

/// Request to dispatch reminders.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DispatchRemindersRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostel_id: Option<HostelId>,
}

/// Reminders recorded by a dispatch run.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DispatchRemindersResponse {
    pub today: NaiveDate,
    pub reminders: Vec<crate::domain::Reminder>,
}
