//! Repository port trait.
//!
//! This is the primary port in our hexagonal architecture.
//! Adapters (SQLite, Postgres) implement this trait.

use chrono::NaiveDate;
use uuid::Uuid;

use super::unit_of_work::UnitOfWork;
use crate::domain::{
    ApiKey, ApiKeyId, Booking, BookingId, Hostel, HostelId, Payment, PaymentId, PaymentSchedule,
    Refund, RefundId, Reminder, ScheduleId, WebhookEndpoint, WebhookEvent, WebhookStatus,
};
use crate::dto::PaymentListQuery;
use crate::error::RepoError;

/// The main repository port for the hostel payments service.
///
/// Reads are individual queries. Every write goes through [`commit`], which
/// applies a whole [`UnitOfWork`] in one database transaction.
///
/// [`commit`]: HostelRepository::commit
#[async_trait::async_trait]
pub trait HostelRepository: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────────
    // Hostels
    // ─────────────────────────────────────────────────────────────────────────────

    async fn create_hostel(&self, hostel: &Hostel) -> Result<(), RepoError>;

    async fn get_hostel(&self, id: HostelId) -> Result<Option<Hostel>, RepoError>;

    async fn list_hostels(&self) -> Result<Vec<Hostel>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Bookings
    // ─────────────────────────────────────────────────────────────────────────────

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, RepoError>;

    /// Bookings of a hostel, newest first.
    async fn list_bookings(&self, hostel_id: HostelId) -> Result<Vec<Booking>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Payments
    // ─────────────────────────────────────────────────────────────────────────────

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, RepoError>;

    /// Finds a payment by its idempotency key within a hostel.
    async fn find_payment_by_idempotency_key(
        &self,
        hostel_id: HostelId,
        key: &str,
    ) -> Result<Option<Payment>, RepoError>;

    async fn find_payment_by_gateway_order(
        &self,
        order_id: &str,
    ) -> Result<Option<Payment>, RepoError>;

    async fn find_payment_by_gateway_payment_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<Payment>, RepoError>;

    /// Payments matching every filter that is set, oldest due date first.
    async fn list_payments(&self, query: &PaymentListQuery) -> Result<Vec<Payment>, RepoError>;

    /// Pending and processing payments with a due date, optionally for one hostel.
    async fn list_open_payments(
        &self,
        hostel_id: Option<HostelId>,
    ) -> Result<Vec<Payment>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Refunds
    // ─────────────────────────────────────────────────────────────────────────────

    async fn get_refund(&self, id: RefundId) -> Result<Option<Refund>, RepoError>;

    async fn find_refund_by_gateway_id(
        &self,
        gateway_refund_id: &str,
    ) -> Result<Option<Refund>, RepoError>;

    async fn list_refunds_for_payment(&self, payment_id: PaymentId)
    -> Result<Vec<Refund>, RepoError>;

    async fn list_refunds(&self, hostel_id: HostelId) -> Result<Vec<Refund>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Schedules & Reminders
    // ─────────────────────────────────────────────────────────────────────────────

    async fn get_schedule(&self, id: ScheduleId) -> Result<Option<PaymentSchedule>, RepoError>;

    async fn list_schedules(&self, hostel_id: HostelId)
    -> Result<Vec<PaymentSchedule>, RepoError>;

    /// Active schedules with `next_due_date <= as_of`.
    async fn list_due_schedules(
        &self,
        as_of: NaiveDate,
        hostel_id: Option<HostelId>,
    ) -> Result<Vec<PaymentSchedule>, RepoError>;

    async fn list_reminders_for_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Vec<Reminder>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Unit of work (MUST be atomic)
    // ─────────────────────────────────────────────────────────────────────────────

    /// Applies every change in `uow` in one transaction.
    ///
    /// Updates are guarded by `version`; a stale version rolls everything
    /// back with [`RepoError::Conflict`]. Domain events are fanned out to the
    /// subscribed webhook endpoints inside the same transaction.
    async fn commit(&self, uow: UnitOfWork) -> Result<(), RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // API Keys
    // ─────────────────────────────────────────────────────────────────────────────

    /// Finds an active key by hash and stamps `last_used_at`.
    async fn verify_api_key_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, RepoError>;

    async fn create_api_key(&self, key: &ApiKey) -> Result<(), RepoError>;

    async fn count_api_keys(&self) -> Result<i64, RepoError>;

    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, RepoError>;

    /// Deactivates a key. Returns false when no active key had that id.
    async fn delete_api_key(&self, id: ApiKeyId) -> Result<bool, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Webhook endpoints & outbox
    // ─────────────────────────────────────────────────────────────────────────────

    async fn create_webhook_endpoint(&self, endpoint: &WebhookEndpoint) -> Result<(), RepoError>;

    async fn list_webhook_endpoints(&self) -> Result<Vec<WebhookEndpoint>, RepoError>;

    /// Pending events joined with their endpoint, oldest first.
    async fn get_pending_webhooks(
        &self,
        limit: i64,
    ) -> Result<Vec<(WebhookEvent, WebhookEndpoint)>, RepoError>;

    /// Records a delivery attempt.
    async fn update_webhook_status(
        &self,
        id: Uuid,
        status: WebhookStatus,
        last_error: Option<String>,
    ) -> Result<(), RepoError>;
}
