//! Application services.
//!
//! Orchestrate domain operations through the repository and gateway ports.
//! Contains NO infrastructure logic - every write is a [`UnitOfWork`] handed
//! to [`HostelRepository::commit`].

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use hostel_types::{
    AppError, Booking, BookingId, DomainEvent, EventType, Hostel, HostelId, HostelRepository,
    Payment, PaymentGateway, PaymentId, PaymentSchedule, Refund, RefundId, ReminderPolicy,
    ScheduleId, UnitOfWork,
};

mod access;
mod booking;
mod gateway;
mod hostel;
mod ledger;
mod payment;
mod payment_request;
mod refund;
mod reminder;
mod reporting;
mod schedule;

pub use access::AccessService;
pub use booking::BookingService;
pub use gateway::PaymentGatewayService;
pub use hostel::HostelService;
pub use ledger::PaymentLedgerService;
pub use payment::PaymentService;
pub use payment_request::PaymentRequestService;
pub use refund::RefundService;
pub use reminder::PaymentReminderService;
pub use reporting::PaymentReportingService;
pub use schedule::PaymentScheduleService;

/// Every application service, sharing one repository and one gateway.
///
/// Generic over `R: HostelRepository` and `G: PaymentGateway` - the adapters
/// are injected at compile time, so tests run the same code against the
/// in-memory SQLite repository and the sandbox gateway.
pub struct Services<R: HostelRepository, G: PaymentGateway> {
    pub access: AccessService<R>,
    pub hostels: HostelService<R>,
    pub bookings: BookingService<R>,
    pub payments: PaymentService<R>,
    pub requests: PaymentRequestService<R, G>,
    pub gateway: PaymentGatewayService<R, G>,
    pub refunds: RefundService<R, G>,
    pub ledger: PaymentLedgerService<R>,
    pub schedules: PaymentScheduleService<R>,
    pub reminders: PaymentReminderService<R>,
    pub reports: PaymentReportingService<R>,
    repo: Arc<R>,
}

impl<R: HostelRepository, G: PaymentGateway> Services<R, G> {
    pub fn new(repo: R, gateway: G) -> Self {
        Self::with_policy(repo, gateway, ReminderPolicy::default())
    }

    pub fn with_policy(repo: R, gateway: G, policy: ReminderPolicy) -> Self {
        Self::from_shared(Arc::new(repo), Arc::new(gateway), policy)
    }

    pub fn from_shared(repo: Arc<R>, gateway: Arc<G>, policy: ReminderPolicy) -> Self {
        Self {
            access: AccessService::new(repo.clone()),
            hostels: HostelService::new(repo.clone()),
            bookings: BookingService::new(repo.clone()),
            payments: PaymentService::new(repo.clone()),
            requests: PaymentRequestService::new(repo.clone(), gateway.clone()),
            gateway: PaymentGatewayService::new(repo.clone(), gateway.clone()),
            refunds: RefundService::new(repo.clone(), gateway),
            ledger: PaymentLedgerService::new(repo.clone()),
            schedules: PaymentScheduleService::new(repo.clone()),
            reminders: PaymentReminderService::new(repo.clone(), policy),
            reports: PaymentReportingService::new(repo.clone()),
            repo,
        }
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Shared handle to the repository (for background workers).
    pub fn shared_repo(&self) -> Arc<R> {
        self.repo.clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared loaders
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub(crate) async fn load_hostel<R: HostelRepository>(
    repo: &R,
    id: HostelId,
) -> Result<Hostel, AppError> {
    repo.get_hostel(id)
        .await
        .map_err(AppError::from)
        .and_then(|opt| opt.ok_or_else(|| AppError::NotFound(format!("Hostel {}", id))))
}

pub(crate) async fn load_booking<R: HostelRepository>(
    repo: &R,
    id: BookingId,
) -> Result<Booking, AppError> {
    repo.get_booking(id)
        .await
        .map_err(AppError::from)
        .and_then(|opt| opt.ok_or_else(|| AppError::NotFound(format!("Booking {}", id))))
}

pub(crate) async fn load_payment<R: HostelRepository>(
    repo: &R,
    id: PaymentId,
) -> Result<Payment, AppError> {
    repo.get_payment(id)
        .await
        .map_err(AppError::from)
        .and_then(|opt| opt.ok_or_else(|| AppError::NotFound(format!("Payment {}", id))))
}

pub(crate) async fn load_refund<R: HostelRepository>(
    repo: &R,
    id: RefundId,
) -> Result<Refund, AppError> {
    repo.get_refund(id)
        .await
        .map_err(AppError::from)
        .and_then(|opt| opt.ok_or_else(|| AppError::NotFound(format!("Refund {}", id))))
}

pub(crate) async fn load_schedule<R: HostelRepository>(
    repo: &R,
    id: ScheduleId,
) -> Result<PaymentSchedule, AppError> {
    repo.get_schedule(id)
        .await
        .map_err(AppError::from)
        .and_then(|opt| opt.ok_or_else(|| AppError::NotFound(format!("Schedule {}", id))))
}

/// A booking referenced by a payment or schedule must live in the same hostel.
pub(crate) async fn ensure_booking_in_hostel<R: HostelRepository>(
    repo: &R,
    booking_id: Option<BookingId>,
    hostel_id: HostelId,
) -> Result<(), AppError> {
    let Some(booking_id) = booking_id else {
        return Ok(());
    };
    let booking = load_booking(repo, booking_id).await?;
    if booking.hostel_id != hostel_id {
        return Err(AppError::BadRequest(format!(
            "Booking {} belongs to another hostel",
            booking_id
        )));
    }
    Ok(())
}

pub(crate) fn event<T: Serialize>(event_type: EventType, payload: &T) -> Result<DomainEvent, AppError> {
    DomainEvent::new(event_type, payload).map_err(AppError::from)
}

/// Adds the completion side effects of `payment` to `uow`.
///
/// Emits `payment.completed` and, for a paid booking advance, confirms the
/// booking when it is still waiting for one.
pub(crate) async fn on_payment_completed<R: HostelRepository>(
    repo: &R,
    payment: &Payment,
    uow: &mut UnitOfWork,
) -> Result<Option<Booking>, AppError> {
    uow.emit(event(EventType::PaymentCompleted, payment)?);

    if payment.payment_type != hostel_types::PaymentType::BookingAdvance {
        return Ok(None);
    }
    let Some(booking_id) = payment.booking_id else {
        return Ok(None);
    };

    let mut booking = load_booking(repo, booking_id).await?;
    if !booking.awaits_advance() {
        return Ok(None);
    }
    booking.transition(hostel_types::BookingStatus::Confirmed)?;
    uow.update_booking(booking.clone())
        .emit(event(EventType::BookingConfirmed, &booking)?);
    tracing::info!(booking_id = %booking.id, payment_id = %payment.id, "Booking confirmed by advance payment");
    Ok(Some(booking))
}
