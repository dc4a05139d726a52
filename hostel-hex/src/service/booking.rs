//! Booking lifecycle.

use std::sync::Arc;

use hostel_types::domain::NewBooking;
use hostel_types::{
    AppError, Booking, BookingId, BookingStatus, CreateBookingRequest, EventType, HostelId,
    HostelRepository, Principal, UnitOfWork,
};

use super::{event, load_booking, load_hostel};

pub struct BookingService<R: HostelRepository> {
    repo: Arc<R>,
}

impl<R: HostelRepository> BookingService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Creates a pending booking in the hostel's currency.
    ///
    /// The total is checked against rent x duration (or computed when omitted).
    pub async fn create_booking(
        &self,
        principal: &Principal,
        req: CreateBookingRequest,
    ) -> Result<Booking, AppError> {
        principal.ensure_hostel(req.hostel_id)?;
        let hostel = load_hostel(self.repo.as_ref(), req.hostel_id).await?;

        let booking = Booking::new(
            NewBooking {
                hostel_id: hostel.id,
                student_id: req.student_id,
                room_type: req.room_type,
                check_in_date: req.check_in_date,
                stay_duration_months: req.stay_duration_months,
                quoted_rent_monthly: req.quoted_rent_monthly,
                security_deposit: req.security_deposit,
                advance_amount: req.advance_amount,
                total_amount: req.total_amount,
            },
            hostel.currency,
        )?;

        let mut uow = UnitOfWork::new();
        uow.insert_booking(booking.clone());
        self.repo.commit(uow).await?;

        tracing::info!(booking_id = %booking.id, total = %booking.total_amount, "Booking created");
        Ok(booking)
    }

    pub async fn get_booking(&self, principal: &Principal, id: BookingId) -> Result<Booking, AppError> {
        let booking = load_booking(self.repo.as_ref(), id).await?;
        principal.ensure_hostel(booking.hostel_id)?;
        Ok(booking)
    }

    pub async fn list_bookings(
        &self,
        principal: &Principal,
        hostel_id: HostelId,
    ) -> Result<Vec<Booking>, AppError> {
        principal.ensure_hostel(hostel_id)?;
        load_hostel(self.repo.as_ref(), hostel_id).await?;
        self.repo.list_bookings(hostel_id).await.map_err(Into::into)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────────

    pub async fn approve(&self, principal: &Principal, id: BookingId) -> Result<Booking, AppError> {
        self.transition(principal, id, BookingStatus::Approved).await
    }

    pub async fn reject(&self, principal: &Principal, id: BookingId) -> Result<Booking, AppError> {
        self.transition(principal, id, BookingStatus::Rejected).await
    }

    pub async fn confirm(&self, principal: &Principal, id: BookingId) -> Result<Booking, AppError> {
        self.transition(principal, id, BookingStatus::Confirmed).await
    }

    pub async fn check_in(&self, principal: &Principal, id: BookingId) -> Result<Booking, AppError> {
        self.transition(principal, id, BookingStatus::CheckedIn).await
    }

    pub async fn check_out(&self, principal: &Principal, id: BookingId) -> Result<Booking, AppError> {
        self.transition(principal, id, BookingStatus::CheckedOut).await
    }

    pub async fn cancel(&self, principal: &Principal, id: BookingId) -> Result<Booking, AppError> {
        self.transition(principal, id, BookingStatus::Cancelled).await
    }

    async fn transition(
        &self,
        principal: &Principal,
        id: BookingId,
        to: BookingStatus,
    ) -> Result<Booking, AppError> {
        let mut booking = self.get_booking(principal, id).await?;
        let from = booking.status;
        booking.transition(to)?;

        let mut uow = UnitOfWork::new();
        uow.update_booking(booking.clone());
        if to == BookingStatus::Confirmed {
            uow.emit(event(EventType::BookingConfirmed, &booking)?);
        }
        self.repo.commit(uow).await?;
        booking.version += 1;

        tracing::info!(booking_id = %id, %from, %to, "Booking status changed");
        Ok(booking)
    }
}
