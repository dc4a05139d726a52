//! Asking for money: gateway checkouts, offline receipts and booking advances.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use hostel_types::domain::{GatewayOrder, GatewayOrderRequest, NewPayment, ensure_transition};
use hostel_types::{
    AppError, BookingId, CheckoutResponse, EventType, HostelRepository, ManualPaymentRequest,
    Payment, PaymentGateway, PaymentId, PaymentListQuery, PaymentMethod, PaymentStatus,
    PaymentType, Principal, RequestAdvanceRequest, UnitOfWork,
};

use super::payment::PaymentService;
use super::{ensure_booking_in_hostel, event, load_booking, load_hostel, on_payment_completed};

pub struct PaymentRequestService<R: HostelRepository, G: PaymentGateway> {
    repo: Arc<R>,
    gateway: Arc<G>,
    payments: PaymentService<R>,
}

impl<R: HostelRepository, G: PaymentGateway> PaymentRequestService<R, G> {
    pub fn new(repo: Arc<R>, gateway: Arc<G>) -> Self {
        Self {
            payments: PaymentService::new(repo.clone()),
            repo,
            gateway,
        }
    }

    /// Opens a gateway order for a pending payment.
    ///
    /// A payment already handed to the gateway returns its existing order, so
    /// a payer reloading the checkout page does not create a second one.
    pub async fn initiate_online_payment(
        &self,
        principal: &Principal,
        id: PaymentId,
    ) -> Result<CheckoutResponse, AppError> {
        let mut payment = self.payments.get_payment(principal, id).await?;
        let amount_minor = payment.money()?.to_minor()?;

        if payment.status == PaymentStatus::Processing {
            if let Some(order_id) = payment.gateway_order_id.clone() {
                return Ok(CheckoutResponse {
                    payment_id: payment.id,
                    order: GatewayOrder {
                        order_id,
                        amount_minor,
                        currency: payment.currency,
                        status: "created".into(),
                    },
                    key_id: self.gateway.key_id(),
                });
            }
        }
        ensure_transition(payment.status, PaymentStatus::Processing)?;

        let order = self
            .gateway
            .create_order(GatewayOrderRequest {
                amount_minor,
                currency: payment.currency,
                receipt: payment.id.to_string(),
                notes: Some(json!({
                    "payment_id": payment.id,
                    "hostel_id": payment.hostel_id,
                    "payment_type": payment.payment_type,
                })),
            })
            .await?;

        payment.mark_processing(order.order_id.clone())?;
        let mut uow = UnitOfWork::new();
        uow.update_payment(payment.clone());
        self.repo.commit(uow).await?;

        tracing::info!(
            payment_id = %payment.id,
            order_id = %order.order_id,
            provider = self.gateway.provider(),
            "Gateway order created"
        );
        Ok(CheckoutResponse {
            payment_id: payment.id,
            order,
            key_id: self.gateway.key_id(),
        })
    }

    /// Records money received outside the gateway (cash, bank transfer, ...).
    pub async fn record_manual_payment(
        &self,
        principal: &Principal,
        req: ManualPaymentRequest,
    ) -> Result<(Payment, bool), AppError> {
        principal.ensure_hostel(req.hostel_id)?;
        if req.method.is_gateway() {
            return Err(AppError::BadRequest(
                "Manual payments cannot use the gateway method".into(),
            ));
        }
        let reference = req.transaction_reference.trim().to_string();
        if reference.is_empty() {
            return Err(AppError::BadRequest(
                "transaction_reference cannot be empty".into(),
            ));
        }

        let hostel = load_hostel(self.repo.as_ref(), req.hostel_id).await?;
        if let Some(currency) = req.currency {
            hostel.ensure_currency(currency)?;
        }
        if let Some(existing) = self
            .payments
            .replay(hostel.id, req.idempotency_key.as_deref())
            .await?
        {
            return Ok((existing, false));
        }
        ensure_booking_in_hostel(self.repo.as_ref(), req.booking_id, hostel.id).await?;

        let mut payment = Payment::new(
            NewPayment {
                hostel_id: hostel.id,
                payer_id: req.payer_id,
                student_id: req.student_id,
                booking_id: req.booking_id,
                schedule_id: None,
                payment_type: req.payment_type,
                amount: req.amount,
                method: req.method,
                due_date: None,
                description: req.description,
                idempotency_key: req.idempotency_key,
            },
            hostel.currency,
        )?;
        payment.complete(Some(reference), None, req.paid_at.unwrap_or_else(Utc::now))?;

        let mut uow = UnitOfWork::new();
        uow.insert_payment(payment.clone())
            .emit(event(EventType::PaymentCreated, &payment)?);
        on_payment_completed(self.repo.as_ref(), &payment, &mut uow).await?;
        self.payments.commit_new(uow, &payment).await
    }

    /// Creates the pending advance payment for a booking.
    ///
    /// The amount is the booking's advance, or one month's rent when no
    /// advance was quoted. An open or paid advance is returned instead of
    /// creating another.
    pub async fn request_booking_advance(
        &self,
        principal: &Principal,
        booking_id: BookingId,
        req: RequestAdvanceRequest,
    ) -> Result<(Payment, bool), AppError> {
        let booking = load_booking(self.repo.as_ref(), booking_id).await?;
        principal.ensure_hostel(booking.hostel_id)?;
        if !booking.awaits_advance() {
            return Err(AppError::Conflict(format!(
                "Booking is {}; an advance can only be requested while pending or approved",
                booking.status
            )));
        }

        let existing = self
            .repo
            .list_payments(&PaymentListQuery {
                hostel_id: Some(booking.hostel_id),
                booking_id: Some(booking.id),
                ..Default::default()
            })
            .await?
            .into_iter()
            .find(|p| p.payment_type == PaymentType::BookingAdvance && p.status != PaymentStatus::Failed);
        if let Some(existing) = existing {
            return Ok((existing, false));
        }

        let payment = Payment::new(
            NewPayment {
                hostel_id: booking.hostel_id,
                payer_id: booking.student_id,
                student_id: Some(booking.student_id),
                booking_id: Some(booking.id),
                schedule_id: None,
                payment_type: PaymentType::BookingAdvance,
                amount: booking.advance_due(),
                method: req.method.unwrap_or(PaymentMethod::DEFAULT_DUE),
                due_date: Some(req.due_date.unwrap_or(booking.check_in_date)),
                description: Some(format!("Booking advance for check-in {}", booking.check_in_date)),
                idempotency_key: None,
            },
            booking.currency,
        )?;

        let mut uow = UnitOfWork::new();
        uow.insert_payment(payment.clone())
            .emit(event(EventType::PaymentCreated, &payment)?);
        self.payments.commit_new(uow, &payment).await
    }
}
