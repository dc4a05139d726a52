//! Payment creation, lookup and status transitions.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use hostel_types::domain::{NewPayment, ensure_transition};
use hostel_types::{
    AppError, CreatePaymentRequest, EventType, HostelId, HostelRepository, OverduePayment,
    Payment, PaymentId, PaymentListQuery, PaymentStatus, Principal, RepoError, UnitOfWork,
    UpdatePaymentStatusRequest,
};

use super::{ensure_booking_in_hostel, event, load_hostel, load_payment, on_payment_completed};

/// Application service for payment records.
pub struct PaymentService<R: HostelRepository> {
    repo: Arc<R>,
}

impl<R: HostelRepository> PaymentService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Creation
    // ─────────────────────────────────────────────────────────────────────────────

    /// Creates a pending payment.
    ///
    /// Returns the payment and whether it was created by this call: replaying
    /// an idempotency key returns the original payment unchanged.
    pub async fn create_payment(
        &self,
        principal: &Principal,
        req: CreatePaymentRequest,
    ) -> Result<(Payment, bool), AppError> {
        principal.ensure_hostel(req.hostel_id)?;
        let hostel = load_hostel(self.repo.as_ref(), req.hostel_id).await?;
        if let Some(currency) = req.currency {
            hostel.ensure_currency(currency)?;
        }

        if let Some(existing) = self.replay(hostel.id, req.idempotency_key.as_deref()).await? {
            tracing::info!(payment_id = %existing.id, "Idempotent replay of payment creation");
            return Ok((existing, false));
        }

        ensure_booking_in_hostel(self.repo.as_ref(), req.booking_id, hostel.id).await?;

        let payment = Payment::new(
            NewPayment {
                hostel_id: hostel.id,
                payer_id: req.payer_id,
                student_id: req.student_id,
                booking_id: req.booking_id,
                schedule_id: None,
                payment_type: req.payment_type,
                amount: req.amount,
                method: req.method,
                due_date: req.due_date,
                description: req.description,
                idempotency_key: req.idempotency_key,
            },
            hostel.currency,
        )?;

        let mut uow = UnitOfWork::new();
        uow.insert_payment(payment.clone())
            .emit(event(EventType::PaymentCreated, &payment)?);
        self.commit_new(uow, &payment).await
    }

    /// Returns the payment already stored under `key`, if any.
    pub(crate) async fn replay(
        &self,
        hostel_id: HostelId,
        key: Option<&str>,
    ) -> Result<Option<Payment>, AppError> {
        match key {
            Some(key) => self
                .repo
                .find_payment_by_idempotency_key(hostel_id, key)
                .await
                .map_err(Into::into),
            None => Ok(None),
        }
    }

    /// Commits a unit of work that inserts `payment`.
    ///
    /// A concurrent insert with the same idempotency key loses the unique
    /// index race; the winner is returned instead.
    pub(crate) async fn commit_new(
        &self,
        uow: UnitOfWork,
        payment: &Payment,
    ) -> Result<(Payment, bool), AppError> {
        match self.repo.commit(uow).await {
            Ok(()) => {
                tracing::info!(
                    payment_id = %payment.id,
                    amount = %payment.amount,
                    status = %payment.status,
                    "Payment created"
                );
                Ok((payment.clone(), true))
            }
            Err(RepoError::Conflict(msg)) => {
                match self
                    .replay(payment.hostel_id, payment.idempotency_key.as_deref())
                    .await?
                {
                    Some(existing) => Ok((existing, false)),
                    None => Err(AppError::Conflict(msg)),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────────

    pub async fn get_payment(&self, principal: &Principal, id: PaymentId) -> Result<Payment, AppError> {
        let payment = load_payment(self.repo.as_ref(), id).await?;
        principal.ensure_hostel(payment.hostel_id)?;
        Ok(payment)
    }

    /// Lists payments. Hostel-scoped keys only ever see their own hostel.
    pub async fn list_payments(
        &self,
        principal: &Principal,
        mut query: PaymentListQuery,
    ) -> Result<Vec<Payment>, AppError> {
        match (principal.hostel_id, query.hostel_id) {
            (Some(_), Some(requested)) => principal.ensure_hostel(requested)?,
            (Some(own), None) => query.hostel_id = Some(own),
            (None, _) => {}
        }
        if let (Some(from), Some(to)) = (query.due_from, query.due_to) {
            if from > to {
                return Err(AppError::BadRequest("due_from must not be after due_to".into()));
            }
        }
        self.repo.list_payments(&query).await.map_err(Into::into)
    }

    /// Open payments of a hostel past their due date, most overdue first.
    pub async fn list_overdue(
        &self,
        principal: &Principal,
        hostel_id: HostelId,
        today: NaiveDate,
    ) -> Result<Vec<OverduePayment>, AppError> {
        principal.ensure_hostel(hostel_id)?;
        load_hostel(self.repo.as_ref(), hostel_id).await?;

        let mut overdue: Vec<OverduePayment> = self
            .repo
            .list_open_payments(Some(hostel_id))
            .await?
            .into_iter()
            .filter(|p| p.is_overdue(today))
            .map(|payment| OverduePayment {
                days_overdue: payment.days_overdue(today),
                payment,
            })
            .collect();
        overdue.sort_by(|a, b| b.days_overdue.cmp(&a.days_overdue));
        Ok(overdue)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Status transitions
    // ─────────────────────────────────────────────────────────────────────────────

    /// Moves a payment forward: to `processing`, `completed` or `failed`.
    pub async fn update_status(
        &self,
        principal: &Principal,
        id: PaymentId,
        req: UpdatePaymentStatusRequest,
    ) -> Result<Payment, AppError> {
        let mut payment = self.get_payment(principal, id).await?;
        let from = payment.status;
        let mut uow = UnitOfWork::new();

        match req.status {
            PaymentStatus::Processing => {
                let order_id = req
                    .gateway_order_id
                    .filter(|o| !o.trim().is_empty())
                    .ok_or_else(|| {
                        AppError::BadRequest("gateway_order_id is required for processing".into())
                    })?;
                payment.mark_processing(order_id)?;
                uow.update_payment(payment.clone());
            }
            PaymentStatus::Completed => {
                let paid_at = req.paid_at.unwrap_or_else(Utc::now);
                payment.complete(req.transaction_reference, req.gateway_payment_id, paid_at)?;
                uow.update_payment(payment.clone());
                on_payment_completed(self.repo.as_ref(), &payment, &mut uow).await?;
            }
            PaymentStatus::Failed => {
                let reason = req.failure_reason.ok_or_else(|| {
                    AppError::BadRequest("failure_reason is required for failed".into())
                })?;
                payment.fail(reason, Utc::now())?;
                uow.update_payment(payment.clone())
                    .emit(event(EventType::PaymentFailed, &payment)?);
            }
            PaymentStatus::Refunded => {
                return Err(AppError::BadRequest(
                    "Payments become refunded by processing refunds".into(),
                ));
            }
            PaymentStatus::Pending => {
                ensure_transition(from, PaymentStatus::Pending)?;
            }
        }

        self.repo.commit(uow).await?;
        payment.version += 1;

        tracing::info!(payment_id = %id, %from, to = %payment.status, "Payment status changed");
        Ok(payment)
    }
}
