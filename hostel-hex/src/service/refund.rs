//! Refunds against completed payments.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use hostel_types::domain::refund::pending_total;
use hostel_types::domain::GatewayRefundRequest;
use hostel_types::{
    AppError, CreateRefundRequest, EventType, HostelRepository, Money, Payment, PaymentGateway,
    PaymentId, Principal, ProcessedRefundResponse, Refund, RefundId, RefundStatus,
    RejectRefundRequest, RepoError, UnitOfWork,
};

use super::{event, load_payment, load_refund};

const FINALISE_ATTEMPTS: usize = 3;

pub struct RefundService<R: HostelRepository, G: PaymentGateway> {
    repo: Arc<R>,
    gateway: Arc<G>,
}

impl<R: HostelRepository, G: PaymentGateway> RefundService<R, G> {
    pub fn new(repo: Arc<R>, gateway: Arc<G>) -> Self {
        Self { repo, gateway }
    }

    /// Requests a refund on a completed payment.
    ///
    /// Pending and processed refunds together never exceed the payment. The
    /// payment row is rewritten in the same unit of work so two concurrent
    /// requests cannot both reserve the same amount.
    pub async fn request_refund(
        &self,
        principal: &Principal,
        payment_id: PaymentId,
        req: CreateRefundRequest,
    ) -> Result<Refund, AppError> {
        let mut payment = load_payment(self.repo.as_ref(), payment_id).await?;
        principal.ensure_hostel(payment.hostel_id)?;

        let existing = self.repo.list_refunds_for_payment(payment_id).await?;
        let refund = Refund::request(&payment, req.amount, req.reason, pending_total(&existing))?;

        payment.updated_at = Utc::now();
        let mut uow = UnitOfWork::new();
        uow.insert_refund(refund.clone()).update_payment(payment);
        self.repo.commit(uow).await?;

        tracing::info!(refund_id = %refund.id, %payment_id, amount = %refund.amount, "Refund requested");
        Ok(refund)
    }

    pub async fn list_refunds(
        &self,
        principal: &Principal,
        payment_id: PaymentId,
    ) -> Result<Vec<Refund>, AppError> {
        let payment = load_payment(self.repo.as_ref(), payment_id).await?;
        principal.ensure_hostel(payment.hostel_id)?;
        self.repo
            .list_refunds_for_payment(payment_id)
            .await
            .map_err(Into::into)
    }

    /// Pays a pending refund out.
    ///
    /// Gateway payments are refunded through the gateway; offline payments
    /// are marked processed directly. The payment flips to `refunded` once
    /// the processed refunds cover it.
    ///
    /// A gateway refund is first claimed (`processing`) in its own commit,
    /// together with a payment version bump, so at most one caller reaches
    /// the gateway for a given refund or payment.
    pub async fn process_refund(
        &self,
        principal: &Principal,
        id: RefundId,
    ) -> Result<ProcessedRefundResponse, AppError> {
        let mut refund = load_refund(self.repo.as_ref(), id).await?;
        principal.ensure_hostel(refund.hostel_id)?;
        if refund.status != RefundStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Refund {} is {}",
                refund.id, refund.status
            )));
        }
        let mut payment = load_payment(self.repo.as_ref(), refund.payment_id).await?;

        let gateway_refund_id = if payment.method.is_gateway() {
            let gateway_payment_id = payment.gateway_payment_id.clone().ok_or_else(|| {
                AppError::Conflict(format!(
                    "Payment {} has no gateway payment id to refund against",
                    payment.id
                ))
            })?;
            let amount_minor = Money::new(refund.amount, refund.currency)?.to_minor()?;
            self.claim(&mut refund, &mut payment).await?;

            let issued = self
                .gateway
                .refund(GatewayRefundRequest {
                    gateway_payment_id,
                    amount_minor,
                    // the refund id doubles as the gateway idempotency receipt
                    receipt: refund.id.to_string(),
                })
                .await;
            match issued {
                Ok(result) => Some(result.refund_id),
                Err(e) => {
                    self.release(&mut refund).await;
                    return Err(e.into());
                }
            }
        } else {
            None
        };
        let claimed = gateway_refund_id.is_some();

        refund.mark_processed(gateway_refund_id, Utc::now())?;

        let mut attempt = 1;
        let (payment, fully_refunded) = loop {
            let mut updated = payment.clone();
            let fully_refunded = updated.apply_refund(refund.amount)?;

            let mut uow = UnitOfWork::new();
            uow.update_refund(refund.clone())
                .update_payment(updated.clone())
                .emit(event(
                    EventType::RefundProcessed,
                    &json!({ "refund": &refund, "payment": &updated }),
                )?);
            if fully_refunded {
                uow.emit(event(EventType::PaymentRefunded, &updated)?);
            }

            match self.repo.commit(uow).await {
                Ok(()) => {
                    updated.version += 1;
                    refund.version += 1;
                    break (updated, fully_refunded);
                }
                // the money is out; reapply against the latest payment row
                Err(RepoError::Conflict(reason)) if claimed && attempt < FINALISE_ATTEMPTS => {
                    tracing::warn!(
                        refund_id = %refund.id,
                        %reason,
                        attempt,
                        "Payment changed during refund payout, retrying"
                    );
                    attempt += 1;
                    payment = load_payment(self.repo.as_ref(), refund.payment_id).await?;
                }
                Err(e) => {
                    if claimed {
                        tracing::error!(
                            refund_id = %refund.id,
                            gateway_refund_id = ?refund.gateway_refund_id,
                            error = %e,
                            "Gateway refund issued but not recorded"
                        );
                    }
                    return Err(e.into());
                }
            }
        };

        tracing::info!(
            refund_id = %refund.id,
            payment_id = %payment.id,
            fully_refunded,
            "Refund processed"
        );
        Ok(ProcessedRefundResponse { refund, payment })
    }

    /// Moves the refund to `processing` and bumps its payment in one commit.
    async fn claim(&self, refund: &mut Refund, payment: &mut Payment) -> Result<(), AppError> {
        refund.begin_processing()?;
        payment.updated_at = Utc::now();

        let mut uow = UnitOfWork::new();
        uow.update_refund(refund.clone()).update_payment(payment.clone());
        self.repo.commit(uow).await?;

        refund.version += 1;
        payment.version += 1;
        tracing::debug!(refund_id = %refund.id, "Refund claimed for payout");
        Ok(())
    }

    /// Hands a claimed refund back to `pending` so it can be retried.
    async fn release(&self, refund: &mut Refund) {
        let released = match refund.release() {
            Ok(()) => {
                let mut uow = UnitOfWork::new();
                uow.update_refund(refund.clone());
                self.repo.commit(uow).await.map_err(AppError::from)
            }
            Err(e) => Err(e.into()),
        };
        match released {
            Ok(()) => refund.version += 1,
            Err(e) => {
                tracing::error!(refund_id = %refund.id, error = %e, "Could not release refund claim")
            }
        }
    }

    pub async fn reject_refund(
        &self,
        principal: &Principal,
        id: RefundId,
        req: RejectRefundRequest,
    ) -> Result<Refund, AppError> {
        let mut refund = load_refund(self.repo.as_ref(), id).await?;
        principal.ensure_hostel(refund.hostel_id)?;

        let reason = req.reason.trim().to_string();
        if reason.is_empty() {
            return Err(AppError::BadRequest("Rejection reason cannot be empty".into()));
        }
        refund.reject(reason)?;

        let mut uow = UnitOfWork::new();
        uow.update_refund(refund.clone());
        self.repo.commit(uow).await?;
        refund.version += 1;

        tracing::info!(refund_id = %id, "Refund rejected");
        Ok(refund)
    }
}
