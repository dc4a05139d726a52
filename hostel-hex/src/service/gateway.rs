//! Gateway callbacks: checkout verification and signed webhooks.

use std::sync::Arc;

use chrono::Utc;

use hostel_types::domain::{GatewayCallback, GatewayWebhook};
use hostel_types::{
    AppError, DomainError, EventType, GatewayWebhookAck, HostelRepository, Payment,
    PaymentGateway, PaymentStatus, Principal, RefundStatus, UnitOfWork, VerifyCheckoutRequest,
};

use super::{event, on_payment_completed};

const PROCESSED: &str = "processed";
const DUPLICATE: &str = "duplicate";
const IGNORED: &str = "ignored";

fn ack(status: &str) -> GatewayWebhookAck {
    GatewayWebhookAck {
        status: status.to_string(),
    }
}

pub struct PaymentGatewayService<R: HostelRepository, G: PaymentGateway> {
    repo: Arc<R>,
    gateway: Arc<G>,
}

impl<R: HostelRepository, G: PaymentGateway> PaymentGatewayService<R, G> {
    pub fn new(repo: Arc<R>, gateway: Arc<G>) -> Self {
        Self { repo, gateway }
    }

    /// Completes a payment from the checkout callback.
    ///
    /// The signature is HMAC-SHA256 of `order_id|gateway_payment_id` under
    /// the gateway key secret. Verifying the same checkout twice is a no-op.
    pub async fn verify_checkout(
        &self,
        principal: &Principal,
        req: VerifyCheckoutRequest,
    ) -> Result<Payment, AppError> {
        if !self
            .gateway
            .verify_payment_signature(&req.order_id, &req.gateway_payment_id, &req.signature)
        {
            tracing::warn!(order_id = %req.order_id, "Checkout signature mismatch");
            return Err(AppError::BadRequest("Invalid payment signature".into()));
        }

        let payment = self
            .repo
            .find_payment_by_gateway_order(&req.order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Payment for order {}", req.order_id)))?;
        principal.ensure_hostel(payment.hostel_id)?;

        if payment.status.is_collected()
            && payment.gateway_payment_id.as_deref() == Some(req.gateway_payment_id.as_str())
        {
            return Ok(payment);
        }
        self.capture(payment, req.gateway_payment_id).await
    }

    async fn capture(&self, mut payment: Payment, gateway_payment_id: String) -> Result<Payment, AppError> {
        payment.complete(None, Some(gateway_payment_id), Utc::now())?;
        let mut uow = UnitOfWork::new();
        uow.update_payment(payment.clone());
        on_payment_completed(self.repo.as_ref(), &payment, &mut uow).await?;
        self.repo.commit(uow).await?;
        payment.version += 1;

        tracing::info!(payment_id = %payment.id, receipt = ?payment.receipt_number, "Payment captured");
        Ok(payment)
    }

    /// Applies a gateway webhook.
    ///
    /// The body must carry a valid HMAC-SHA256 under the webhook secret.
    /// Replays of an already applied event answer `duplicate`; events we do
    /// not act on answer `ignored`.
    pub async fn handle_webhook(
        &self,
        body: &[u8],
        signature: &str,
    ) -> Result<GatewayWebhookAck, AppError> {
        if !self.gateway.verify_webhook_signature(body, signature) {
            tracing::warn!("Gateway webhook signature mismatch");
            return Err(AppError::Unauthorized("Invalid webhook signature".into()));
        }

        let hook: GatewayWebhook = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Malformed webhook body: {}", e)))?;
        let callback = GatewayCallback::try_from(hook)?;
        tracing::debug!(?callback, "Gateway webhook received");

        match callback {
            GatewayCallback::PaymentCaptured {
                order_id,
                gateway_payment_id,
                amount_minor,
                currency,
            } => {
                let Some(payment) = self.repo.find_payment_by_gateway_order(&order_id).await? else {
                    tracing::warn!(%order_id, "Captured webhook for unknown order");
                    return Ok(ack(IGNORED));
                };
                if payment.status.is_collected() {
                    return Ok(ack(DUPLICATE));
                }
                if let Some(currency) = currency {
                    if currency != payment.currency {
                        return Err(DomainError::CurrencyMismatch {
                            expected: payment.currency,
                            got: currency,
                        }
                        .into());
                    }
                }
                if let Some(amount) = amount_minor {
                    let expected = payment.money()?.to_minor()?;
                    if amount != expected {
                        return Err(AppError::BadRequest(format!(
                            "Captured amount {} does not match payment amount {}",
                            amount, expected
                        )));
                    }
                }
                self.capture(payment, gateway_payment_id).await?;
                Ok(ack(PROCESSED))
            }
            GatewayCallback::PaymentFailed {
                order_id,
                gateway_payment_id,
                reason,
            } => {
                let Some(mut payment) = self.repo.find_payment_by_gateway_order(&order_id).await?
                else {
                    tracing::warn!(%order_id, "Failure webhook for unknown order");
                    return Ok(ack(IGNORED));
                };
                match payment.status {
                    PaymentStatus::Failed => return Ok(ack(DUPLICATE)),
                    // a late failure for an attempt that was since captured
                    PaymentStatus::Completed | PaymentStatus::Refunded => return Ok(ack(IGNORED)),
                    PaymentStatus::Pending | PaymentStatus::Processing => {}
                }
                payment.fail(reason, Utc::now())?;
                if gateway_payment_id.is_some() {
                    payment.gateway_payment_id = gateway_payment_id;
                }
                let mut uow = UnitOfWork::new();
                uow.update_payment(payment.clone())
                    .emit(event(EventType::PaymentFailed, &payment)?);
                self.repo.commit(uow).await?;
                tracing::info!(payment_id = %payment.id, "Payment failed at gateway");
                Ok(ack(PROCESSED))
            }
            GatewayCallback::RefundProcessed {
                gateway_refund_id, ..
            } => {
                // refunds are settled synchronously when processed, so this only confirms
                match self.repo.find_refund_by_gateway_id(&gateway_refund_id).await? {
                    Some(refund) if refund.status == RefundStatus::Processed => Ok(ack(DUPLICATE)),
                    _ => Ok(ack(IGNORED)),
                }
            }
            GatewayCallback::Ignored { event } => {
                tracing::debug!(%event, "Ignoring gateway event");
                Ok(ack(IGNORED))
            }
        }
    }
}
