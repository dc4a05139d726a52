//! Refund domain model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{HostelId, PaymentId, RefundId};
use super::lifecycle::{Lifecycle, ensure_transition};
use super::money::{Currency, Money};
use super::payment::{Payment, PaymentStatus};
use crate::error::DomainError;

string_enum! {
    /// Refund status.
    RefundStatus {
        Pending => "pending",
        /// Claimed for payout; the gateway call is in flight
        Processing => "processing",
        Processed => "processed",
        Rejected => "rejected",
    }
}

impl Lifecycle for RefundStatus {
    const ENTITY: &'static str = "refund";

    fn is_terminal(&self) -> bool {
        matches!(self, RefundStatus::Processed | RefundStatus::Rejected)
    }

    fn can_transition_to(&self, next: Self) -> bool {
        use RefundStatus::*;
        matches!(
            (self, next),
            (Pending, Processing | Processed | Rejected) | (Processing, Processed | Pending)
        )
    }
}

/// Money returned against a completed payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Refund {
    pub id: RefundId,
    pub payment_id: PaymentId,
    pub hostel_id: HostelId,
    #[schema(value_type = String, example = "2500.00")]
    pub amount: Decimal,
    pub currency: Currency,
    pub reason: String,
    pub status: RefundStatus,
    pub gateway_refund_id: Option<String>,
    pub rejection_reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl Refund {
    /// Requests a refund against `payment`.
    ///
    /// `pending_total` is the sum of refunds already awaiting processing;
    /// together with processed refunds they may never exceed the payment.
    pub fn request(
        payment: &Payment,
        amount: Decimal,
        reason: String,
        pending_total: Decimal,
    ) -> Result<Self, DomainError> {
        if payment.status != PaymentStatus::Completed {
            return Err(DomainError::validation(format!(
                "Only completed payments can be refunded (payment is {})",
                payment.status
            )));
        }
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(DomainError::validation("Refund reason cannot be empty"));
        }

        let amount = Money::positive(amount, payment.currency)?.amount();
        let refundable = payment.refundable_amount(pending_total);
        if amount > refundable {
            return Err(DomainError::RefundExceedsPayment {
                requested: amount,
                refundable,
            });
        }

        Ok(Self {
            id: RefundId::new(),
            payment_id: payment.id,
            hostel_id: payment.hostel_id,
            amount,
            currency: payment.currency,
            reason,
            status: RefundStatus::Pending,
            gateway_refund_id: None,
            rejection_reason: None,
            requested_at: Utc::now(),
            processed_at: None,
            version: 0,
        })
    }

    /// Claims a pending refund before money leaves through the gateway.
    pub fn begin_processing(&mut self) -> Result<(), DomainError> {
        ensure_transition(self.status, RefundStatus::Processing)?;
        self.status = RefundStatus::Processing;
        Ok(())
    }

    /// Returns a claimed refund to `pending` after the gateway turned it down.
    pub fn release(&mut self) -> Result<(), DomainError> {
        ensure_transition(self.status, RefundStatus::Pending)?;
        self.status = RefundStatus::Pending;
        Ok(())
    }

    pub fn mark_processed(
        &mut self,
        gateway_refund_id: Option<String>,
        processed_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        ensure_transition(self.status, RefundStatus::Processed)?;
        self.status = RefundStatus::Processed;
        self.gateway_refund_id = gateway_refund_id;
        self.processed_at = Some(processed_at);
        Ok(())
    }

    pub fn reject(&mut self, reason: String) -> Result<(), DomainError> {
        ensure_transition(self.status, RefundStatus::Rejected)?;
        self.status = RefundStatus::Rejected;
        self.rejection_reason = Some(reason);
        Ok(())
    }
}

/// Sum of refunds requested but not yet paid out (pending or processing).
pub fn pending_total(refunds: &[Refund]) -> Decimal {
    refunds
        .iter()
        .filter(|r| matches!(r.status, RefundStatus::Pending | RefundStatus::Processing))
        .map(|r| r.amount)
        .sum()
}
