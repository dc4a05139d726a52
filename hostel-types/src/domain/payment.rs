//! Payment domain model.
//!
//! A payment moves one way through its lifecycle:
//! `pending -> processing -> completed -> refunded`, with `failed` as the
//! other terminal exit. Nothing ever returns to `pending`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::ids::{BookingId, HostelId, PaymentId, ScheduleId};
use super::lifecycle::{Lifecycle, ensure_transition};
use super::money::{Currency, Money};
use crate::error::DomainError;

string_enum! {
    /// Payment status.
    PaymentStatus {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
        Refunded => "refunded",
    }
}

impl PaymentStatus {
    /// Still awaiting money (counts towards pending and overdue totals).
    pub fn is_open(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }

    /// Money was received at some point, even if refunded since.
    pub fn is_collected(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Refunded)
    }
}

impl Lifecycle for PaymentStatus {
    const ENTITY: &'static str = "payment";

    fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Refunded)
    }

    fn can_transition_to(&self, next: Self) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Processing | Completed | Failed)
                | (Processing, Completed | Failed)
                | (Completed, Refunded)
        )
    }
}

string_enum! {
    /// What the payment is for.
    PaymentType {
        Rent => "rent",
        SecurityDeposit => "security_deposit",
        BookingAdvance => "booking_advance",
        MessFee => "mess_fee",
        MaintenanceFee => "maintenance_fee",
        Fine => "fine",
        Other => "other",
    }
}

string_enum! {
    /// How the money moves.
    PaymentMethod {
        Cash => "cash",
        Upi => "upi",
        Card => "card",
        NetBanking => "net_banking",
        BankTransfer => "bank_transfer",
        Cheque => "cheque",
        Wallet => "wallet",
        Gateway => "gateway",
    }
}

impl PaymentMethod {
    /// Assumed for dues raised on a payer's behalf when no method is named.
    pub const DEFAULT_DUE: PaymentMethod = PaymentMethod::Upi;

    pub fn is_gateway(&self) -> bool {
        matches!(self, PaymentMethod::Gateway)
    }
}

/// Validated input for a new payment.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub hostel_id: HostelId,
    pub payer_id: Uuid,
    pub student_id: Option<Uuid>,
    pub booking_id: Option<BookingId>,
    pub schedule_id: Option<ScheduleId>,
    pub payment_type: PaymentType,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
}

/// A payment owed to, or received by, a hostel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: PaymentId,
    pub hostel_id: HostelId,
    pub payer_id: Uuid,
    pub student_id: Option<Uuid>,
    pub booking_id: Option<BookingId>,
    pub schedule_id: Option<ScheduleId>,
    pub payment_type: PaymentType,
    /// Amount, quantized to 2 decimal places
    #[schema(value_type = String, example = "8500.00")]
    pub amount: Decimal,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub due_date: Option<NaiveDate>,
    pub paid_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub transaction_reference: Option<String>,
    pub receipt_number: Option<String>,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
    /// Sum of processed refunds
    #[schema(value_type = String, example = "0.00")]
    pub refunded_amount: Decimal,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a pending payment.
    ///
    /// # Validation
    /// - Amount must be greater than zero after quantization
    pub fn new(input: NewPayment, currency: Currency) -> Result<Self, DomainError> {
        let amount = Money::positive(input.amount, currency)?;
        let now = Utc::now();

        Ok(Self {
            id: PaymentId::new(),
            hostel_id: input.hostel_id,
            payer_id: input.payer_id,
            student_id: input.student_id,
            booking_id: input.booking_id,
            schedule_id: input.schedule_id,
            payment_type: input.payment_type,
            amount: amount.amount(),
            currency,
            method: input.method,
            status: PaymentStatus::Pending,
            due_date: input.due_date,
            paid_at: None,
            failed_at: None,
            failure_reason: None,
            gateway_order_id: None,
            gateway_payment_id: None,
            transaction_reference: None,
            receipt_number: None,
            description: input.description.filter(|d| !d.trim().is_empty()),
            idempotency_key: input.idempotency_key,
            refunded_amount: Money::zero(currency).amount(),
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the amount as Money.
    pub fn money(&self) -> Result<Money, DomainError> {
        Money::new(self.amount, self.currency)
    }

    /// Overdue: due before `today` and still awaiting money.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status.is_open() && self.due_date.is_some_and(|due| due < today)
    }

    /// Whole days past the due date (0 when not overdue).
    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        match self.due_date {
            Some(due) if self.is_overdue(today) => (today - due).num_days(),
            _ => 0,
        }
    }

    /// Hands the payment to the gateway.
    pub fn mark_processing(&mut self, gateway_order_id: String) -> Result<(), DomainError> {
        ensure_transition(self.status, PaymentStatus::Processing)?;
        self.status = PaymentStatus::Processing;
        self.method = PaymentMethod::Gateway;
        self.gateway_order_id = Some(gateway_order_id);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records the money as received and issues a receipt number.
    pub fn complete(
        &mut self,
        transaction_reference: Option<String>,
        gateway_payment_id: Option<String>,
        paid_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        ensure_transition(self.status, PaymentStatus::Completed)?;
        self.status = PaymentStatus::Completed;
        self.paid_at = Some(paid_at);
        if transaction_reference.is_some() {
            self.transaction_reference = transaction_reference;
        }
        if gateway_payment_id.is_some() {
            self.gateway_payment_id = gateway_payment_id;
        }
        self.receipt_number = Some(receipt_number(self.id, paid_at));
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Marks the payment as failed.
    pub fn fail(&mut self, reason: String, failed_at: DateTime<Utc>) -> Result<(), DomainError> {
        let reason = reason.trim().to_string();
        if reason.is_empty() {
            return Err(DomainError::validation("Failure reason cannot be empty"));
        }
        ensure_transition(self.status, PaymentStatus::Failed)?;
        self.status = PaymentStatus::Failed;
        self.failed_at = Some(failed_at);
        self.failure_reason = Some(reason);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// What can still be refunded, given refunds awaiting processing.
    pub fn refundable_amount(&self, pending_refunds: Decimal) -> Decimal {
        (self.amount - self.refunded_amount - pending_refunds).max(Decimal::ZERO)
    }

    /// Applies a processed refund. Returns true when the payment is now fully refunded.
    pub fn apply_refund(&mut self, amount: Decimal) -> Result<bool, DomainError> {
        if self.status != PaymentStatus::Completed {
            return Err(DomainError::InvalidTransition {
                entity: PaymentStatus::ENTITY,
                from: self.status.to_string(),
                to: PaymentStatus::Refunded.to_string(),
            });
        }
        let refunded = Money::new(self.refunded_amount, self.currency)?
            .checked_add(Money::positive(amount, self.currency)?)?;
        if refunded.amount() > self.amount {
            return Err(DomainError::RefundExceedsPayment {
                requested: amount,
                refundable: self.amount - self.refunded_amount,
            });
        }
        self.refunded_amount = refunded.amount();
        self.updated_at = Utc::now();

        if self.refunded_amount == self.amount {
            ensure_transition(self.status, PaymentStatus::Refunded)?;
            self.status = PaymentStatus::Refunded;
            return Ok(true);
        }
        Ok(false)
    }
}

/// Human-readable receipt number: `RCP-YYYYMMDD-XXXXXXXX`.
pub fn receipt_number(id: PaymentId, paid_at: DateTime<Utc>) -> String {
    let simple = id.as_uuid().simple().to_string();
    format!(
        "RCP-{}-{}",
        paid_at.format("%Y%m%d"),
        simple[..8].to_ascii_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pending(amount: Decimal, due: Option<NaiveDate>) -> Payment {
        Payment::new(
            NewPayment {
                hostel_id: HostelId::new(),
                payer_id: Uuid::new_v4(),
                student_id: None,
                booking_id: None,
                schedule_id: None,
                payment_type: PaymentType::Rent,
                amount,
                method: PaymentMethod::Upi,
                due_date: due,
                description: None,
                idempotency_key: None,
            },
            Currency::INR,
        )
        .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_amount_is_quantized_and_positive() {
        let payment = pending(dec!(8500.456), None);
        assert_eq!(payment.amount, dec!(8500.46));
        assert_eq!(payment.amount.scale(), 2);

        let zero = Payment::new(
            NewPayment {
                amount: dec!(0),
                ..nothing()
            },
            Currency::INR,
        );
        assert!(matches!(zero, Err(DomainError::NonPositiveAmount)));

        let negative = Payment::new(
            NewPayment {
                amount: dec!(-10),
                ..nothing()
            },
            Currency::INR,
        );
        assert!(matches!(negative, Err(DomainError::NegativeAmount)));
    }

    fn nothing() -> NewPayment {
        NewPayment {
            hostel_id: HostelId::new(),
            payer_id: Uuid::new_v4(),
            student_id: None,
            booking_id: None,
            schedule_id: None,
            payment_type: PaymentType::Other,
            amount: dec!(1),
            method: PaymentMethod::Cash,
            due_date: None,
            description: None,
            idempotency_key: None,
        }
    }

    #[test]
    fn test_overdue_only_when_open_and_past_due() {
        let today = date(2026, 3, 10);
        let mut payment = pending(dec!(100), Some(date(2026, 3, 9)));
        assert!(payment.is_overdue(today));
        assert_eq!(payment.days_overdue(today), 1);

        // Due today is not overdue.
        let due_today = pending(dec!(100), Some(today));
        assert!(!due_today.is_overdue(today));

        // No due date is never overdue.
        assert!(!pending(dec!(100), None).is_overdue(today));

        payment.mark_processing("order_1".into()).unwrap();
        assert!(payment.is_overdue(today));

        payment.complete(None, Some("pay_1".into()), Utc::now()).unwrap();
        assert!(!payment.is_overdue(today));
        assert_eq!(payment.days_overdue(today), 0);
    }

    #[test]
    fn test_completion_issues_receipt() {
        let mut payment = pending(dec!(100), None);
        let paid_at = "2026-03-10T09:00:00Z".parse::<DateTime<Utc>>().unwrap();
        payment
            .complete(Some("UTR123".into()), None, paid_at)
            .unwrap();
        let receipt = payment.receipt_number.clone().unwrap();
        assert!(receipt.starts_with("RCP-20260310-"));
        assert_eq!(receipt.len(), "RCP-20260310-".len() + 8);
        assert_eq!(payment.paid_at, Some(paid_at));
    }

    #[test]
    fn test_no_transition_back_to_pending_or_out_of_failed() {
        let mut payment = pending(dec!(100), None);
        payment.fail("card declined".into(), Utc::now()).unwrap();
        assert!(payment.complete(None, None, Utc::now()).is_err());
        assert!(payment.mark_processing("o".into()).is_err());
        assert!(!PaymentStatus::Completed.can_transition_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Processing.can_transition_to(PaymentStatus::Pending));
    }

    #[test]
    fn test_fail_requires_reason() {
        let mut payment = pending(dec!(100), None);
        assert!(payment.fail("  ".into(), Utc::now()).is_err());
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[test]
    fn test_partial_then_full_refund() {
        let mut payment = pending(dec!(100), None);
        payment.complete(None, None, Utc::now()).unwrap();

        assert!(!payment.apply_refund(dec!(40)).unwrap());
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.refundable_amount(dec!(0)), dec!(60.00));
        assert_eq!(payment.refundable_amount(dec!(60)), dec!(0));

        assert!(matches!(
            payment.apply_refund(dec!(60.01)),
            Err(DomainError::RefundExceedsPayment { .. })
        ));

        assert!(payment.apply_refund(dec!(60)).unwrap());
        assert_eq!(payment.status, PaymentStatus::Refunded);
        assert!(payment.apply_refund(dec!(1)).is_err());
    }

    #[test]
    fn test_refund_requires_completed_payment() {
        let mut payment = pending(dec!(100), None);
        assert!(matches!(
            payment.apply_refund(dec!(10)),
            Err(DomainError::InvalidTransition { .. })
        ));
    }
}
