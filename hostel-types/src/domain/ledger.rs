//! Derived payment ledger.
//!
//! Nothing here is persisted. The ledger is rebuilt on every request by
//! replaying payment and refund records in date order, from the hostel's
//! cash-account perspective: money received is a debit, money refunded is a
//! credit.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::ids::{HostelId, PaymentId};
use super::money::{Currency, quantize};
use super::payment::Payment;
use super::refund::{Refund, RefundStatus};

string_enum! {
    /// Source of a ledger line.
    EntryKind {
        Payment => "payment",
        Refund => "refund",
    }
}

impl EntryKind {
    fn sort_rank(&self) -> u8 {
        match self {
            EntryKind::Payment => 0,
            EntryKind::Refund => 1,
        }
    }
}

/// A dated money movement fed into the replay.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRecord {
    pub occurred_at: DateTime<Utc>,
    pub kind: EntryKind,
    pub reference_id: Uuid,
    pub payment_id: PaymentId,
    pub description: String,
    pub amount: Decimal,
}

impl LedgerRecord {
    /// A received payment (completed, or refunded since).
    pub fn from_payment(payment: &Payment) -> Option<Self> {
        if !payment.status.is_collected() {
            return None;
        }
        let paid_at = payment.paid_at?;
        Some(Self {
            occurred_at: paid_at,
            kind: EntryKind::Payment,
            reference_id: payment.id.into_uuid(),
            payment_id: payment.id,
            description: match &payment.receipt_number {
                Some(receipt) => format!("{} payment {}", payment.payment_type, receipt),
                None => format!("{} payment", payment.payment_type),
            },
            amount: payment.amount,
        })
    }

    /// A processed refund.
    pub fn from_refund(refund: &Refund) -> Option<Self> {
        if refund.status != RefundStatus::Processed {
            return None;
        }
        Some(Self {
            occurred_at: refund.processed_at?,
            kind: EntryKind::Refund,
            reference_id: refund.id.into_uuid(),
            payment_id: refund.payment_id,
            description: format!("refund: {}", refund.reason),
            amount: refund.amount,
        })
    }

    fn debit(&self) -> Decimal {
        match self.kind {
            EntryKind::Payment => self.amount,
            EntryKind::Refund => Decimal::ZERO,
        }
    }

    fn credit(&self) -> Decimal {
        match self.kind {
            EntryKind::Payment => Decimal::ZERO,
            EntryKind::Refund => self.amount,
        }
    }
}

/// One line of a replayed ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LedgerEntry {
    pub occurred_at: DateTime<Utc>,
    pub kind: EntryKind,
    pub reference_id: Uuid,
    pub payment_id: PaymentId,
    pub description: String,
    #[schema(value_type = String)]
    pub debit: Decimal,
    #[schema(value_type = String)]
    pub credit: Decimal,
    /// Running balance after this entry
    #[schema(value_type = String)]
    pub balance: Decimal,
}

/// What to replay and over which window.
#[derive(Debug, Clone)]
pub struct LedgerScope {
    pub hostel_id: HostelId,
    pub student_id: Option<Uuid>,
    pub currency: Currency,
    pub opening_balance: Decimal,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// A replayed ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Ledger {
    pub hostel_id: HostelId,
    pub student_id: Option<Uuid>,
    pub currency: Currency,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[schema(value_type = String)]
    pub opening_balance: Decimal,
    #[schema(value_type = String)]
    pub total_debits: Decimal,
    #[schema(value_type = String)]
    pub total_credits: Decimal,
    #[schema(value_type = String)]
    pub closing_balance: Decimal,
    pub entries: Vec<LedgerEntry>,
}

impl Ledger {
    /// Replays `records` in date order.
    ///
    /// Records dated before `scope.from` fold into the opening balance;
    /// records dated after `scope.to` are ignored.
    pub fn replay(scope: LedgerScope, mut records: Vec<LedgerRecord>) -> Self {
        records.sort_by(|a, b| {
            a.occurred_at
                .cmp(&b.occurred_at)
                .then(a.kind.sort_rank().cmp(&b.kind.sort_rank()))
                .then(a.reference_id.cmp(&b.reference_id))
        });

        let mut opening = quantize(scope.opening_balance);
        let mut balance = opening;
        let mut total_debits = Decimal::ZERO;
        let mut total_credits = Decimal::ZERO;
        let mut entries = Vec::new();

        for record in records {
            let day = record.occurred_at.date_naive();
            if scope.to.is_some_and(|to| day > to) {
                continue;
            }
            let (debit, credit) = (record.debit(), record.credit());

            if scope.from.is_some_and(|from| day < from) {
                opening += debit - credit;
                balance = opening;
                continue;
            }

            total_debits += debit;
            total_credits += credit;
            balance += debit - credit;
            entries.push(LedgerEntry {
                occurred_at: record.occurred_at,
                kind: record.kind,
                reference_id: record.reference_id,
                payment_id: record.payment_id,
                description: record.description,
                debit: quantize(debit),
                credit: quantize(credit),
                balance: quantize(balance),
            });
        }

        Self {
            hostel_id: scope.hostel_id,
            student_id: scope.student_id,
            currency: scope.currency,
            from: scope.from,
            to: scope.to,
            opening_balance: quantize(opening),
            total_debits: quantize(total_debits),
            total_credits: quantize(total_credits),
            closing_balance: quantize(balance),
            entries,
        }
    }

    /// closing = opening + debits - credits, and every running balance agrees.
    pub fn is_balanced(&self) -> bool {
        let mut running = self.opening_balance;
        for entry in &self.entries {
            running += entry.debit - entry.credit;
            if running != entry.balance {
                return false;
            }
        }
        running == self.closing_balance
            && self.closing_balance
                == self.opening_balance + self.total_debits - self.total_credits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(kind: EntryKind, at: &str, amount: Decimal) -> LedgerRecord {
        LedgerRecord {
            occurred_at: at.parse().unwrap(),
            kind,
            reference_id: Uuid::new_v4(),
            payment_id: PaymentId::new(),
            description: kind.to_string(),
            amount,
        }
    }

    fn scope(opening: Decimal, from: Option<NaiveDate>, to: Option<NaiveDate>) -> LedgerScope {
        LedgerScope {
            hostel_id: HostelId::new(),
            student_id: None,
            currency: Currency::INR,
            opening_balance: opening,
            from,
            to,
        }
    }

    #[test]
    fn test_replay_orders_by_date_and_balances() {
        let records = vec![
            record(EntryKind::Refund, "2026-02-10T10:00:00Z", dec!(1500)),
            record(EntryKind::Payment, "2026-01-05T10:00:00Z", dec!(8500)),
            record(EntryKind::Payment, "2026-02-05T10:00:00Z", dec!(8500)),
        ];

        let ledger = Ledger::replay(scope(dec!(1000), None, None), records);

        assert_eq!(ledger.entries.len(), 3);
        assert_eq!(ledger.entries[0].balance, dec!(9500.00));
        assert_eq!(ledger.entries[1].balance, dec!(18000.00));
        assert_eq!(ledger.entries[2].balance, dec!(16500.00));
        assert_eq!(ledger.total_debits, dec!(17000.00));
        assert_eq!(ledger.total_credits, dec!(1500.00));
        assert_eq!(
            ledger.closing_balance,
            ledger.opening_balance + ledger.total_debits - ledger.total_credits
        );
        assert!(ledger.is_balanced());
    }

    #[test]
    fn test_records_before_window_fold_into_opening() {
        let records = vec![
            record(EntryKind::Payment, "2026-01-05T10:00:00Z", dec!(8500)),
            record(EntryKind::Refund, "2026-01-20T10:00:00Z", dec!(500)),
            record(EntryKind::Payment, "2026-02-05T10:00:00Z", dec!(8500)),
            record(EntryKind::Payment, "2026-03-05T10:00:00Z", dec!(8500)),
        ];
        let from = NaiveDate::from_ymd_opt(2026, 2, 1);
        let to = NaiveDate::from_ymd_opt(2026, 2, 28);

        let ledger = Ledger::replay(scope(dec!(0), from, to), records);

        assert_eq!(ledger.opening_balance, dec!(8000.00));
        assert_eq!(ledger.entries.len(), 1);
        assert_eq!(ledger.closing_balance, dec!(16500.00));
        assert!(ledger.is_balanced());
    }

    #[test]
    fn test_same_instant_payment_before_refund() {
        let at = "2026-01-05T10:00:00Z";
        let records = vec![
            record(EntryKind::Refund, at, dec!(100)),
            record(EntryKind::Payment, at, dec!(100)),
        ];
        let ledger = Ledger::replay(scope(dec!(0), None, None), records);
        assert_eq!(ledger.entries[0].kind, EntryKind::Payment);
        assert_eq!(ledger.entries[0].balance, dec!(100.00));
        assert_eq!(ledger.closing_balance, dec!(0.00));
    }

    #[test]
    fn test_empty_ledger_keeps_opening() {
        let ledger = Ledger::replay(scope(dec!(-250.5), None, None), vec![]);
        assert_eq!(ledger.opening_balance, dec!(-250.50));
        assert_eq!(ledger.closing_balance, dec!(-250.50));
        assert!(ledger.is_balanced());
    }

    #[test]
    fn test_many_records_reproduce_closing_exactly() {
        let mut records = Vec::new();
        for day in 1..=28u32 {
            let at = format!("2026-02-{day:02}T08:00:00Z");
            records.push(record(EntryKind::Payment, &at, dec!(333.33)));
            if day % 3 == 0 {
                records.push(record(EntryKind::Refund, &at, dec!(111.11)));
            }
        }
        let ledger = Ledger::replay(scope(dec!(0.01), None, None), records);
        assert_eq!(ledger.total_debits, dec!(9333.24));
        assert_eq!(ledger.total_credits, dec!(999.99));
        assert_eq!(ledger.closing_balance, dec!(8333.26));
        assert!(ledger.is_balanced());
    }
}
