//! Aggregate payment reporting.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::HostelId;
use super::money::{Currency, quantize};
use super::payment::Payment;
use super::refund::{Refund, RefundStatus};

/// Count and amount for one grouping key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AmountByKey {
    pub key: String,
    pub count: u64,
    #[schema(value_type = String)]
    pub amount: Decimal,
}

/// Collection summary for a hostel over a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentSummary {
    pub hostel_id: HostelId,
    pub currency: Currency,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub as_of: NaiveDate,
    /// Payments received in the period, including ones refunded since
    #[schema(value_type = String)]
    pub total_collected: Decimal,
    #[schema(value_type = String)]
    pub total_refunded: Decimal,
    #[schema(value_type = String)]
    pub net_collected: Decimal,
    /// Outstanding pending and processing payments
    #[schema(value_type = String)]
    pub pending_amount: Decimal,
    #[schema(value_type = String)]
    pub overdue_amount: Decimal,
    pub overdue_count: u64,
    /// collected / (collected + pending) x 100
    #[schema(value_type = String)]
    pub collection_rate: Decimal,
    /// Payments created in the period, by status
    pub by_status: Vec<AmountByKey>,
    /// Collected amounts by payment method
    pub by_method: Vec<AmountByKey>,
    /// Collected amounts by payment type
    pub by_type: Vec<AmountByKey>,
}

fn in_window(at: DateTime<Utc>, from: Option<NaiveDate>, to: Option<NaiveDate>) -> bool {
    let day = at.date_naive();
    from.is_none_or(|f| day >= f) && to.is_none_or(|t| day <= t)
}

fn bump(groups: &mut BTreeMap<String, (u64, Decimal)>, key: &str, amount: Decimal) {
    let entry = groups.entry(key.to_string()).or_insert((0, Decimal::ZERO));
    entry.0 += 1;
    entry.1 += amount;
}

fn flatten(groups: BTreeMap<String, (u64, Decimal)>) -> Vec<AmountByKey> {
    groups
        .into_iter()
        .map(|(key, (count, amount))| AmountByKey {
            key,
            count,
            amount: quantize(amount),
        })
        .collect()
}

impl PaymentSummary {
    /// Builds the summary from every payment and refund of one hostel.
    pub fn compute(
        hostel_id: HostelId,
        currency: Currency,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        today: NaiveDate,
        payments: &[Payment],
        refunds: &[Refund],
    ) -> Self {
        let mut collected = Decimal::ZERO;
        let mut pending = Decimal::ZERO;
        let mut overdue = Decimal::ZERO;
        let mut overdue_count = 0u64;
        let mut by_status = BTreeMap::new();
        let mut by_method = BTreeMap::new();
        let mut by_type = BTreeMap::new();

        for payment in payments.iter().filter(|p| p.hostel_id == hostel_id) {
            if in_window(payment.created_at, from, to) {
                bump(&mut by_status, payment.status.as_str(), payment.amount);
            }

            if payment.status.is_collected() {
                if payment.paid_at.is_some_and(|at| in_window(at, from, to)) {
                    collected += payment.amount;
                    bump(&mut by_method, payment.method.as_str(), payment.amount);
                    bump(&mut by_type, payment.payment_type.as_str(), payment.amount);
                }
            }

            if payment.status.is_open() {
                pending += payment.amount;
                if payment.is_overdue(today) {
                    overdue += payment.amount;
                    overdue_count += 1;
                }
            }
        }

        let refunded: Decimal = refunds
            .iter()
            .filter(|r| r.hostel_id == hostel_id && r.status == RefundStatus::Processed)
            .filter(|r| r.processed_at.is_some_and(|at| in_window(at, from, to)))
            .map(|r| r.amount)
            .sum();

        let denominator = collected + pending;
        let collection_rate = if denominator.is_zero() {
            Decimal::ZERO
        } else {
            quantize(collected / denominator * dec!(100))
        };

        Self {
            hostel_id,
            currency,
            from,
            to,
            as_of: today,
            total_collected: quantize(collected),
            total_refunded: quantize(refunded),
            net_collected: quantize(collected - refunded),
            pending_amount: quantize(pending),
            overdue_amount: quantize(overdue),
            overdue_count,
            collection_rate,
            by_status: flatten(by_status),
            by_method: flatten(by_method),
            by_type: flatten(by_type),
        }
    }
}
