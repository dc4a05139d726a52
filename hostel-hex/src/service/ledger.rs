use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;

use hostel_types::domain::{LedgerRecord, LedgerScope};
use hostel_types::{
    AppError, HostelId, HostelRepository, Ledger, LedgerQuery, Money, PaymentListQuery, Principal,
};

use super::load_hostel;

/// Derived, non-persisted ledger replayed from payment and refund records.
pub struct PaymentLedgerService<R: HostelRepository> {
    repo: Arc<R>,
}

impl<R: HostelRepository> PaymentLedgerService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn ledger(
        &self,
        principal: &Principal,
        hostel_id: HostelId,
        query: LedgerQuery,
    ) -> Result<Ledger, AppError> {
        principal.ensure_hostel(hostel_id)?;
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(AppError::BadRequest("from must not be after to".into()));
            }
        }
        let hostel = load_hostel(self.repo.as_ref(), hostel_id).await?;
        let opening_balance = query.opening_balance.unwrap_or(Decimal::ZERO);
        // may be negative, but must stay within the storable range
        Money::new(opening_balance.abs(), hostel.currency)?;

        let payments = self
            .repo
            .list_payments(&PaymentListQuery {
                hostel_id: Some(hostel_id),
                student_id: query.student_id,
                ..Default::default()
            })
            .await?;
        let in_scope: HashSet<_> = payments.iter().map(|p| p.id).collect();
        let refunds = self.repo.list_refunds(hostel_id).await?;

        let records: Vec<LedgerRecord> = payments
            .iter()
            .filter_map(LedgerRecord::from_payment)
            .chain(
                refunds
                    .iter()
                    .filter(|r| in_scope.contains(&r.payment_id))
                    .filter_map(LedgerRecord::from_refund),
            )
            .collect();

        let ledger = Ledger::replay(
            LedgerScope {
                hostel_id,
                student_id: query.student_id,
                currency: hostel.currency,
                opening_balance,
                from: query.from,
                to: query.to,
            },
            records,
        );
        tracing::debug!(
            %hostel_id,
            entries = ledger.entries.len(),
            closing = %ledger.closing_balance,
            "Ledger replayed"
        );
        Ok(ledger)
    }
}
