use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use hostel_types::domain::quantize;
use hostel_types::{
    AppError, HostelId, HostelRepository, OverdueReport, PaymentListQuery, PaymentSummary,
    Principal, SummaryQuery,
};

use super::payment::PaymentService;
use super::{load_hostel, today};

/// Aggregate payment figures for a hostel.
pub struct PaymentReportingService<R: HostelRepository> {
    repo: Arc<R>,
    payments: PaymentService<R>,
}

impl<R: HostelRepository> PaymentReportingService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            payments: PaymentService::new(repo.clone()),
            repo,
        }
    }

    /// Collection summary. Collected and refunded figures are windowed by
    /// `from..=to`; pending and overdue figures are a snapshot as of `today`.
    pub async fn summary(
        &self,
        principal: &Principal,
        hostel_id: HostelId,
        query: SummaryQuery,
    ) -> Result<PaymentSummary, AppError> {
        principal.ensure_hostel(hostel_id)?;
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(AppError::BadRequest("from must not be after to".into()));
            }
        }
        let hostel = load_hostel(self.repo.as_ref(), hostel_id).await?;

        let payments = self
            .repo
            .list_payments(&PaymentListQuery {
                hostel_id: Some(hostel_id),
                ..Default::default()
            })
            .await?;
        let refunds = self.repo.list_refunds(hostel_id).await?;

        Ok(PaymentSummary::compute(
            hostel.id,
            hostel.currency,
            query.from,
            query.to,
            query.today.unwrap_or_else(today),
            &payments,
            &refunds,
        ))
    }

    pub async fn overdue_report(
        &self,
        principal: &Principal,
        hostel_id: HostelId,
        as_of: NaiveDate,
    ) -> Result<OverdueReport, AppError> {
        principal.ensure_hostel(hostel_id)?;
        let hostel = load_hostel(self.repo.as_ref(), hostel_id).await?;
        let payments = self.payments.list_overdue(principal, hostel_id, as_of).await?;
        let total: Decimal = payments.iter().map(|o| o.payment.amount).sum();

        Ok(OverdueReport {
            hostel_id,
            currency: hostel.currency,
            as_of,
            count: payments.len(),
            total_amount: quantize(total),
            payments,
        })
    }
}
