//! Periodic background job: generate scheduled payments, then send reminders.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, instrument};

use hostel_hex::Services;
use hostel_types::{AppError, HostelRepository, PaymentGateway};

/// Outcome of one job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobReport {
    pub payments_generated: usize,
    pub reminders_sent: usize,
}

pub struct DueJobs<R: HostelRepository, G: PaymentGateway> {
    services: Services<R, G>,
    every: Duration,
}

impl<R: HostelRepository, G: PaymentGateway> DueJobs<R, G> {
    pub fn new(services: Services<R, G>, every: Duration) -> Self {
        Self { services, every }
    }

    /// Runs forever, one pass per tick. Failures are logged and retried next tick.
    pub async fn run(self) {
        info!(every_secs = self.every.as_secs(), "Starting due-payment job");
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once(Utc::now().date_naive()).await {
                error!("Due-payment job failed: {}", e);
            }
        }
    }

    /// Generates every installment due by `today`, then dispatches reminders
    /// so freshly generated payments are covered in the same pass.
    #[instrument(skip(self))]
    pub async fn run_once(&self, today: NaiveDate) -> Result<JobReport, AppError> {
        let generated = self
            .services
            .schedules
            .generate_due_payments(today, None)
            .await?;
        let reminders = self.services.reminders.dispatch(today, None).await?;

        let report = JobReport {
            payments_generated: generated.payments.len(),
            reminders_sent: reminders.reminders.len(),
        };
        if report != JobReport::default() {
            info!(
                payments = report.payments_generated,
                reminders = report.reminders_sent,
                "Due-payment job finished"
            );
        }
        Ok(report)
    }
}
