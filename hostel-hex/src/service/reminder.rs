//! Payment reminders.
//!
//! Reminders are recorded and handed to the outbox as `payment.reminder`
//! events; delivery (email, SMS, ...) is the subscriber's business.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;

use hostel_types::{
    AppError, DispatchRemindersResponse, EventType, HostelId, HostelRepository, PaymentId,
    Principal, Reminder, ReminderPolicy, UnitOfWork,
};

use super::{event, load_payment};

pub struct PaymentReminderService<R: HostelRepository> {
    repo: Arc<R>,
    policy: ReminderPolicy,
}

impl<R: HostelRepository> PaymentReminderService<R> {
    pub fn new(repo: Arc<R>, policy: ReminderPolicy) -> Self {
        Self { repo, policy }
    }

    pub fn policy(&self) -> ReminderPolicy {
        self.policy
    }

    /// Records the reminders due on `today` and dispatches them through the outbox.
    pub async fn dispatch(
        &self,
        today: NaiveDate,
        hostel_id: Option<HostelId>,
    ) -> Result<DispatchRemindersResponse, AppError> {
        let open = self.repo.list_open_payments(hostel_id).await?;
        let mut uow = UnitOfWork::new();
        let mut reminders = Vec::new();

        for payment in open {
            let history = self.repo.list_reminders_for_payment(payment.id).await?;
            let Some(kind) = self.policy.decide(&payment, today, &history) else {
                continue;
            };

            let reminder = Reminder::new(&payment, kind, today);
            uow.insert_reminder(reminder.clone()).emit(event(
                EventType::PaymentReminder,
                &json!({
                    "reminder": &reminder,
                    "payment": &payment,
                    "days_overdue": payment.days_overdue(today),
                }),
            )?);
            reminders.push(reminder);
        }

        if !uow.is_empty() {
            self.repo.commit(uow).await?;
        }
        tracing::info!(%today, count = reminders.len(), "Payment reminders dispatched");

        Ok(DispatchRemindersResponse { today, reminders })
    }

    pub async fn list_for_payment(
        &self,
        principal: &Principal,
        payment_id: PaymentId,
    ) -> Result<Vec<Reminder>, AppError> {
        let payment = load_payment(self.repo.as_ref(), payment_id).await?;
        principal.ensure_hostel(payment.hostel_id)?;
        self.repo
            .list_reminders_for_payment(payment_id)
            .await
            .map_err(Into::into)
    }
}
