//! Payment reminders.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::{HostelId, PaymentId, ReminderId};
use super::payment::Payment;

string_enum! {
    /// Why a reminder was sent.
    ReminderKind {
        Upcoming => "upcoming",
        DueToday => "due_today",
        Overdue => "overdue",
    }
}

/// A reminder recorded for a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Reminder {
    pub id: ReminderId,
    pub payment_id: PaymentId,
    pub hostel_id: HostelId,
    pub kind: ReminderKind,
    pub reminder_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    pub fn new(payment: &Payment, kind: ReminderKind, reminder_date: NaiveDate) -> Self {
        Self {
            id: ReminderId::new(),
            payment_id: payment.id,
            hostel_id: payment.hostel_id,
            kind,
            reminder_date,
            created_at: Utc::now(),
        }
    }
}

/// When reminders go out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPolicy {
    /// Days ahead of the due date an `upcoming` reminder is sent
    pub days_before: i64,
    /// Days between repeated `overdue` reminders
    pub overdue_repeat_days: i64,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            days_before: 3,
            overdue_repeat_days: 7,
        }
    }
}

impl ReminderPolicy {
    /// Decides which reminder, if any, `payment` needs on `today`.
    ///
    /// `history` is every reminder already recorded for the payment.
    /// `upcoming` and `due_today` go out once each; `overdue` repeats every
    /// `overdue_repeat_days`.
    pub fn decide(
        &self,
        payment: &Payment,
        today: NaiveDate,
        history: &[Reminder],
    ) -> Option<ReminderKind> {
        if !payment.status.is_open() {
            return None;
        }
        let due = payment.due_date?;
        let days_until = (due - today).num_days();

        let sent = |kind: ReminderKind| {
            history
                .iter()
                .filter(|r| r.payment_id == payment.id && r.kind == kind)
                .map(|r| r.reminder_date)
                .max()
        };

        match days_until {
            d if d > 0 && d <= self.days_before => {
                sent(ReminderKind::Upcoming).is_none().then_some(ReminderKind::Upcoming)
            }
            0 => sent(ReminderKind::DueToday)
                .is_none()
                .then_some(ReminderKind::DueToday),
            d if d < 0 => match sent(ReminderKind::Overdue) {
                None => Some(ReminderKind::Overdue),
                Some(last) if (today - last).num_days() >= self.overdue_repeat_days => {
                    Some(ReminderKind::Overdue)
                }
                Some(_) => None,
            },
            _ => None,
        }
    }
}
