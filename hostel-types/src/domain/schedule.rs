//! Recurring payment schedules.

use chrono::{DateTime, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::ids::{BookingId, HostelId, ScheduleId};
use super::lifecycle::{Lifecycle, ensure_transition};
use super::money::{Currency, Money};
use super::payment::{NewPayment, PaymentMethod, PaymentType};
use crate::error::DomainError;

/// Upper bound on installments generated for one schedule in a single run.
pub const MAX_INSTALLMENTS_PER_RUN: usize = 120;

string_enum! {
    /// How often a schedule falls due.
    Frequency {
        Monthly => "monthly",
        Quarterly => "quarterly",
        HalfYearly => "half_yearly",
        Yearly => "yearly",
    }
}

impl Frequency {
    pub fn months(&self) -> u32 {
        match self {
            Frequency::Monthly => 1,
            Frequency::Quarterly => 3,
            Frequency::HalfYearly => 6,
            Frequency::Yearly => 12,
        }
    }
}

string_enum! {
    /// Schedule status.
    ScheduleStatus {
        Active => "active",
        Paused => "paused",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

impl Lifecycle for ScheduleStatus {
    const ENTITY: &'static str = "schedule";

    fn is_terminal(&self) -> bool {
        matches!(self, ScheduleStatus::Completed | ScheduleStatus::Cancelled)
    }

    fn can_transition_to(&self, next: Self) -> bool {
        use ScheduleStatus::*;
        matches!(
            (self, next),
            (Active, Paused | Completed | Cancelled) | (Paused, Active | Cancelled)
        )
    }
}

/// Validated input for a new schedule.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub hostel_id: HostelId,
    pub payer_id: Uuid,
    pub student_id: Option<Uuid>,
    pub booking_id: Option<BookingId>,
    pub payment_type: PaymentType,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
}

/// A recurring charge that generates pending payments as they fall due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentSchedule {
    pub id: ScheduleId,
    pub hostel_id: HostelId,
    pub payer_id: Uuid,
    pub student_id: Option<Uuid>,
    pub booking_id: Option<BookingId>,
    pub payment_type: PaymentType,
    #[schema(value_type = String, example = "8500.00")]
    pub amount: Decimal,
    pub currency: Currency,
    /// Stamped on every generated installment
    pub method: PaymentMethod,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub next_due_date: NaiveDate,
    /// Installments generated so far; the next one is `start + n * frequency`
    pub installments_generated: u32,
    pub status: ScheduleStatus,
    pub description: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentSchedule {
    pub fn new(input: NewSchedule, currency: Currency) -> Result<Self, DomainError> {
        let amount = Money::positive(input.amount, currency)?;
        if let Some(end) = input.end_date {
            if end < input.start_date {
                return Err(DomainError::validation(
                    "end_date cannot be before start_date",
                ));
            }
        }

        let now = Utc::now();
        Ok(Self {
            id: ScheduleId::new(),
            hostel_id: input.hostel_id,
            payer_id: input.payer_id,
            student_id: input.student_id,
            booking_id: input.booking_id,
            payment_type: input.payment_type,
            amount: amount.amount(),
            currency,
            method: input.method,
            frequency: input.frequency,
            start_date: input.start_date,
            end_date: input.end_date,
            next_due_date: input.start_date,
            installments_generated: 0,
            status: ScheduleStatus::Active,
            description: input.description,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Due date of the `index`-th installment (0-based).
    ///
    /// Counted from `start_date` every time so month-end dates clamp
    /// without drifting (Jan 31 -> Feb 28 -> Mar 31).
    pub fn due_date_for(&self, index: u32) -> Option<NaiveDate> {
        let months = index.checked_mul(self.frequency.months())?;
        self.start_date.checked_add_months(Months::new(months))
    }

    fn within_end(&self, date: NaiveDate) -> bool {
        self.end_date.is_none_or(|end| date <= end)
    }

    /// Consumes every due date up to and including `as_of`.
    ///
    /// Advances `next_due_date` and completes the schedule once the next
    /// date falls after `end_date`.
    pub fn take_due_dates(&mut self, as_of: NaiveDate) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        if self.status != ScheduleStatus::Active {
            return dates;
        }

        while self.next_due_date <= as_of
            && self.within_end(self.next_due_date)
            && dates.len() < MAX_INSTALLMENTS_PER_RUN
        {
            dates.push(self.next_due_date);
            self.installments_generated += 1;
            match self.due_date_for(self.installments_generated) {
                Some(next) => self.next_due_date = next,
                None => {
                    self.status = ScheduleStatus::Completed;
                    break;
                }
            }
        }

        if !self.within_end(self.next_due_date) {
            self.status = ScheduleStatus::Completed;
        }
        if !dates.is_empty() || self.status == ScheduleStatus::Completed {
            self.updated_at = Utc::now();
        }
        dates
    }

    /// Next `count` due dates without consuming them.
    pub fn upcoming(&self, count: usize) -> Vec<NaiveDate> {
        (self.installments_generated..)
            .map_while(|i| self.due_date_for(i))
            .take_while(|d| self.within_end(*d))
            .take(count)
            .collect()
    }

    /// Pending payment input for one due date.
    pub fn installment(&self, due_date: NaiveDate) -> NewPayment {
        NewPayment {
            hostel_id: self.hostel_id,
            payer_id: self.payer_id,
            student_id: self.student_id,
            booking_id: self.booking_id,
            schedule_id: Some(self.id),
            payment_type: self.payment_type,
            amount: self.amount,
            method: self.method,
            due_date: Some(due_date),
            description: Some(match &self.description {
                Some(desc) => format!("{desc} ({due_date})"),
                None => format!("{} due {due_date}", self.payment_type),
            }),
            idempotency_key: Some(format!("schedule:{}:{}", self.id, due_date)),
        }
    }

    pub fn pause(&mut self) -> Result<(), DomainError> {
        self.set_status(ScheduleStatus::Paused)
    }

    /// Resumes a paused schedule. Dates that fell due while paused are skipped.
    pub fn resume(&mut self, today: NaiveDate) -> Result<(), DomainError> {
        self.set_status(ScheduleStatus::Active)?;
        while self.next_due_date < today {
            self.installments_generated += 1;
            match self.due_date_for(self.installments_generated) {
                Some(next) => self.next_due_date = next,
                None => break,
            }
        }
        if !self.within_end(self.next_due_date) {
            self.status = ScheduleStatus::Completed;
        }
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), DomainError> {
        self.set_status(ScheduleStatus::Cancelled)
    }

    fn set_status(&mut self, to: ScheduleStatus) -> Result<(), DomainError> {
        ensure_transition(self.status, to)?;
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn schedule(start: NaiveDate, end: Option<NaiveDate>, frequency: Frequency) -> PaymentSchedule {
        PaymentSchedule::new(
            NewSchedule {
                hostel_id: HostelId::new(),
                payer_id: Uuid::new_v4(),
                student_id: None,
                booking_id: None,
                payment_type: PaymentType::Rent,
                amount: dec!(8500),
                method: PaymentMethod::BankTransfer,
                frequency,
                start_date: start,
                end_date: end,
                description: Some("Monthly rent".into()),
            },
            Currency::INR,
        )
        .unwrap()
    }

    #[test]
    fn test_installment_carries_schedule_method() {
        let s = schedule(date(2026, 1, 1), None, Frequency::Monthly);
        let due = s.installment(date(2026, 2, 1));
        assert_eq!(due.method, PaymentMethod::BankTransfer);
        assert_eq!(due.schedule_id, Some(s.id));
        assert_eq!(due.idempotency_key, Some(format!("schedule:{}:2026-02-01", s.id)));
    }

    #[test]
    fn test_month_end_dates_do_not_drift() {
        let s = schedule(date(2026, 1, 31), None, Frequency::Monthly);
        assert_eq!(
            s.upcoming(4),
            vec![
                date(2026, 1, 31),
                date(2026, 2, 28),
                date(2026, 3, 31),
                date(2026, 4, 30)
            ]
        );
    }

    #[test]
    fn test_take_due_dates_catches_up_and_advances() {
        let mut s = schedule(date(2026, 1, 1), None, Frequency::Monthly);
        let dates = s.take_due_dates(date(2026, 3, 15));
        assert_eq!(dates, vec![date(2026, 1, 1), date(2026, 2, 1), date(2026, 3, 1)]);
        assert_eq!(s.next_due_date, date(2026, 4, 1));
        assert!(s.take_due_dates(date(2026, 3, 31)).is_empty());
    }

    #[test]
    fn test_schedule_completes_after_end_date() {
        let mut s = schedule(date(2026, 1, 1), Some(date(2026, 6, 30)), Frequency::Quarterly);
        let dates = s.take_due_dates(date(2027, 1, 1));
        assert_eq!(dates, vec![date(2026, 1, 1), date(2026, 4, 1)]);
        assert_eq!(s.status, ScheduleStatus::Completed);
    }

    #[test]
    fn test_end_before_start_rejected() {
        let result = PaymentSchedule::new(
            NewSchedule {
                hostel_id: HostelId::new(),
                payer_id: Uuid::new_v4(),
                student_id: None,
                booking_id: None,
                payment_type: PaymentType::Rent,
                amount: dec!(100),
                method: PaymentMethod::Upi,
                frequency: Frequency::Monthly,
                start_date: date(2026, 5, 1),
                end_date: Some(date(2026, 4, 1)),
                description: None,
            },
            Currency::INR,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_paused_schedule_generates_nothing_and_resume_skips() {
        let mut s = schedule(date(2026, 1, 1), None, Frequency::Monthly);
        s.pause().unwrap();
        assert!(s.take_due_dates(date(2026, 4, 1)).is_empty());

        s.resume(date(2026, 4, 10)).unwrap();
        assert_eq!(s.next_due_date, date(2026, 5, 1));
        assert_eq!(s.take_due_dates(date(2026, 5, 1)), vec![date(2026, 5, 1)]);
    }

    #[test]
    fn test_cancelled_schedule_is_terminal() {
        let mut s = schedule(date(2026, 1, 1), None, Frequency::Yearly);
        s.cancel().unwrap();
        assert!(s.resume(date(2026, 1, 1)).is_err());
        assert!(s.pause().is_err());
    }

    #[test]
    fn test_installment_is_idempotent_per_due_date() {
        let s = schedule(date(2026, 1, 1), None, Frequency::Monthly);
        let a = s.installment(date(2026, 2, 1));
        let b = s.installment(date(2026, 2, 1));
        assert_eq!(a.idempotency_key, b.idempotency_key);
        assert_eq!(a.schedule_id, Some(s.id));
        assert_eq!(a.due_date, Some(date(2026, 2, 1)));
    }
}
