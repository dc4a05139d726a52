//! Change set applied by [`HostelRepository::commit`](super::HostelRepository::commit).

use crate::domain::{Booking, DomainEvent, Payment, PaymentSchedule, Refund, Reminder};

/// Everything one service operation writes.
///
/// Updated entities carry the version they were loaded with; the repository
/// stores them with `version + 1`.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    pub new_bookings: Vec<Booking>,
    pub updated_bookings: Vec<Booking>,
    pub new_payments: Vec<Payment>,
    pub updated_payments: Vec<Payment>,
    pub new_refunds: Vec<Refund>,
    pub updated_refunds: Vec<Refund>,
    pub new_schedules: Vec<PaymentSchedule>,
    pub updated_schedules: Vec<PaymentSchedule>,
    pub new_reminders: Vec<Reminder>,
    pub events: Vec<DomainEvent>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_booking(&mut self, booking: Booking) -> &mut Self {
        self.new_bookings.push(booking);
        self
    }

    pub fn update_booking(&mut self, booking: Booking) -> &mut Self {
        self.updated_bookings.push(booking);
        self
    }

    pub fn insert_payment(&mut self, payment: Payment) -> &mut Self {
        self.new_payments.push(payment);
        self
    }

    pub fn update_payment(&mut self, payment: Payment) -> &mut Self {
        self.updated_payments.push(payment);
        self
    }

    pub fn insert_refund(&mut self, refund: Refund) -> &mut Self {
        self.new_refunds.push(refund);
        self
    }

    pub fn update_refund(&mut self, refund: Refund) -> &mut Self {
        self.updated_refunds.push(refund);
        self
    }

    pub fn insert_schedule(&mut self, schedule: PaymentSchedule) -> &mut Self {
        self.new_schedules.push(schedule);
        self
    }

    pub fn update_schedule(&mut self, schedule: PaymentSchedule) -> &mut Self {
        self.updated_schedules.push(schedule);
        self
    }

    pub fn insert_reminder(&mut self, reminder: Reminder) -> &mut Self {
        self.new_reminders.push(reminder);
        self
    }

    pub fn emit(&mut self, event: DomainEvent) -> &mut Self {
        self.events.push(event);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.new_bookings.is_empty()
            && self.updated_bookings.is_empty()
            && self.new_payments.is_empty()
            && self.updated_payments.is_empty()
            && self.new_refunds.is_empty()
            && self.updated_refunds.is_empty()
            && self.new_schedules.is_empty()
            && self.updated_schedules.is_empty()
            && self.new_reminders.is_empty()
            && self.events.is_empty()
    }
}
