//! Booking domain model.

use chrono::{DateTime, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::ids::{BookingId, HostelId};
use super::lifecycle::{Lifecycle, ensure_transition};
use super::money::{Currency, Money, quantize};
use crate::error::DomainError;

/// Allowed difference between a quoted total and rent x duration.
pub const TOTAL_TOLERANCE: Decimal = dec!(0.01);

string_enum! {
    /// Booking workflow status.
    BookingStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Confirmed => "confirmed",
        CheckedIn => "checked_in",
        CheckedOut => "checked_out",
        Cancelled => "cancelled",
    }
}

impl Lifecycle for BookingStatus {
    const ENTITY: &'static str = "booking";

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::CheckedOut | BookingStatus::Rejected | BookingStatus::Cancelled
        )
    }

    fn can_transition_to(&self, next: Self) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Approved | Rejected | Confirmed | Cancelled)
                | (Approved, Confirmed | Cancelled)
                | (Confirmed, CheckedIn | Cancelled)
                | (CheckedIn, CheckedOut)
        )
    }
}

/// Validated input for a new booking.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub hostel_id: HostelId,
    pub student_id: Uuid,
    pub room_type: Option<String>,
    pub check_in_date: NaiveDate,
    pub stay_duration_months: u32,
    pub quoted_rent_monthly: Decimal,
    pub security_deposit: Decimal,
    pub advance_amount: Decimal,
    /// Quoted total; computed from rent x duration when absent
    pub total_amount: Option<Decimal>,
}

/// A reservation of a bed for a number of months.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Booking {
    pub id: BookingId,
    pub hostel_id: HostelId,
    pub student_id: Uuid,
    pub room_type: Option<String>,
    pub check_in_date: NaiveDate,
    pub stay_duration_months: u32,
    #[schema(value_type = String, example = "8500.00")]
    pub quoted_rent_monthly: Decimal,
    #[schema(value_type = String, example = "10000.00")]
    pub security_deposit: Decimal,
    #[schema(value_type = String, example = "5000.00")]
    pub advance_amount: Decimal,
    #[schema(value_type = String, example = "51000.00")]
    pub total_amount: Decimal,
    pub currency: Currency,
    pub status: BookingStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rent x duration, quantized.
pub fn expected_total(rent_monthly: Decimal, months: u32) -> Result<Decimal, DomainError> {
    rent_monthly
        .checked_mul(Decimal::from(months))
        .map(quantize)
        .ok_or(DomainError::AmountOutOfRange)
}

impl Booking {
    /// Creates a pending booking.
    ///
    /// # Validation
    /// - Duration of at least one month
    /// - Positive rent, non-negative deposit and advance
    /// - Advance no larger than the total
    /// - A quoted total within 0.01 of rent x duration
    pub fn new(input: NewBooking, currency: Currency) -> Result<Self, DomainError> {
        if input.stay_duration_months == 0 {
            return Err(DomainError::validation(
                "stay_duration_months must be at least 1",
            ));
        }

        let rent = Money::positive(input.quoted_rent_monthly, currency)?;
        let deposit = Money::new(input.security_deposit, currency)?;
        let advance = Money::new(input.advance_amount, currency)?;

        let expected = Money::new(
            expected_total(rent.amount(), input.stay_duration_months)?,
            currency,
        )?
        .amount();
        let total = match input.total_amount {
            Some(quoted) => {
                let quoted = Money::new(quoted, currency)?.amount();
                if (quoted - expected).abs() > TOTAL_TOLERANCE {
                    return Err(DomainError::BookingTotalMismatch {
                        expected,
                        got: quoted,
                    });
                }
                quoted
            }
            None => expected,
        };

        if advance.amount() > total {
            return Err(DomainError::validation(
                "advance_amount cannot exceed total_amount",
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: BookingId::new(),
            hostel_id: input.hostel_id,
            student_id: input.student_id,
            room_type: input.room_type.filter(|r| !r.trim().is_empty()),
            check_in_date: input.check_in_date,
            stay_duration_months: input.stay_duration_months,
            quoted_rent_monthly: rent.amount(),
            security_deposit: deposit.amount(),
            advance_amount: advance.amount(),
            total_amount: total,
            currency,
            status: BookingStatus::Pending,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Expected check-out date (check-in plus the stay duration).
    pub fn check_out_date(&self) -> Option<NaiveDate> {
        self.check_in_date
            .checked_add_months(Months::new(self.stay_duration_months))
    }

    /// Amount requested up front: the advance, or one month's rent without one.
    pub fn advance_due(&self) -> Decimal {
        if self.advance_amount.is_zero() {
            self.quoted_rent_monthly
        } else {
            self.advance_amount
        }
    }

    /// Moves the booking to a new status.
    pub fn transition(&mut self, to: BookingStatus) -> Result<(), DomainError> {
        ensure_transition(self.status, to)?;
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Whether a paid advance should confirm this booking.
    pub fn awaits_advance(&self) -> bool {
        matches!(self.status, BookingStatus::Pending | BookingStatus::Approved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(total: Option<Decimal>) -> NewBooking {
        NewBooking {
            hostel_id: HostelId::new(),
            student_id: Uuid::new_v4(),
            room_type: Some("double".into()),
            check_in_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            stay_duration_months: 6,
            quoted_rent_monthly: dec!(8500),
            security_deposit: dec!(10000),
            advance_amount: dec!(5000),
            total_amount: total,
        }
    }

    #[test]
    fn test_total_computed_when_absent() {
        let booking = Booking::new(input(None), Currency::INR).unwrap();
        assert_eq!(booking.total_amount, dec!(51000.00));
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[test]
    fn test_total_within_tolerance_is_accepted() {
        let booking = Booking::new(input(Some(dec!(51000.01))), Currency::INR).unwrap();
        assert_eq!(booking.total_amount, dec!(51000.01));
    }

    #[test]
    fn test_total_outside_tolerance_is_rejected() {
        let result = Booking::new(input(Some(dec!(51000.02))), Currency::INR);
        assert!(matches!(
            result,
            Err(DomainError::BookingTotalMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_duration_rejected() {
        let mut req = input(None);
        req.stay_duration_months = 0;
        assert!(Booking::new(req, Currency::INR).is_err());
    }

    #[test]
    fn test_advance_cannot_exceed_total() {
        let mut req = input(None);
        req.advance_amount = dec!(60000);
        assert!(Booking::new(req, Currency::INR).is_err());
    }

    #[test]
    fn test_check_out_date_clamps_month_end() {
        let booking = Booking::new(input(None), Currency::INR).unwrap();
        assert_eq!(
            booking.check_out_date(),
            NaiveDate::from_ymd_opt(2026, 7, 31)
        );
    }

    #[test]
    fn test_cancelled_booking_is_terminal() {
        let mut booking = Booking::new(input(None), Currency::INR).unwrap();
        booking.transition(BookingStatus::Cancelled).unwrap();
        assert!(booking.transition(BookingStatus::Confirmed).is_err());
    }

    #[test]
    fn test_pending_can_be_confirmed_by_advance() {
        let mut booking = Booking::new(input(None), Currency::INR).unwrap();
        assert!(booking.awaits_advance());
        booking.transition(BookingStatus::Confirmed).unwrap();
        booking.transition(BookingStatus::CheckedIn).unwrap();
        assert!(booking.transition(BookingStatus::Pending).is_err());
    }
}
