//! Hostel (tenant unit) domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ids::HostelId;
use super::money::Currency;
use crate::error::DomainError;

/// A managed residential property. Every financial record belongs to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Hostel {
    pub id: HostelId,
    #[schema(example = "Green Park Boys Hostel")]
    pub name: String,
    /// Currency used for every payment of this hostel
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

impl Hostel {
    /// Creates a new hostel.
    ///
    /// # Validation
    /// - Name cannot be empty
    pub fn new(name: String, currency: Currency) -> Result<Self, DomainError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("Hostel name cannot be empty"));
        }

        Ok(Self {
            id: HostelId::new(),
            name,
            currency,
            created_at: Utc::now(),
        })
    }

    /// Rejects money in a currency other than the hostel's.
    pub fn ensure_currency(&self, currency: Currency) -> Result<(), DomainError> {
        if currency != self.currency {
            return Err(DomainError::CurrencyMismatch {
                expected: self.currency,
                got: currency,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostel_creation_trims_name() {
        let hostel = Hostel::new("  Sunrise PG ".into(), Currency::INR).unwrap();
        assert_eq!(hostel.name, "Sunrise PG");
    }

    #[test]
    fn test_empty_name_fails() {
        assert!(matches!(
            Hostel::new("   ".into(), Currency::INR),
            Err(DomainError::ValidationError(_))
        ));
    }

    #[test]
    fn test_currency_guard() {
        let hostel = Hostel::new("Sunrise".into(), Currency::INR).unwrap();
        assert!(hostel.ensure_currency(Currency::INR).is_ok());
        assert!(hostel.ensure_currency(Currency::USD).is_err());
    }
}
