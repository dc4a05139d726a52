//! Column conversions shared by the SQLite and PostgreSQL adapters.
//!
//! Money is stored as signed minor units; enums as their string spelling.

#![cfg_attr(not(feature = "sqlite"), allow(dead_code))]

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use hostel_types::{Currency, DomainError, Money, RepoError};

/// Decimal amount -> minor units for a column.
pub fn to_minor(amount: Decimal, currency: Currency) -> Result<i64, RepoError> {
    Ok(Money::new(amount, currency)?.to_minor()?)
}

/// Minor units column -> decimal amount.
pub fn from_minor(minor: i64, currency: Currency) -> Result<Decimal, RepoError> {
    Ok(Money::from_minor(minor, currency)?.amount())
}

/// Parses a string column into a domain enum or id.
pub fn parse<T>(value: &str, column: &str) -> Result<T, RepoError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| RepoError::Database(format!("Invalid {column} '{value}': {e}")))
}

pub fn parse_opt<T>(value: Option<&str>, column: &str) -> Result<Option<T>, RepoError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.map(|v| parse(v, column)).transpose()
}

pub fn parse_currency(value: &str) -> Result<Currency, RepoError> {
    value
        .parse::<Currency>()
        .map_err(|e: DomainError| RepoError::Database(e.to_string()))
}

/// Fixed-width RFC 3339 so text columns sort chronologically.
#[cfg(feature = "sqlite")]
pub fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(feature = "sqlite")]
pub fn ts_opt(at: Option<DateTime<Utc>>) -> Option<String> {
    at.map(ts)
}

pub fn parse_ts(value: &str) -> Result<DateTime<Utc>, RepoError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepoError::Database(format!("Invalid timestamp '{value}': {e}")))
}

pub fn parse_ts_opt(value: Option<&str>) -> Result<Option<DateTime<Utc>>, RepoError> {
    value.map(parse_ts).transpose()
}

#[cfg(feature = "sqlite")]
pub fn date(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

#[cfg(feature = "sqlite")]
pub fn date_opt(value: Option<NaiveDate>) -> Option<String> {
    value.map(date)
}

pub fn parse_date(value: &str) -> Result<NaiveDate, RepoError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| RepoError::Database(format!("Invalid date '{value}': {e}")))
}

pub fn parse_date_opt(value: Option<&str>) -> Result<Option<NaiveDate>, RepoError> {
    value.map(parse_date).transpose()
}

/// Maps a driver error, turning unique violations into conflicts.
pub fn db_err(err: sqlx::Error) -> RepoError {
    if let Some(db) = err.as_database_error() {
        if db.is_unique_violation() {
            return RepoError::Conflict(db.message().to_string());
        }
    }
    RepoError::Database(err.to_string())
}

pub fn tx_err(err: sqlx::Error) -> RepoError {
    RepoError::Transaction(err.to_string())
}

/// A versioned update that matched no row.
pub fn stale(entity: &str, id: impl std::fmt::Display) -> RepoError {
    RepoError::Conflict(format!(
        "{entity} {id} was modified concurrently or no longer exists"
    ))
}
