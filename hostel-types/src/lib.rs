//! # Hostel Types
//!
//! Domain types and port traits for the hostel payments service.
//! This crate has no IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate is the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Money, Booking, Payment, Refund, Ledger, ...)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain, repository and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    ApiKey, ApiKeyId, Booking, BookingId, BookingStatus, Currency, DomainEvent, EventType,
    Frequency, Hostel, HostelId, Ledger, LedgerEntry, Money, Payment, PaymentId, PaymentMethod,
    PaymentSchedule, PaymentStatus, PaymentSummary, PaymentType, Principal, Refund, RefundId,
    RefundStatus, Reminder, ReminderKind, ReminderPolicy, ScheduleId, ScheduleStatus,
    WebhookEndpoint, WebhookEndpointId, WebhookEvent, WebhookStatus,
};
pub use dto::*;
pub use error::{AppError, DomainError, RepoError};
pub use ports::{GatewayError, HostelRepository, PaymentGateway, UnitOfWork};
