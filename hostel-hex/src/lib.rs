//! # Hostel Hex
//!
//! Application service layer and HTTP adapter for the hostel payments service.
//!
//! ## Architecture
//!
//! - `service/` - Application services (orchestrate domain operations)
//! - `inbound/` - HTTP adapter (Axum server)
//! - `openapi`  - OpenAPI document served at `/api-docs/openapi.json`
//!
//! Services are generic over `R: HostelRepository` and `G: PaymentGateway`,
//! allowing different adapters to be injected.

pub mod inbound;
pub mod openapi;
pub mod service;

#[cfg(all(test, feature = "sqlite"))]
mod service_tests;

pub use service::{
    AccessService, BookingService, HostelService, PaymentGatewayService, PaymentLedgerService,
    PaymentReminderService, PaymentReportingService, PaymentRequestService, PaymentScheduleService,
    PaymentService, RefundService, Services,
};
