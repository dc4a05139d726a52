//! Port traits (interfaces for adapters).
//!
//! These are the contracts that adapters must implement.
//! The application layer depends on these traits, not concrete implementations.

mod gateway;
mod repository;
mod unit_of_work;

pub use gateway::{GatewayError, PaymentGateway};
pub use repository::HostelRepository;
pub use unit_of_work::UnitOfWork;
