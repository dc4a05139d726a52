//! HTTP Inbound Adapter
//!
//! Axum-based HTTP server that drives the application services.

mod auth;
mod error;
mod handlers;
mod rate_limit;
mod server;

pub use error::ApiError;
pub use rate_limit::RateLimiterState;
pub use server::HttpServer;
