//! HTTP Server configuration and startup.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use hostel_types::{HostelRepository, PaymentGateway};

use super::auth::auth_middleware;
use super::handlers::{
    self, AppState, access, bookings, gateway, hostels, payments, refunds, schedules,
};
use super::rate_limit::{RateLimiterState, rate_limit_middleware};
use crate::Services;

/// HTTP Server for the hostel payments API.
pub struct HttpServer<R: HostelRepository, G: PaymentGateway> {
    state: Arc<AppState<R, G>>,
    rate_limiter: Arc<RateLimiterState>,
}

impl<R: HostelRepository, G: PaymentGateway> HttpServer<R, G> {
    /// Creates a server with the default limit of 100 requests per minute per key.
    pub fn new(services: Services<R, G>) -> Self {
        Self {
            state: Arc::new(AppState { services }),
            rate_limiter: Arc::new(RateLimiterState::default()),
        }
    }

    /// Creates a new HTTP server with custom rate limiting.
    pub fn with_rate_limit(services: Services<R, G>, requests_per_minute: u32) -> Self {
        Self {
            state: Arc::new(AppState { services }),
            rate_limiter: Arc::new(RateLimiterState::new(
                requests_per_minute,
                Duration::from_secs(60),
            )),
        }
    }

    pub fn services(&self) -> &Services<R, G> {
        &self.state.services
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        // Build HTTP metrics layer (uses globally set MeterProvider)
        let metrics = axum_otel_metrics::HttpMetricsLayerBuilder::new().build();

        Router::new()
            .route("/health", get(handlers::health))
            .route("/api-docs/openapi.json", get(handlers::openapi_json))
            // access
            .route("/api/bootstrap", post(access::bootstrap::<R, G>))
            .route(
                "/api/keys",
                post(access::create_api_key::<R, G>).get(access::list_api_keys::<R, G>),
            )
            .route("/api/keys/{id}", delete(access::delete_api_key::<R, G>))
            .route(
                "/api/webhooks",
                post(access::register_webhook::<R, G>).get(access::list_webhooks::<R, G>),
            )
            // hostels
            .route(
                "/api/hostels",
                post(hostels::create_hostel::<R, G>).get(hostels::list_hostels::<R, G>),
            )
            .route("/api/hostels/{id}", get(hostels::get_hostel::<R, G>))
            .route("/api/hostels/{id}/bookings", get(hostels::list_bookings::<R, G>))
            .route(
                "/api/hostels/{id}/payments/overdue",
                get(hostels::list_overdue::<R, G>),
            )
            .route("/api/hostels/{id}/schedules", get(hostels::list_schedules::<R, G>))
            .route("/api/hostels/{id}/ledger", get(hostels::ledger::<R, G>))
            .route("/api/hostels/{id}/reports/summary", get(hostels::summary::<R, G>))
            .route(
                "/api/hostels/{id}/reports/overdue",
                get(hostels::overdue_report::<R, G>),
            )
            // bookings
            .route("/api/bookings", post(bookings::create_booking::<R, G>))
            .route("/api/bookings/{id}", get(bookings::get_booking::<R, G>))
            .route("/api/bookings/{id}/advance", post(bookings::request_advance::<R, G>))
            .route("/api/bookings/{id}/{action}", post(bookings::transition::<R, G>))
            // payments
            .route(
                "/api/payments",
                post(payments::create_payment::<R, G>).get(payments::list_payments::<R, G>),
            )
            .route("/api/payments/manual", post(payments::record_manual_payment::<R, G>))
            .route("/api/payments/verify", post(payments::verify_checkout::<R, G>))
            .route("/api/payments/{id}", get(payments::get_payment::<R, G>))
            .route("/api/payments/{id}/status", post(payments::update_status::<R, G>))
            .route("/api/payments/{id}/checkout", post(payments::checkout::<R, G>))
            .route("/api/payments/{id}/reminders", get(payments::list_reminders::<R, G>))
            .route(
                "/api/payments/{id}/refunds",
                post(refunds::request_refund::<R, G>).get(refunds::list_refunds::<R, G>),
            )
            // refunds
            .route("/api/refunds/{id}/process", post(refunds::process_refund::<R, G>))
            .route("/api/refunds/{id}/reject", post(refunds::reject_refund::<R, G>))
            // schedules
            .route("/api/schedules", post(schedules::create_schedule::<R, G>))
            .route("/api/schedules/generate", post(schedules::generate::<R, G>))
            .route("/api/schedules/{id}", get(schedules::get_schedule::<R, G>))
            .route("/api/schedules/{id}/{action}", post(schedules::transition::<R, G>))
            // reminders & gateway
            .route("/api/reminders/dispatch", post(payments::dispatch_reminders::<R, G>))
            .route("/api/gateway/webhook", post(gateway::gateway_webhook::<R, G>))
            .layer(metrics)
            .layer(middleware::from_fn_with_state(
                self.rate_limiter.clone(),
                rate_limit_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                auth_middleware::<R, G>,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Runs the server on the given address until Ctrl-C / SIGTERM.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        self.run_until(addr, shutdown_signal()).await
    }

    /// Runs the server until `shutdown` resolves, then drains in-flight requests.
    pub async fn run_until(
        self,
        addr: &str,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
