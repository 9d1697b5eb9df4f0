//! HTTP Server configuration and startup.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use settlements_types::PaymentRepository;

use super::handlers::{self, AppState};
use super::rate_limit::{RateLimiterState, rate_limit_middleware};
use crate::SettlementService;
use crate::openapi::ApiDoc;

/// HTTP Server for the Settlements API.
pub struct HttpServer<R: PaymentRepository> {
    state: Arc<AppState<R>>,
    rate_limiter: Arc<RateLimiterState>,
}

impl<R: PaymentRepository> HttpServer<R> {
    /// Creates a new HTTP server with the given service.
    pub fn new(service: SettlementService<R>) -> Self {
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(RateLimiterState::default()), // 100 req/min default
        }
    }

    /// Creates a new HTTP server with custom rate limiting.
    pub fn with_rate_limit(service: SettlementService<R>, requests_per_minute: u32) -> Self {
        use std::time::Duration;
        Self {
            state: Arc::new(AppState { service }),
            rate_limiter: Arc::new(RateLimiterState::new(
                requests_per_minute,
                Duration::from_secs(60),
            )),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route(
                "/api/v1/payments/checkout-session",
                post(handlers::create_subscription_checkout::<R>),
            )
            .route(
                "/api/v1/payments/verify/{session_id}",
                get(handlers::verify_checkout::<R>),
            )
            .route(
                "/api/v1/payments/complete-upgrade",
                post(handlers::complete_upgrade::<R>),
            )
            .route(
                "/api/v1/payments/refund",
                post(handlers::refund_subscription::<R>),
            )
            .route(
                "/api/v1/payments/{provider}/{transaction_ref}",
                get(handlers::payment_status::<R>),
            )
            .route(
                "/api/v1/service-payments/checkout",
                post(handlers::create_service_checkout::<R>),
            )
            .route(
                "/api/v1/service-payments/complete",
                post(handlers::complete_service_payment::<R>),
            )
            .route(
                "/api/v1/service-payments/{id}/refund",
                post(handlers::refund_service_payment::<R>),
            )
            .route(
                "/api/v1/service-payments/by-work-order/{work_order_id}",
                get(handlers::service_payment_by_work_order::<R>),
            )
            .route("/api/v1/plans", get(handlers::list_plans::<R>))
            .route("/api/v1/plans/{plan_id}", get(handlers::get_plan::<R>))
            .route("/api/v1/plans/upgrade", post(handlers::upgrade_plan::<R>))
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
            .layer(middleware::from_fn_with_state(
                self.rate_limiter.clone(),
                rate_limit_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
