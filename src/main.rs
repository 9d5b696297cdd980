//! Booking core HTTP server.
//!
//! Reads `BOOKING__*` configuration, connects PostgreSQL, wires the Stripe
//! gateway into the booking handlers and serves the reservation API. A
//! background task releases abandoned checkouts.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use booking_core::adapters::stripe::StripeConfig;
use booking_core::adapters::http::{booking_router, BookingAppState};
use booking_core::adapters::{
    FixedDelayRetry, PgBookingUnitOfWork, PostgresNotificationOutbox, StripePaymentGateway,
};
use booking_core::application::handlers::booking::ReleaseAbandonedCommand;
use booking_core::config::{AppConfig, BookingConfig, ServerConfig};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    info!(
        environment = ?config.server.environment,
        stripe_test_mode = config.payment.is_test_mode(),
        "Configuration loaded"
    );

    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;
    info!(max_connections = config.database.max_connections, "Database connected");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Migrations applied");
    }

    let gateway = StripePaymentGateway::new(
        StripeConfig::new(config.payment.api_key())
            .with_base_url(&config.payment.stripe_api_base_url)
            .with_checkout_expiry_minutes(config.booking.checkout_expiry_minutes),
    );

    let state = BookingAppState {
        store: Arc::new(PgBookingUnitOfWork::new(pool.clone())),
        gateway: Arc::new(gateway),
        retry: Arc::new(FixedDelayRetry::new(config.booking.retry_config())),
        event_publisher: Arc::new(PostgresNotificationOutbox::new(pool.clone())),
        checkout_urls: config.payment.checkout_urls(),
        refund_policies: config.booking.refund_policies()?,
        default_currency: config.payment.default_currency(),
        expose_diagnostics: config.server.expose_diagnostics(),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep = spawn_abandoned_sweep(state.clone(), &config.booking, shutdown_rx);

    let app = build_app(state, &config.server);
    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweep.await {
        warn!(error = %e, "Abandoned-checkout sweep did not stop cleanly");
    }
    pool.close().await;
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if server.is_production() {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

fn build_app(state: BookingAppState, server: &ServerConfig) -> Router {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-user-role"),
        ]);

    booking_router().with_state(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(TimeoutLayer::new(Duration::from_secs(
                server.request_timeout_secs,
            ))),
    )
}

fn spawn_abandoned_sweep(
    state: BookingAppState,
    booking: &BookingConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let handler = state.release_abandoned_handler();
    let command = ReleaseAbandonedCommand {
        older_than_minutes: booking.abandoned_after_minutes,
        limit: booking.sweep_limit,
    };
    let mut interval = tokio::time::interval(booking.sweep_interval());

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = handler.handle(command).await {
                        error!(error = %e, "Abandoned-checkout sweep failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
