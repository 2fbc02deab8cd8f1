//! Rental Ledger server binary.

use std::error::Error;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rental_ledger::adapters::http::{
    app_router, HttpOptions, SubscriptionAppState, WebhookAppState,
};
use rental_ledger::adapters::memory::{InMemoryInstallations, InMemoryLedger, InMemoryRecipients};
use rental_ledger::adapters::postgres::{
    PostgresInstallationReader, PostgresLedgerStore, PostgresRecipientDirectory,
};
use rental_ledger::adapters::push::{ExpoPushSender, LoggingPushSender};
use rental_ledger::adapters::razorpay::{MockPaymentGateway, RazorpayClient, RazorpayConfig};
use rental_ledger::application::handlers::{SubscriptionLifecycleService, WebhookDispatcher};
use rental_ledger::application::LedgerNotifier;
use rental_ledger::config::{AppConfig, DatabaseConfig, PaymentConfig, ServerConfig};
use rental_ledger::ports::{
    InstallationReader, LedgerStore, NotificationGateway, PaymentGateway, RecipientDirectory,
};

type Stores = (
    Arc<dyn LedgerStore>,
    Arc<dyn InstallationReader>,
    Arc<dyn RecipientDirectory>,
);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    let (ledger, installations, directory) = connect_stores(&config.database).await?;

    let push: Arc<dyn NotificationGateway> = if config.notification.enabled {
        Arc::new(ExpoPushSender::new(
            config.notification.push_endpoint.clone(),
            config.notification.timeout(),
        )?)
    } else {
        tracing::info!("Push notifications disabled; logging only");
        Arc::new(LoggingPushSender::new())
    };
    let notifier = Arc::new(LedgerNotifier::new(
        push,
        directory,
        config.notification.timeout(),
    ));

    let dispatcher = Arc::new(WebhookDispatcher::new(
        ledger.clone(),
        notifier.clone(),
        config.payment.razorpay_webhook_secret.clone(),
    ));
    let service = Arc::new(SubscriptionLifecycleService::new(
        ledger,
        installations,
        payment_gateway(&config.payment),
        notifier,
        config.payment.default_plan_id.clone(),
    ));

    let options = HttpOptions {
        request_timeout: config.server.request_timeout(),
        cors_origins: config.server.cors_origins_list(),
    };
    let app = app_router(
        SubscriptionAppState::new(service),
        WebhookAppState::new(dispatcher),
        &options,
    );

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = %config.server.environment, "Rental ledger listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// `RUST_LOG` wins over `server.log_level`. JSON output in production.
fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if server.is_production() {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().pretty()).init();
    }
}

async fn connect_stores(database: &DatabaseConfig) -> Result<Stores, Box<dyn Error>> {
    if !database.is_configured() {
        tracing::warn!("No database URL configured; using the in-memory ledger");
        return Ok((
            Arc::new(InMemoryLedger::new()),
            Arc::new(InMemoryInstallations::new()),
            Arc::new(InMemoryRecipients::new()),
        ));
    }

    let pool = PgPoolOptions::new()
        .min_connections(database.min_connections)
        .max_connections(database.max_connections)
        .acquire_timeout(database.acquire_timeout())
        .connect(&database.url)
        .await?;
    tracing::info!("Postgres connection pool established");

    if database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    Ok((
        Arc::new(PostgresLedgerStore::new(pool.clone())),
        Arc::new(PostgresInstallationReader::new(pool.clone())),
        Arc::new(PostgresRecipientDirectory::new(pool)),
    ))
}

fn payment_gateway(payment: &PaymentConfig) -> Arc<dyn PaymentGateway> {
    match &payment.razorpay_key_secret {
        Some(secret) if payment.has_api_credentials() => {
            let config = RazorpayConfig::new(payment.razorpay_key_id.clone(), secret.clone())
                .with_base_url(payment.razorpay_api_base.clone());
            Arc::new(RazorpayClient::new(config))
        }
        _ => {
            tracing::warn!("Razorpay credentials missing; using the mock payment gateway");
            Arc::new(MockPaymentGateway::new())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
