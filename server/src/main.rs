//! Dormclean HTTP server.
//!
//! Wires the `PostgreSQL` stores, the configured mail transport and the
//! billing services into the axum router, and runs payout reconciliation in
//! the background.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]

mod config;

use anyhow::Context;
use chrono::TimeDelta;
use config::{Config, MailTransport};
use dormclean_billing::{BillingEnvironment, BusinessIdentity, InvoiceGenerator, PayoutService};
use dormclean_core::Mailer;
use dormclean_core::environment::SystemClock;
use dormclean_ingest::{OrderIngestor, SignatureVerifier};
use dormclean_mail::{ConsoleMailer, RelayMailer, Sender, SmtpMailer};
use dormclean_postgres::{PoolSettings, PostgresStore};
use dormclean_web::{AppState, TrustedIdVerifier, build_router};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dormclean=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting dormclean server");

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        mail_transport = transport_name(&config.mail.transport),
        webhook_signed = config.webhook.secret.is_some(),
        "Configuration loaded"
    );

    info!("Connecting to database...");
    let store = Arc::new(
        PostgresStore::connect(
            &config.postgres.url,
            &PoolSettings {
                max_connections: config.postgres.max_connections,
                min_connections: config.postgres.min_connections,
                connect_timeout: config.postgres.connect_timeout(),
            },
        )
        .await?,
    );
    store.migrate().await?;
    info!("Database ready");

    let clock = Arc::new(SystemClock);
    let env = BillingEnvironment {
        profiles: store.clone(),
        bookings: store.clone(),
        payments: store.clone(),
        invoice_requests: store.clone(),
        ledger: store.clone(),
        mailer: build_mailer(&config)?,
        clock: clock.clone(),
    };

    let generator = InvoiceGenerator::new(
        BusinessIdentity {
            name: config.billing.business_name.clone(),
            address: config.billing.business_address.clone(),
            email: config.billing.business_email.clone(),
            phone: config.billing.business_phone.clone(),
        },
        config.billing.currency.clone(),
    )?;
    let grace = TimeDelta::seconds(i64::try_from(config.billing.reconcile_grace).unwrap_or(i64::MAX));
    let payouts = PayoutService::new(env.clone(), generator).with_reconcile_grace(grace);

    let mut ingestor = OrderIngestor::new(store.clone(), store.clone(), clock);
    if let Some(secret) = &config.webhook.secret {
        ingestor = ingestor.with_verifier(SignatureVerifier::new(secret.as_bytes()));
    } else {
        warn!("ORDER_WEBHOOK_SECRET is not set; order webhooks are accepted unsigned");
    }

    let state = AppState::new(
        env,
        store.clone(),
        store.clone(),
        payouts,
        ingestor,
        Arc::new(TrustedIdVerifier),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let reconciler = config
        .billing
        .reconcile_every()
        .map(|every| tokio::spawn(reconcile_loop(state.payouts.clone(), every, shutdown_rx.clone())));
    if reconciler.is_none() {
        info!("Background payout reconciliation disabled");
    }

    let app = build_router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    let mut server_rx = shutdown_rx.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = server_rx.wait_for(|stop| *stop).await;
    });

    let mut deadline_rx = shutdown_rx;
    let drain = Duration::from_secs(config.server.shutdown_timeout);
    tokio::select! {
        result = server.into_future() => result.context("Server error")?,
        () = async move {
            let _ = deadline_rx.wait_for(|stop| *stop).await;
            tokio::time::sleep(drain).await;
        } => warn!(timeout_secs = drain.as_secs(), "Shutdown timeout elapsed, dropping open connections"),
    }

    if let Some(handle) = reconciler {
        handle.abort();
    }
    store.close().await;
    info!("Server stopped");
    Ok(())
}

fn build_mailer(config: &Config) -> anyhow::Result<Arc<dyn Mailer>> {
    let sender = Sender::new(config.mail.from_email.clone(), config.mail.from_name.clone());
    let mailer: Arc<dyn Mailer> = match &config.mail.transport {
        MailTransport::Console => Arc::new(ConsoleMailer::new()),
        MailTransport::Smtp {
            host,
            port,
            username,
            password,
        } => Arc::new(SmtpMailer::new(host.clone(), *port, username.clone(), password.clone(), sender)),
        MailTransport::Relay { url, api_key } => Arc::new(RelayMailer::new(url.clone(), api_key.clone(), sender)?),
    };
    Ok(mailer)
}

const fn transport_name(transport: &MailTransport) -> &'static str {
    match transport {
        MailTransport::Console => "console",
        MailTransport::Smtp { .. } => "smtp",
        MailTransport::Relay { .. } => "relay",
    }
}

/// Resolve interrupted payout runs every `every` until shutdown.
async fn reconcile_loop(payouts: Arc<PayoutService>, every: Duration, mut shutdown: watch::Receiver<bool>) {
    info!(interval_secs = every.as_secs(), "Background payout reconciliation started");
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = payouts.reconcile().await {
                    error!(error = %err, "Payout reconciliation failed");
                }
            },
            () = async {
                let _ = shutdown.wait_for(|stop| *stop).await;
            } => break,
        }
    }
}

/// Graceful shutdown signal handler.
///
/// Waits for:
/// - Ctrl+C (SIGINT)
/// - SIGTERM (in production environments)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
