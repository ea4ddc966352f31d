use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use busbook::config::AppConfig;
use busbook::db::{self, SqliteStore};
use busbook::ledger::Ledger;
use busbook::services::notify::smtp::SmtpNotifier;
use busbook::services::notify::{LogNotifier, Notifier};
use busbook::services::payments::stripe::StripeGateway;
use busbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    if config.seed_demo_data {
        db::migrations::seed_demo_data(&conn)?;
    }
    let conn = Arc::new(Mutex::new(conn));

    let notifier: Arc<dyn Notifier> = if config.smtp_host.is_empty() {
        tracing::info!("SMTP_HOST not set, notifications will only be logged");
        Arc::new(LogNotifier)
    } else {
        anyhow::ensure!(!config.smtp_from.is_empty(), "SMTP_FROM must be set when SMTP_HOST is");
        tracing::info!("sending notifications via {}:{}", config.smtp_host, config.smtp_port);
        Arc::new(SmtpNotifier::new(
            &config.smtp_host,
            config.smtp_port,
            config.smtp_user.clone(),
            config.smtp_pass.clone(),
            config.smtp_from.clone(),
        )?)
    };

    if config.stripe_webhook_secret.is_empty() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set, webhook signatures will not be checked");
    }
    let payments = StripeGateway::new(
        config.stripe_secret_key.clone(),
        config.payment_currency.clone(),
    );

    let ledger = Ledger::new(
        Arc::new(SqliteStore::new(Arc::clone(&conn))),
        Arc::clone(&notifier),
        config.ledger_policy(),
    );

    let state = Arc::new(AppState {
        db: conn,
        config: config.clone(),
        ledger,
        payments: Box::new(payments),
        notifier,
    });

    let app = busbook::app(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
