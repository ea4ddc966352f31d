use std::env;

use chrono::Duration;

use crate::ledger::fare::FareTable;
use crate::ledger::LedgerPolicy;

/// Upper bound for `CANCELLATION_WINDOW_HOURS`: one year.
const MAX_CANCELLATION_WINDOW_HOURS: i64 = 24 * 366;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub payment_currency: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_pass: String,
    pub smtp_from: String,
    pub upload_dir: String,
    pub max_proof_bytes: usize,
    pub cancellation_window_hours: i64,
    pub fare_rate_luxury: f64,
    pub fare_rate_semi_luxury: f64,
    pub fare_rate_standard: f64,
    pub cancel_on_payment_failure: bool,
    pub notify_timeout_secs: u64,
    pub cors_origins: Vec<String>,
    pub seed_demo_data: bool,
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: parsed("PORT", 5000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "busbook.db".to_string()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "changeme".to_string()),
            jwt_ttl_hours: parsed("JWT_TTL_HOURS", 24),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            payment_currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "zar".to_string()),
            smtp_host: env::var("SMTP_HOST").unwrap_or_default(),
            smtp_port: parsed("SMTP_PORT", 465),
            smtp_user: env::var("SMTP_USER").unwrap_or_default(),
            smtp_pass: env::var("SMTP_PASS").unwrap_or_default(),
            smtp_from: env::var("SMTP_FROM").unwrap_or_default(),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            max_proof_bytes: parsed("MAX_PROOF_BYTES", 5 * 1024 * 1024),
            cancellation_window_hours: parsed("CANCELLATION_WINDOW_HOURS", 24),
            fare_rate_luxury: parsed("FARE_RATE_LUXURY", 2.5),
            fare_rate_semi_luxury: parsed("FARE_RATE_SEMI_LUXURY", 2.0),
            fare_rate_standard: parsed("FARE_RATE_STANDARD", 1.5),
            cancel_on_payment_failure: flag("CANCEL_ON_PAYMENT_FAILURE", true),
            notify_timeout_secs: parsed("NOTIFY_TIMEOUT_SECS", 10),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            seed_demo_data: flag("SEED_DEMO_DATA", false),
        }
    }

    pub fn ledger_policy(&self) -> LedgerPolicy {
        LedgerPolicy {
            fares: FareTable {
                luxury: self.fare_rate_luxury,
                semi_luxury: self.fare_rate_semi_luxury,
                standard: self.fare_rate_standard,
            },
            cancellation_window: Duration::hours(
                self.cancellation_window_hours
                    .clamp(0, MAX_CANCELLATION_WINDOW_HOURS),
            ),
            cancel_on_payment_failure: self.cancel_on_payment_failure,
            notify_timeout: std::time::Duration::from_secs(self.notify_timeout_secs.max(1)),
        }
    }
}
