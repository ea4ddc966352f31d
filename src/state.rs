use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::ledger::Ledger;
use crate::services::notify::Notifier;
use crate::services::payments::PaymentGateway;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub ledger: Ledger,
    pub payments: Box<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Unavailable("database lock poisoned".to_string()))
    }
}
