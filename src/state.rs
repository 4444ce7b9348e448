use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::errors::AppError;
use crate::models::ServiceCatalog;
use crate::services::ai::router::SmartRouter;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub catalog: ServiceCatalog,
    pub router: Box<dyn SmartRouter>,
}

impl AppState {
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal("database lock poisoned".to_string()))
    }
}
