use std::sync::Arc;

use common::storage::ContentStore;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub store: Arc<dyn ContentStore>,
    pub config: AppConfig,
}
