pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use crate::config::MutableConfig;
use crate::store::DataAccess;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DataAccess>,
    pub config: MutableConfig,
}
