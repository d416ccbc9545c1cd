pub mod config;
pub mod db;
pub mod error;
pub mod imap;
pub mod mail;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;

use crate::services::summary_service::SummarySettings;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub http: reqwest::Client,
    pub summary: Arc<SummarySettings>,
}

impl AppState {
    pub fn new(pool: SqlitePool, summary: SummarySettings) -> Self {
        Self {
            pool,
            http: reqwest::Client::new(),
            summary: Arc::new(summary),
        }
    }
}

pub fn app(state: AppState) -> Router {
    routes::routes().with_state(state)
}
