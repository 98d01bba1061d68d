use sqlx::PgPool;
use std::sync::Arc;

use crate::services::analyzer::Analyzer;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub analyzer: Arc<Analyzer>,
}

impl AppState {
    pub fn new(db: PgPool, analyzer: Analyzer) -> Self {
        Self {
            db,
            analyzer: Arc::new(analyzer),
        }
    }
}
