//! Application state

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::federation::Federation;

/// Shared by all handlers
pub struct AppState {
    pub federation: Arc<Federation>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(federation: Federation) -> Self {
        Self {
            federation: Arc::new(federation),
            started_at: Utc::now(),
        }
    }
}
