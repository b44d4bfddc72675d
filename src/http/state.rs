//! Application state for the HTTP server.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::AuthSource;
use crate::engine::Engine;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    /// Resolves bearer tokens to users.
    pub auth: Arc<dyn AuthSource>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>, auth: Arc<dyn AuthSource>) -> Self {
        Self { engine, auth }
    }
}

impl FromRef<AppState> for Arc<dyn AuthSource> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}
