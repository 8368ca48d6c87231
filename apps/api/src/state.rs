use std::sync::Arc;

use crate::letters::repository::LetterRepository;
use crate::rate_limit::RateLimiter;
use crate::render::DocumentRenderer;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub letters: Arc<dyn LetterRepository>,
    /// Loaded once at startup; rendering runs on the blocking pool.
    pub renderer: Arc<dyn DocumentRenderer>,
    pub download_limiter: Arc<RateLimiter>,
}
