//! Fixed-window request limiter keyed by caller. Buckets expire lazily when
//! touched and are swept periodically by a background task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::auth::user_id_from_headers;
use crate::errors::AppError;
use crate::letters::handlers::{ensure_docx_format, DownloadQuery};
use crate::state::AppState;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Time until the current window closes.
    pub reset_in: Duration,
}

pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            window,
            max_requests,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .entry(key.to_string())
            .and_modify(|bucket| {
                if bucket.expires_at <= now {
                    *bucket = Bucket {
                        count: 0,
                        expires_at: now + self.window,
                    };
                }
            })
            .or_insert(Bucket {
                count: 0,
                expires_at: now + self.window,
            });

        let reset_in = bucket.expires_at.saturating_duration_since(now);
        if bucket.count >= self.max_requests {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_in,
            };
        }

        bucket.count += 1;
        RateLimitDecision {
            allowed: true,
            remaining: self.max_requests - bucket.count,
            reset_in,
        }
    }

    /// Drops expired buckets. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.expires_at > now);
        before - buckets.len()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    #[cfg(test)]
    pub fn tracked_keys(&self) -> usize {
        self.buckets.lock().len()
    }
}

/// Sweeps expired buckets once per window for the lifetime of the process.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(limiter.window());
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = limiter.sweep();
            if removed > 0 {
                debug!("Rate limiter swept {removed} expired buckets");
            }
        }
    })
}

/// Middleware for the download route, keyed by the parsed caller id. Requests
/// without a valid id skip the limiter and are rejected by the auth extractor.
/// An unsupported `format` is rejected here so it does not spend the budget.
pub async fn enforce_download_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Ok(Query(params)) = Query::<DownloadQuery>::try_from_uri(request.uri()) {
        ensure_docx_format(params.format.as_deref())?;
    }

    let Some(user_id) = user_id_from_headers(request.headers()) else {
        return Ok(next.run(request).await);
    };

    let decision = state.download_limiter.check(&user_id.to_string());
    if !decision.allowed {
        let retry_after_secs = decision.reset_in.as_secs_f64().ceil().max(1.0) as u64;
        warn!("Download rate limit exceeded for {user_id}, retry in {retry_after_secs}s");
        return Err(AppError::TooManyRequests { retry_after_secs });
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_max_then_rejects() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();

        let remaining: Vec<u32> = (0..3).map(|_| limiter.check_at("u1", now).remaining).collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let later = now + Duration::from_secs(20);
        let rejected = limiter.check_at("u1", later);
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.reset_in, Duration::from_secs(40));
    }

    #[test]
    fn test_new_window_resets_count() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10));
        let now = Instant::now();

        assert!(limiter.check_at("u1", now).allowed);
        assert!(!limiter.check_at("u1", now + Duration::from_secs(5)).allowed);

        let next_window = limiter.check_at("u1", now + Duration::from_secs(10));
        assert!(next_window.allowed);
        assert_eq!(next_window.reset_in, Duration::from_secs(10));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10));
        let now = Instant::now();

        assert!(limiter.check_at("u1", now).allowed);
        assert!(limiter.check_at("u2", now).allowed);
        assert!(!limiter.check_at("u1", now).allowed);
    }

    #[test]
    fn test_sweep_removes_only_expired_buckets() {
        let limiter = RateLimiter::new(5, Duration::from_secs(10));
        let now = Instant::now();

        limiter.check_at("old", now);
        limiter.check_at("fresh", now + Duration::from_secs(8));

        assert_eq!(limiter.sweep_at(now + Duration::from_secs(10)), 1);
        assert_eq!(limiter.sweep_at(now + Duration::from_secs(10)), 0);
        assert_eq!(limiter.sweep_at(now + Duration::from_secs(18)), 1);
    }
}
