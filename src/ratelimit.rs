use std::{collections::HashMap, net::SocketAddr, time::Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{config::RateLimitConfig, error::AppError, state::AppState};

/// Calls between sweeps of buckets that have refilled completely.
const SWEEP_EVERY: u64 = 64;

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Default)]
struct Buckets {
    by_key: HashMap<String, Bucket>,
    calls: u64,
}

/// Per-client token buckets for the public and bulk endpoints.
pub struct RateLimiter {
    buckets: Mutex<Buckets>,
    cfg: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(cfg: RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(Buckets::default()),
            cfg,
        }
    }

    pub async fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now()).await
    }

    async fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut lock = self.buckets.lock().await;

        lock.calls += 1;
        if lock.calls >= SWEEP_EVERY {
            lock.calls = 0;
            let before = lock.by_key.len();
            // A full bucket is indistinguishable from a fresh one.
            lock.by_key.retain(|_, b| self.refilled(b, now) < self.cfg.capacity);
            let dropped = before - lock.by_key.len();
            if dropped > 0 {
                debug!(dropped, remaining = lock.by_key.len(), "idle rate-limit buckets swept");
            }
        }

        let bucket = lock.by_key.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: self.cfg.capacity,
            last_refill: now,
        });
        bucket.tokens = self.refilled(bucket, now);
        bucket.last_refill = now;
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refilled(&self, bucket: &Bucket, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        (bucket.tokens + elapsed * self.cfg.refill_per_sec).min(self.cfg.capacity)
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.buckets.lock().await.by_key.len()
    }
}

/// Keys by peer address when the server exposes it, else one shared bucket.
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let key = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "shared".to_string());

    if !state.limiter.allow(&key).await {
        warn!(client = %key, path = %req.uri().path(), "rate limit exceeded");
        return AppError::RateLimited.into_response();
    }
    next.run(req).await
}
