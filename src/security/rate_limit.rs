//! Token bucket admission control.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;

use crate::config::{schema::RateLimitConfig, ConfigHandle};
use crate::error::GatewayError;
use crate::http::pipeline::{Middleware, Next};
use crate::observability::metrics;

const DEFAULT_CAPACITY: u64 = 100;
const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct BucketState {
    tokens: u64,
    last_refill: Instant,
}

/// Fixed-window token bucket with lazy refill.
///
/// Tokens are added in whole refill intervals at admission time; there is no
/// background timer. Refill and consume happen under one mutex.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u64,
    refill_interval: Duration,
    refill_per_interval: u64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Bucket admitting `capacity` requests per `interval`.
    ///
    /// Zero values fall back to 100 requests per second. When the rate is below
    /// one request per second the bucket refills one token every
    /// `interval / capacity` instead.
    pub fn new(capacity: u64, interval: Duration) -> Self {
        Self::new_at(capacity, interval, Instant::now())
    }

    fn new_at(capacity: u64, interval: Duration, now: Instant) -> Self {
        let capacity = if capacity == 0 { DEFAULT_CAPACITY } else { capacity };
        let interval = if interval.is_zero() { DEFAULT_INTERVAL } else { interval };

        let per_second = capacity as f64 / interval.as_secs_f64();
        let (refill_interval, refill_per_interval) = if per_second < 1.0 {
            (
                Duration::from_nanos((interval.as_nanos() / u128::from(capacity)) as u64),
                1,
            )
        } else {
            (interval, capacity)
        };

        Self {
            capacity,
            refill_interval,
            refill_per_interval,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: now,
            }),
        }
    }

    /// Take one token if available.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    fn allow_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let elapsed = now.saturating_duration_since(state.last_refill);
        if elapsed >= self.refill_interval {
            let intervals = (elapsed.as_nanos() / self.refill_interval.as_nanos()) as u64;
            let added = intervals.saturating_mul(self.refill_per_interval);
            state.tokens = state.tokens.saturating_add(added).min(self.capacity);
            state.last_refill = now;
        }

        if state.tokens > 0 {
            state.tokens -= 1;
            true
        } else {
            false
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Tokens currently available (without refilling).
    pub fn available(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).tokens
    }

    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    pub fn refill_per_interval(&self) -> u64 {
        self.refill_per_interval
    }
}

/// Admission control middleware.
///
/// Reads the rate-limit settings for each request and keeps one bucket per
/// settings value; a reload with new settings starts a fresh bucket.
pub struct RateLimitMiddleware {
    config: ConfigHandle,
    bucket: Mutex<Option<(RateLimitConfig, Arc<TokenBucket>)>>,
}

impl RateLimitMiddleware {
    pub fn new(config: ConfigHandle) -> Self {
        Self {
            config,
            bucket: Mutex::new(None),
        }
    }

    fn bucket_for(&self, settings: &RateLimitConfig) -> Arc<TokenBucket> {
        let mut slot = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some((current, bucket)) if current == settings => Arc::clone(bucket),
            _ => {
                // Negative counts share the zero fallback.
                let capacity = u64::try_from(settings.requests).unwrap_or(0);
                let bucket = Arc::new(TokenBucket::new(capacity, settings.interval));
                tracing::info!(
                    capacity = bucket.capacity(),
                    refill_interval = ?bucket.refill_interval(),
                    "Rate limiter configured"
                );
                *slot = Some((settings.clone(), Arc::clone(&bucket)));
                bucket
            }
        }
    }
}

impl Middleware for RateLimitMiddleware {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn call(self: Arc<Self>, request: Request<Body>, next: Next) -> BoxFuture<'static, Response> {
        Box::pin(async move {
            let generation = self.config.for_request(&request);
            let settings = &generation.config.rate_limit;
            if !settings.enabled {
                return next.run(request).await;
            }

            if self.bucket_for(settings).allow() {
                next.run(request).await
            } else {
                tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
                metrics::record_rate_limited();
                GatewayError::AdmissionDenied.into_response()
            }
        })
    }
}
