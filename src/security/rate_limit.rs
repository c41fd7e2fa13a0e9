//! Per-client-IP rate limiting backed by `governor`.

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::middleware::NoOpMiddleware;
use governor::{Quota, RateLimiter};
use tracing::{debug, warn};

use crate::{
    Response, StatusCode,
    context::Context,
    middleware::{Middleware, Next},
};

type IpLimiter<C> =
    RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, C, NoOpMiddleware<<C as Clock>::Instant>>;

// Idle client state is dropped every this many checks.
const PRUNE_EVERY: u64 = 1024;

/// Limits each client IP to a burst of `max` requests on paths under a
/// prefix, refilled evenly so that `max` requests fit in each `window`.
///
/// Requests without a known peer address are not counted.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use ideas_relay::security::RateLimitMiddleware;
///
/// let limiter = RateLimitMiddleware::new("/api/", 100, Duration::from_secs(15 * 60));
/// ```
pub struct RateLimitMiddleware<C: Clock = DefaultClock> {
    prefix: String,
    max: u32,
    clock: C,
    limiter: IpLimiter<C>,
    checks: AtomicU64,
}

impl RateLimitMiddleware {
    pub fn new(prefix: impl Into<String>, max: u32, window: Duration) -> Self {
        Self::with_clock(prefix, max, window, DefaultClock::default())
    }
}

impl<C: Clock + Clone> RateLimitMiddleware<C> {
    pub fn with_clock(prefix: impl Into<String>, max: u32, window: Duration, clock: C) -> Self {
        let limiter = RateLimiter::dashmap_with_clock(quota(max, window), clock.clone());
        Self {
            prefix: prefix.into(),
            max,
            clock,
            limiter,
            checks: AtomicU64::new(0),
        }
    }

    // `Some(wait)` when `ip` is over budget.
    fn check(&self, ip: IpAddr) -> Option<Duration> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.limiter.retain_recent();
            debug!(clients = self.limiter.len(), "pruned idle rate limit state");
        }

        match self.limiter.check_key(&ip) {
            Ok(()) => None,
            Err(not_until) => Some(not_until.wait_time_from(self.clock.now())),
        }
    }
}

fn quota(max: u32, window: Duration) -> Quota {
    let burst = NonZeroU32::new(max).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(window / burst.get())
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

impl<C> Middleware for RateLimitMiddleware<C>
where
    C: Clock + Clone + Send + Sync + 'static,
{
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let peer = ctx.request().peer_addr();
        let wait = match peer {
            Some(addr) if ctx.request().path().starts_with(&self.prefix) => {
                Some(self.check(addr.ip()))
            }
            _ => None,
        };
        let max = self.max;

        Box::pin(async move {
            match wait {
                None => next.run(ctx).await,
                Some(None) => {
                    let mut resp = next.run(ctx).await;
                    resp.add_header("RateLimit-Limit", max.to_string());
                    resp
                }
                Some(Some(retry_after)) => {
                    if let Some(addr) = peer {
                        warn!(client = %addr.ip(), path = %ctx.request().path(), "rate limit exceeded");
                    }
                    let secs = retry_after.as_secs_f64().ceil() as u64;
                    Response::new(StatusCode::TOO_MANY_REQUESTS)
                        .header("Retry-After", secs.max(1).to_string())
                        .header("RateLimit-Limit", max.to_string())
                        .body("Too many requests, please try again later.")
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Request, Router, middleware::Stack};
    use governor::clock::FakeRelativeClock;

    const WINDOW: Duration = Duration::from_secs(900);

    fn request(path: &str, ip: &str) -> Request {
        let raw = format!("GET {path} HTTP/1.1\r\n\r\n");
        let addr = format!("{ip}:40000").parse().unwrap();
        Request::parse(raw.as_bytes()).unwrap().0.with_peer_addr(addr)
    }

    fn handler(
        clock: FakeRelativeClock,
    ) -> impl Fn(Request) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let mut router = Router::new();
        router.get("/*", |_ctx| async { Response::new(StatusCode::OK) });
        Stack::new()
            .layer(RateLimitMiddleware::with_clock("/api/", 2, WINDOW, clock))
            .layer(router)
            .into_handler()
    }

    #[test]
    fn quota_spreads_budget_over_window() {
        let q = quota(100, WINDOW);
        assert_eq!(q.burst_size().get(), 100);
        assert_eq!(q.replenish_interval(), Duration::from_secs(9));

        assert_eq!(quota(0, WINDOW).burst_size().get(), 1);
        assert_eq!(quota(5, Duration::ZERO).burst_size().get(), 5);
    }

    #[tokio::test]
    async fn rejects_after_burst_and_refills_over_time() {
        let clock = FakeRelativeClock::default();
        let handle = handler(clock.clone());

        let first = handle(request("/api/ideas", "10.0.0.1")).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers().get("ratelimit-limit"), Some("2"));
        assert_eq!(handle(request("/api/ideas", "10.0.0.1")).await.status(), StatusCode::OK);

        let limited = handle(request("/api/ideas", "10.0.0.1")).await;
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(limited.headers().get("retry-after"), Some("450"));
        assert_eq!(limited.body_ref(), b"Too many requests, please try again later.");

        clock.advance(Duration::from_secs(300));
        let still_limited = handle(request("/api/ideas", "10.0.0.1")).await;
        assert_eq!(still_limited.headers().get("retry-after"), Some("150"));

        clock.advance(Duration::from_secs(150));
        assert_eq!(handle(request("/api/ideas", "10.0.0.1")).await.status(), StatusCode::OK);
        assert_eq!(
            handle(request("/api/ideas", "10.0.0.1")).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test]
    async fn clients_are_counted_separately() {
        let handle = handler(FakeRelativeClock::default());
        for _ in 0..2 {
            handle(request("/api/ideas", "10.0.0.1")).await;
        }
        assert_eq!(
            handle(request("/api/ideas", "10.0.0.1")).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(handle(request("/api/ideas", "10.0.0.2")).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn paths_outside_prefix_are_not_limited() {
        let handle = handler(FakeRelativeClock::default());
        for _ in 0..5 {
            let res = handle(request("/health", "10.0.0.1")).await;
            assert_eq!(res.status(), StatusCode::OK);
            assert!(!res.headers().contains("ratelimit-limit"));
        }
    }
}
