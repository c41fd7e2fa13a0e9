//! Security middleware — CORS policy and per-client rate limiting.
//!
//! - [`CorsMiddleware`] — Cross-Origin Resource Sharing header injection and
//!   preflight (`OPTIONS`) short-circuiting.
//! - [`RateLimitMiddleware`] — fixed-window request budget per client IP.

pub mod cors;
pub mod rate_limit;

pub use cors::CorsMiddleware;
pub use rate_limit::RateLimitMiddleware;
