//! Wires the relay together: shared state, routes, and the middleware stack.
//!
//! | Method | Path          | Handler                                   |
//! |--------|---------------|-------------------------------------------|
//! | GET    | `/api/ideas`  | cached listing relay                      |
//! | GET    | `/health`     | liveness plus cache size                  |
//! | any    | `/proxy/*`    | passthrough to the proxy target           |
//! | any    | `/api/*`      | JSON `404`                                |
//! | GET    | `/*`          | static files, `/` resolving to index.html |

pub mod handlers;
pub mod proxy;
pub mod static_files;

use std::sync::Arc;

use thiserror::Error;

use crate::cache::{Clock, SystemClock};
use crate::config::Config;
use crate::context::Context;
use crate::ideas::{IdeasService, IdeasSource, UpstreamClient, UpstreamError};
use crate::middleware::{LoggerMiddleware, RecoverMiddleware, Stack};
use crate::router::Router;
use crate::security::{CorsMiddleware, RateLimitMiddleware};

pub use proxy::ProxyClient;
pub use static_files::StaticFiles;

/// Prefix guarded by the rate limiter.
pub const API_PREFIX: &str = "/api/";

/// Startup failures while assembling the application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create upstream client: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("failed to create proxy client: {0}")]
    Proxy(#[from] reqwest::Error),
}

/// Everything the handlers share. Built once at startup.
pub struct AppState {
    pub ideas: IdeasService,
    pub static_files: StaticFiles,
    pub proxy: ProxyClient,
}

impl AppState {
    /// Builds state against the configured upstream with the system clock.
    ///
    /// # Errors
    /// Returns [`AppError`] if an HTTP client cannot be created.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let source = UpstreamClient::new(&config.upstream_origin, config.upstream_timeout())?;
        Self::new(config, Arc::new(source), Arc::new(SystemClock))
    }

    /// Builds state around an arbitrary listing source and clock.
    ///
    /// # Errors
    /// Returns [`AppError::Proxy`] if the proxy client cannot be created.
    pub fn new(
        config: &Config,
        source: Arc<dyn IdeasSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            ideas: IdeasService::new(source, config.cache_ttl(), clock),
            static_files: StaticFiles::new(&config.static_dir),
            proxy: ProxyClient::new(&config.proxy_target, config.upstream_timeout())?,
        })
    }
}

/// Registers every route, in match order.
pub fn router(state: &Arc<AppState>) -> Router {
    let mut router = Router::new();

    let s = Arc::clone(state);
    router.get("/api/ideas", move |ctx: Context| {
        let state = Arc::clone(&s);
        async move { handlers::list_ideas(&state.ideas, ctx).await }
    });

    let s = Arc::clone(state);
    router.get("/health", move |_ctx: Context| {
        let state = Arc::clone(&s);
        async move { handlers::health(&state.ideas) }
    });

    let s = Arc::clone(state);
    router.any("/proxy/*", move |ctx: Context| {
        let state = Arc::clone(&s);
        async move { state.proxy.forward(ctx).await }
    });

    router.any("/api/*", |ctx: Context| async move { handlers::api_not_found(&ctx) });

    let s = Arc::clone(state);
    router.get("/*", move |ctx: Context| {
        let state = Arc::clone(&s);
        async move { state.static_files.serve(ctx.request().path()).await }
    });

    router
}

/// The full request pipeline, outermost layer first: panic recovery, access
/// log, CORS, rate limiting, then routing.
pub fn stack(config: &Config, state: &Arc<AppState>) -> Stack {
    let cors = config
        .allowed_origins
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .fold(CorsMiddleware::new(), |cors, origin| cors.allow_origin(origin))
        .allow_credentials(true);

    Stack::new()
        .layer(RecoverMiddleware)
        .layer(LoggerMiddleware)
        .layer(cors)
        .layer(RateLimitMiddleware::new(
            API_PREFIX,
            config.rate_limit_max,
            config.rate_limit_window(),
        ))
        .layer(router(state))
}
