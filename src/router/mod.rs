//! Method and path dispatch for the relay's handlers.
//!
//! | Pattern     | Matches                         | `wildcard` param |
//! |-------------|---------------------------------|------------------|
//! | `/health`   | `/health`, `/health/`           | *(none)*         |
//! | `/proxy/*`  | `/proxy`, `/proxy/api/ideas`    | `"/api/ideas"`   |
//!
//! A wildcard only matches on a segment boundary: `/api/*` takes `/api` and
//! `/api/x` but not `/apix`. Routes are tried in registration order and the
//! first one whose method and pattern agree wins; anything else is a bare `404`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::{Context, PathParams};
use crate::middleware::{Middleware, Next};
use crate::{Method, Request, Response, StatusCode};

/// Boxed future returned by every handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Type-erased, heap-allocated async handler that processes a [`Context`] and returns a
/// [`Response`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so they can be cloned and shared across
/// tasks without copying the underlying closure. In practice you never construct this
/// type directly — use [`Router::get`], [`Router::any`], and friends instead.
pub type Handler = Arc<dyn Fn(Context) -> HandlerFuture + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait automatically via the blanket impl
/// below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> HandlerFuture;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> HandlerFuture {
        Box::pin((self)(ctx))
    }
}

#[derive(Debug, Clone)]
enum Pattern {
    Exact(String),
    // Prefix without the trailing `/*`.
    Wildcard(String),
}

fn trim_trailing_slash(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

impl Pattern {
    fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix("/*") {
            Some(prefix) => Pattern::Wildcard(prefix.to_string()),
            None => Pattern::Exact(trim_trailing_slash(pattern).to_string()),
        }
    }

    fn matches(&self, path: &str) -> Option<PathParams> {
        match self {
            Pattern::Exact(p) => (p == trim_trailing_slash(path)).then(PathParams::new),
            Pattern::Wildcard(prefix) => {
                let suffix = path.strip_prefix(prefix.as_str())?;
                if !suffix.is_empty() && !suffix.starts_with('/') {
                    return None;
                }
                let mut params = PathParams::new();
                params.insert("wildcard".to_string(), suffix.to_string());
                Some(params)
            }
        }
    }
}

// `method: None` accepts every method.
struct Route {
    method: Option<Method>,
    pattern: Pattern,
    handler: Handler,
}

impl Route {
    fn matches(&self, method: &Method, path: &str) -> Option<PathParams> {
        match &self.method {
            Some(m) if m != method => None,
            _ => self.pattern.matches(path),
        }
    }
}

/// Dispatches requests to the first registered route that matches.
///
/// # Examples
///
/// ```rust,no_run
/// use ideas_relay::{Router, Response, StatusCode};
/// use ideas_relay::context::Context;
///
/// let mut router = Router::new();
///
/// router.get("/health", |_ctx| async { Response::new(StatusCode::OK) });
///
/// router.any("/proxy/*", |ctx: Context| async move {
///     let rest = ctx.params().get("wildcard").unwrap_or("/").to_owned();
///     Response::new(StatusCode::OK).body(rest)
/// });
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `GET` requests matching `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) -> &mut Self {
        self.add_route(Some(Method::Get), path, handler)
    }

    /// Register a handler for requests matching `path` regardless of method.
    pub fn any(&mut self, path: &str, handler: impl IntoHandler) -> &mut Self {
        self.add_route(None, path, handler)
    }

    fn add_route(&mut self, method: Option<Method>, path: &str, handler: impl IntoHandler) -> &mut Self {
        let handler: Handler = Arc::new(move |ctx| handler.call(ctx));
        self.routes.push(Route {
            method,
            pattern: Pattern::parse(path),
            handler,
        });
        self
    }

    /// Select the handler for `request` and start it.
    ///
    /// Matching happens synchronously, so the returned future does not borrow
    /// the router.
    pub fn dispatch(&self, request: Request) -> HandlerFuture {
        for route in &self.routes {
            if let Some(params) = route.matches(request.method(), request.path()) {
                return (route.handler)(Context::with_params(request, params));
            }
        }

        Box::pin(async { Response::new(StatusCode::NOT_FOUND) })
    }

    /// Dispatch `request` to the first matching route and return its response.
    pub async fn route(&self, request: Request) -> Response {
        self.dispatch(request).await
    }
}

/// The router is the innermost layer of a middleware stack: it always answers
/// and never calls `next`.
impl Middleware for Router {
    fn handle(&self, ctx: Context, _next: Next) -> HandlerFuture {
        self.dispatch(ctx.into_request())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::Request;

    fn make_request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    async fn body_of(router: &Router, method: &str, path: &str) -> String {
        let res = router.route(make_request(method, path)).await;
        String::from_utf8(res.body_ref().to_vec()).unwrap()
    }

    // ── Pattern::parse ────────────────────────────────────────────────────────

    #[test]
    fn pattern_parse_root() {
        assert!(matches!(Pattern::parse("/"), Pattern::Exact(s) if s == "/"));
    }

    #[test]
    fn pattern_parse_trailing_slash_stripped() {
        assert!(matches!(Pattern::parse("/health/"), Pattern::Exact(s) if s == "/health"));
    }

    #[test]
    fn pattern_parse_wildcard() {
        assert!(matches!(Pattern::parse("/api/*"), Pattern::Wildcard(s) if s == "/api"));
        assert!(matches!(Pattern::parse("/*"), Pattern::Wildcard(s) if s.is_empty()));
    }

    // ── Pattern::matches ──────────────────────────────────────────────────────

    #[test]
    fn pattern_exact_match() {
        let pat = Pattern::parse("/health");
        assert!(pat.matches("/health").is_some());
        assert!(pat.matches("/health/").is_some());
        assert!(pat.matches("/healthz").is_none());
    }

    #[test]
    fn pattern_wildcard_respects_segment_boundary() {
        let pat = Pattern::parse("/api/*");
        assert_eq!(pat.matches("/api/unknown/x").unwrap().get("wildcard"), Some("/unknown/x"));
        assert_eq!(pat.matches("/api").unwrap().get("wildcard"), Some(""));
        assert!(pat.matches("/apix").is_none());
    }

    #[test]
    fn pattern_root_wildcard_matches_everything() {
        let pat = Pattern::parse("/*");
        assert_eq!(pat.matches("/css/app.css").unwrap().get("wildcard"), Some("/css/app.css"));
    }

    // ── Router ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn router_empty_returns_404() {
        let router = Router::new();
        let res = router.route(make_request("GET", "/")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn router_get_does_not_match_post() {
        let mut router = Router::new();
        router.get("/hello", |_ctx| async { Response::new(StatusCode::OK) });
        let res = router.route(make_request("POST", "/hello")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn router_any_matches_every_method() {
        let mut router = Router::new();
        router.any("/proxy/*", |ctx: Context| async move {
            Response::new(StatusCode::OK).body(ctx.request().method().to_string())
        });
        assert_eq!(body_of(&router, "DELETE", "/proxy/x").await, "DELETE");
        assert_eq!(body_of(&router, "PATCH", "/proxy/x").await, "PATCH");
    }

    #[tokio::test]
    async fn router_first_matching_route_wins() {
        let mut router = Router::new();
        router.get("/api/ideas", |_ctx| async { Response::new(StatusCode::OK).body("ideas") });
        router.any("/api/*", |_ctx| async { Response::new(StatusCode::NOT_FOUND).body("api") });

        assert_eq!(body_of(&router, "GET", "/api/ideas").await, "ideas");
        assert_eq!(body_of(&router, "POST", "/api/ideas").await, "api");
        assert_eq!(body_of(&router, "GET", "/api/other").await, "api");
    }

    #[tokio::test]
    async fn router_wildcard_route_receives_remainder() {
        let mut router = Router::new();
        router.any("/proxy/*", |ctx: Context| async move {
            let rest = ctx.params().get("wildcard").unwrap_or("").to_owned();
            Response::new(StatusCode::OK).body(rest)
        });
        assert_eq!(body_of(&router, "GET", "/proxy/api/ideas").await, "/api/ideas");
        assert_eq!(body_of(&router, "GET", "/proxyx").await, "");
    }
}
