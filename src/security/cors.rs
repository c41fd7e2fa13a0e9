//! Cross-Origin Resource Sharing.

use std::pin::Pin;

use crate::{
    Method, Response, StatusCode,
    context::Context,
    middleware::{Middleware, Next},
};

/// CORS middleware — validates the `Origin` header, handles preflight requests,
/// and injects `Access-Control-*` headers on actual responses.
///
/// Constructed via [`CorsMiddleware::new`] and configured through
/// [`allow_origin`](Self::allow_origin), [`allow_method`](Self::allow_method),
/// [`allow_header`](Self::allow_header) and
/// [`allow_credentials`](Self::allow_credentials).
///
/// # Behavior
///
/// - If no `Origin` header is present the request passes through unmodified.
/// - If the origin is not in the allow-list the request passes through unmodified
///   and the browser enforces the block.
/// - `OPTIONS` preflight requests are short-circuited with `204 No Content`; the
///   downstream handler is **not** called.
/// - For all other requests the handler runs normally and the CORS headers are appended
///   to the response.
/// - A specific (non-wildcard) origin is echoed back together with `Vary: Origin`.
///
/// # Examples
///
/// ```rust
/// use ideas_relay::security::CorsMiddleware;
///
/// let cors = CorsMiddleware::new()
///     .allow_origin("http://localhost:3000")
///     .allow_credentials(true);
/// ```
pub struct CorsMiddleware {
    policy: CorsPolicy,
}

#[derive(Clone)]
struct CorsPolicy {
    allowed_origins: Vec<String>,
    allowed_methods: Vec<String>,
    allowed_headers: Vec<String>,
    allow_credentials: bool,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl CorsMiddleware {
    /// Creates a `CorsMiddleware` that allows no origins yet.
    ///
    /// | Setting          | Default value                                   |
    /// |------------------|-------------------------------------------------|
    /// | Allowed origins  | *(none)*                                        |
    /// | Allowed methods  | `GET`, `HEAD`, `PUT`, `PATCH`, `POST`, `DELETE` |
    /// | Allowed headers  | `Content-Type`, `Authorization`                 |
    /// | Credentials      | not allowed                                     |
    pub fn new() -> Self {
        let methods = ["GET", "HEAD", "PUT", "PATCH", "POST", "DELETE"];
        Self {
            policy: CorsPolicy {
                allowed_origins: Vec::new(),
                allowed_methods: methods.iter().map(|m| (*m).to_owned()).collect(),
                allowed_headers: vec!["Content-Type".to_owned(), "Authorization".to_owned()],
                allow_credentials: false,
            },
        }
    }

    /// Adds an allowed origin. `"*"` permits every origin.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.policy.allowed_origins.push(origin.into());
        self
    }

    /// Adds an allowed HTTP method, sent verbatim in `Access-Control-Allow-Methods`.
    #[must_use]
    pub fn allow_method(mut self, method: impl Into<String>) -> Self {
        self.policy.allowed_methods.push(method.into());
        self
    }

    /// Adds an allowed request header, sent verbatim in `Access-Control-Allow-Headers`.
    #[must_use]
    pub fn allow_header(mut self, header: impl Into<String>) -> Self {
        self.policy.allowed_headers.push(header.into());
        self
    }

    /// Emits `Access-Control-Allow-Credentials: true` when enabled.
    #[must_use]
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.policy.allow_credentials = allow;
        self
    }
}

impl CorsPolicy {
    // The value for `Access-Control-Allow-Origin`, or `None` when the origin is rejected.
    fn allow_origin_for(&self, origin: &str) -> Option<String> {
        if self.allowed_origins.iter().any(|o| o == origin) {
            Some(origin.to_owned())
        } else if self.allowed_origins.iter().any(|o| o == "*") {
            Some("*".to_owned())
        } else {
            None
        }
    }

    fn decorate(&self, response: &mut Response, allow_origin: &str) {
        response.add_header("Access-Control-Allow-Origin", allow_origin);
        if self.allow_credentials {
            response.add_header("Access-Control-Allow-Credentials", "true");
        }
        if allow_origin != "*" {
            response.add_header("Vary", "Origin");
        }
    }
}

impl Middleware for CorsMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let policy = self.policy.clone();

        Box::pin(async move {
            let Some(origin) = ctx.request().headers().get("origin").map(str::to_owned) else {
                return next.run(ctx).await;
            };
            let Some(allow_origin) = policy.allow_origin_for(&origin) else {
                return next.run(ctx).await;
            };

            if ctx.request().method() == &Method::Options {
                let mut resp = Response::new(StatusCode::NO_CONTENT)
                    .header("Access-Control-Allow-Methods", policy.allowed_methods.join(","))
                    .header("Access-Control-Allow-Headers", policy.allowed_headers.join(","))
                    .header("Access-Control-Max-Age", "3600");
                policy.decorate(&mut resp, &allow_origin);
                return resp;
            }

            let mut resp = next.run(ctx).await;
            policy.decorate(&mut resp, &allow_origin);
            resp
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Request, Router, middleware::Stack};

    fn request(method: &str, origin: Option<&str>) -> Request {
        let origin = origin.map(|o| format!("Origin: {o}\r\n")).unwrap_or_default();
        let raw = format!("{method} /api/ideas HTTP/1.1\r\n{origin}\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    fn handler(
        cors: CorsMiddleware,
    ) -> impl Fn(Request) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let mut router = Router::new();
        router.get("/api/ideas", |_ctx| async { Response::new(StatusCode::OK) });
        Stack::new().layer(cors).layer(router).into_handler()
    }

    fn local_cors() -> CorsMiddleware {
        CorsMiddleware::new()
            .allow_origin("http://localhost:3000")
            .allow_credentials(true)
    }

    #[tokio::test]
    async fn allowed_origin_is_echoed_with_credentials() {
        let res = handler(local_cors())(request("GET", Some("http://localhost:3000"))).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get("access-control-allow-origin"),
            Some("http://localhost:3000")
        );
        assert_eq!(res.headers().get("access-control-allow-credentials"), Some("true"));
        assert_eq!(res.headers().get("vary"), Some("Origin"));
    }

    #[tokio::test]
    async fn foreign_origin_passes_through_without_headers() {
        let res = handler(local_cors())(request("GET", Some("https://evil.example"))).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(!res.headers().contains("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn no_origin_passes_through() {
        let res = handler(local_cors())(request("GET", None)).await;
        assert!(!res.headers().contains("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn preflight_short_circuits() {
        let res = handler(local_cors())(request("OPTIONS", Some("http://localhost:3000"))).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(res.headers().get("access-control-allow-methods").unwrap().contains("GET"));
        assert_eq!(res.headers().get("access-control-max-age"), Some("3600"));
    }

    #[tokio::test]
    async fn wildcard_origin_omits_vary() {
        let cors = CorsMiddleware::new().allow_origin("*");
        let res = handler(cors)(request("GET", Some("https://anywhere.example"))).await;
        assert_eq!(res.headers().get("access-control-allow-origin"), Some("*"));
        assert!(!res.headers().contains("vary"));
    }
}
