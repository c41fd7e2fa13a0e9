//! Generic passthrough: `/proxy/<rest>` is forwarded to `<target>/<rest>`.

use std::time::Duration;

use reqwest::{Client, header};
use serde_json::json;
use tracing::{debug, warn};

use crate::context::Context;
use crate::error::timestamp;
use crate::http::{Response, StatusCode};

// Request headers copied onto the forwarded request.
const FORWARDED_HEADERS: [&str; 3] = ["Content-Type", "Accept", "Authorization"];

/// Forwards requests to one fixed host, relaying its status, content type
/// and body verbatim.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    client: Client,
    target: String,
}

impl ProxyClient {
    /// # Errors
    /// Fails when the underlying HTTP client cannot be built.
    pub fn new(target: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        let target: String = target.into();
        Ok(Self {
            client,
            target: target.trim_end_matches('/').to_owned(),
        })
    }

    /// Builds the outbound URL from the part of the path below the prefix.
    pub fn target_url(&self, rest: &str, query: Option<&str>) -> String {
        let rest = if rest.is_empty() { "/" } else { rest };
        match query {
            Some(q) if !q.is_empty() => format!("{}{rest}?{q}", self.target),
            _ => format!("{}{rest}", self.target),
        }
    }

    /// Forwards the request held by `ctx`. Expects the route's `wildcard`
    /// capture to hold the path below `/proxy`.
    pub async fn forward(&self, ctx: Context) -> Response {
        let request = ctx.request();
        let path = request.path().to_owned();
        let url = self.target_url(
            ctx.params().get("wildcard").unwrap_or_default(),
            request.query_string(),
        );

        let method = match reqwest::Method::from_bytes(request.method().as_str().as_bytes()) {
            Ok(m) => m,
            Err(_) => return failure(StatusCode::BAD_REQUEST, "Bad request", &path),
        };

        debug!(%method, %url, "proxying request");

        let mut outbound = self.client.request(method, &url);
        for name in FORWARDED_HEADERS {
            if let Some(value) = request.headers().get(name) {
                outbound = outbound.header(name, value);
            }
        }
        if !request.body().is_empty() {
            outbound = outbound.body(request.body().clone());
        }

        let upstream = match outbound.send().await {
            Ok(resp) => resp,
            Err(e) => return Self::map_error(&e, &path),
        };

        let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        let content_type = upstream
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = match upstream.bytes().await {
            Ok(body) => body,
            Err(e) => return Self::map_error(&e, &path),
        };

        let mut response = Response::new(status).body_bytes(body.to_vec());
        if let Some(content_type) = content_type {
            response.add_header("Content-Type", content_type);
        }
        response
    }

    fn map_error(e: &reqwest::Error, path: &str) -> Response {
        warn!(path, error = %e, "proxy request failed");
        if e.is_timeout() {
            failure(StatusCode::GATEWAY_TIMEOUT, "Request timeout", path)
        } else if e.is_connect() {
            failure(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable", path)
        } else {
            failure(StatusCode::BAD_GATEWAY, "Bad gateway", path)
        }
    }
}

fn failure(status: StatusCode, error: &str, path: &str) -> Response {
    Response::json(
        status,
        &json!({
            "error": error,
            "timestamp": timestamp(),
            "path": path,
        }),
    )
}
