//! Endpoint handlers for the relay's own API.

use serde_json::json;

use crate::context::Context;
use crate::error::timestamp;
use crate::http::{Response, StatusCode};
use crate::ideas::{IdeasService, RawListQuery};

/// `GET /api/ideas?page=&size=&sort=`
pub async fn list_ideas(ideas: &IdeasService, ctx: Context) -> Response {
    let request = ctx.request();
    let raw = RawListQuery {
        page: request.query_param("page"),
        size: request.query_param("size"),
        sort: request.query_param("sort"),
    };

    match ideas.list(raw).await {
        Ok(page) => Response::json(StatusCode::OK, &*page),
        Err(e) => e.into_response(request.path()),
    }
}

/// `GET /health`
pub fn health(ideas: &IdeasService) -> Response {
    Response::json(
        StatusCode::OK,
        &json!({
            "status": "healthy",
            "timestamp": timestamp(),
            "cache_size": ideas.cache_size(),
        }),
    )
}

/// Any `/api/*` path without a route of its own.
pub fn api_not_found(ctx: &Context) -> Response {
    let path = ctx.request().path();
    Response::json(
        StatusCode::NOT_FOUND,
        &json!({
            "error": "Endpoint not found",
            "message": format!("The requested endpoint {path} does not exist"),
        }),
    )
}
