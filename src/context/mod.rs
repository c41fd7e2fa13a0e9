//! Per-request context — the parsed request plus the path parameters captured
//! by the router.

use std::collections::HashMap;

use crate::Request;

/// Path parameters extracted from the matched route.
#[derive(Default, Debug, Clone)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.map.insert(key, value);
    }

    /// Get a captured value by parameter name (`wildcard` for `/*` routes).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }
}

/// Per-request context handed to middleware and route handlers.
pub struct Context {
    request: Request,
    params: PathParams,
}

impl Context {
    /// Create a new context from a request, with no path parameters.
    pub fn new(request: Request) -> Self {
        Self::with_params(request, PathParams::new())
    }

    /// Create a context carrying parameters captured by a route match.
    pub fn with_params(request: Request, params: PathParams) -> Self {
        Self { request, params }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// Consume the context, returning the underlying request.
    pub fn into_request(self) -> Request {
        self.request
    }
}
