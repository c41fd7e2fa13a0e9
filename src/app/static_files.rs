//! Serves files from a document root for paths the API does not own.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::http::{Response, StatusCode};

const INDEX_FILE: &str = "index.html";

/// A read-only view of a directory on disk.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a request path onto the document root.
    ///
    /// Returns `None` for paths that would escape the root: any `..` segment,
    /// an absolute component, or a NUL byte after percent-decoding.
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let decoded = urlencoding::decode(request_path).ok()?;
        if decoded.contains('\0') || decoded.contains('\\') {
            return None;
        }

        let mut resolved = self.root.clone();
        for component in Path::new(decoded.trim_start_matches('/')).components() {
            match component {
                Component::Normal(segment) => resolved.push(segment),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(resolved)
    }

    /// Answers a `GET` for `request_path`: the file itself, `index.html` for a
    /// directory, `404` when missing, `403` when the path escapes the root.
    pub async fn serve(&self, request_path: &str) -> Response {
        let Some(mut path) = self.resolve(request_path) else {
            warn!(path = request_path, "rejected static path outside document root");
            return Response::new(StatusCode::FORBIDDEN).body("Forbidden");
        };

        if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
            path.push(INDEX_FILE);
        }

        match tokio::fs::read(&path).await {
            Ok(contents) => Response::new(StatusCode::OK)
                .header("Content-Type", content_type(&path))
                .body_bytes(contents),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::IsADirectory) => {
                debug!(path = %path.display(), "static file not found");
                Response::new(StatusCode::NOT_FOUND).body("Not Found")
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read static file");
                Response::new(StatusCode::INTERNAL_SERVER_ERROR).body("Internal Server Error")
            }
        }
    }
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}
