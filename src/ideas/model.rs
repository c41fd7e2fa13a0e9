//! Wire types: the upstream payload as received and the canonical page the
//! relay serves.
//!
//! Every upstream field is optional here; defaults are applied once, in
//! [`transform`](super::transform), rather than at each use.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Upstream schema ───────────────────────────────────────────────────────────

/// Body of a successful upstream listing response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamPage {
    #[serde(default)]
    pub data: Option<Vec<UpstreamIdea>>,
    #[serde(default)]
    pub meta: Option<UpstreamMeta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamIdea {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub small_image: Option<UpstreamImage>,
    #[serde(default)]
    pub medium_image: Option<UpstreamImage>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// An image object as the upstream sends it; `url` may be relative or missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamImage {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamMeta {
    pub total: Option<u64>,
    pub current_page: Option<u64>,
    pub per_page: Option<u64>,
    pub last_page: Option<u64>,
    pub from: Option<u64>,
    pub to: Option<u64>,
}

/// Error body the upstream may attach to a non-success status.
#[derive(Debug, Deserialize)]
pub(crate) struct UpstreamErrorBody {
    pub message: Option<String>,
}

// ── Canonical schema ──────────────────────────────────────────────────────────

/// The response served by `GET /api/ideas`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdeasPage {
    #[serde(rename = "data")]
    pub items: Vec<Idea>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Idea {
    pub id: Value,
    pub title: String,
    pub published_at: Option<String>,
    pub small_image: Option<Image>,
    pub medium_image: Option<Image>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// An image whose `url` is always absolute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Image {
    pub url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total: u64,
    pub current_page: u64,
    pub per_page: u64,
    pub last_page: u64,
    pub from: u64,
    pub to: u64,
}
