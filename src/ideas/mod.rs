//! The ideas listing relay: query validation, upstream access, image URL
//! normalization, reshaping into the canonical page, and the cached pipeline
//! tying them together.

pub mod model;
pub mod normalize;
pub mod query;
pub mod service;
pub mod transform;
pub mod upstream;

pub use model::{Idea, IdeasPage, Image, PageMeta};
pub use normalize::normalize_image;
pub use query::{CacheKey, ListQuery, RawListQuery, Sort, ValidationError};
pub use service::IdeasService;
pub use upstream::{IdeasSource, UpstreamClient, UpstreamError};
