//! Validation of the `page`, `size` and `sort` query parameters.
//!
//! Validation is pure: it touches neither the cache nor the network, so an
//! invalid request is rejected before either is consulted.

use std::fmt;

use thiserror::Error;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_SIZE: u32 = 10;
pub const MAX_SIZE: u32 = 100;

/// Sort direction on `published_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Sort {
    PublishedAsc,
    #[default]
    PublishedDesc,
}

impl Sort {
    /// The upstream's spelling: `published_at` or `-published_at`.
    pub fn as_str(self) -> &'static str {
        match self {
            Sort::PublishedAsc => "published_at",
            Sort::PublishedDesc => "-published_at",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "published_at" => Some(Sort::PublishedAsc),
            "-published_at" => Some(Sort::PublishedDesc),
            _ => None,
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query parameters as they arrived, before validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawListQuery<'a> {
    pub page: Option<&'a str>,
    pub size: Option<&'a str>,
    pub sort: Option<&'a str>,
}

/// A validated listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub page_number: u32,
    pub page_size: u32,
    pub sort: Sort,
}

/// Why a listing request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid page number")]
    InvalidPage,
    #[error("Invalid page size")]
    InvalidSize,
    #[error("Invalid sort parameter")]
    InvalidSort,
}

impl ValidationError {
    /// Stable machine-readable code.
    pub fn reason(self) -> &'static str {
        match self {
            ValidationError::InvalidPage => "invalid_page",
            ValidationError::InvalidSize => "invalid_size",
            ValidationError::InvalidSort => "invalid_sort",
        }
    }

    /// Human-readable explanation of the constraint.
    pub fn message(self) -> &'static str {
        match self {
            ValidationError::InvalidPage => "Page number must be a positive integer",
            ValidationError::InvalidSize => "Page size must be between 1 and 100",
            ValidationError::InvalidSort => {
                r#"Sort must be either "published_at" or "-published_at""#
            }
        }
    }
}

// Strict integer parse: no fractions, no trailing garbage, no empty string.
fn parse_int(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

impl ListQuery {
    /// Applies defaults and checks every constraint, page first, then size,
    /// then sort.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    pub fn validate(raw: RawListQuery<'_>) -> Result<Self, ValidationError> {
        let page_number = match raw.page {
            None => DEFAULT_PAGE,
            Some(p) => parse_int(p)
                .filter(|n| *n >= 1)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or(ValidationError::InvalidPage)?,
        };

        let page_size = match raw.size {
            None => DEFAULT_SIZE,
            Some(s) => parse_int(s)
                .filter(|n| (1..=i64::from(MAX_SIZE)).contains(n))
                .and_then(|n| u32::try_from(n).ok())
                .ok_or(ValidationError::InvalidSize)?,
        };

        let sort = match raw.sort {
            None => Sort::default(),
            Some(s) => Sort::parse(s).ok_or(ValidationError::InvalidSort)?,
        };

        Ok(Self {
            page_number,
            page_size,
            sort,
        })
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            page_number: self.page_number,
            page_size: self.page_size,
            sort: self.sort,
        }
    }
}

/// Identity of a cached listing page. Equal validated queries yield equal keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    page_number: u32,
    page_size: u32,
    sort: Sort,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ideas_{}_{}_{}", self.page_number, self.page_size, self.sort)
    }
}
