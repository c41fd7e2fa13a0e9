//! Reshapes an upstream page into the canonical [`IdeasPage`].

use super::model::{Idea, IdeasPage, PageMeta, UpstreamIdea, UpstreamMeta, UpstreamPage};
use super::normalize::normalize_image;
use super::query::ListQuery;
use super::upstream::UpstreamError;

const UNTITLED: &str = "Untitled";

/// Builds the canonical page, applying every per-field default.
///
/// # Errors
///
/// Returns [`UpstreamError::Format`] when the upstream body has no `data` list.
pub fn to_canonical(
    query: &ListQuery,
    page: UpstreamPage,
    origin: &str,
) -> Result<IdeasPage, UpstreamError> {
    let items = page
        .data
        .ok_or_else(|| UpstreamError::Format("response has no data list".to_owned()))?;

    Ok(IdeasPage {
        items: items.into_iter().map(|item| to_idea(item, origin)).collect(),
        meta: to_meta(query, page.meta.unwrap_or_default()),
    })
}

fn to_idea(item: UpstreamIdea, origin: &str) -> Idea {
    Idea {
        id: item.id,
        title: item
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED.to_owned()),
        published_at: item.published_at,
        small_image: normalize_image(item.small_image, origin),
        medium_image: normalize_image(item.medium_image, origin),
        created_at: item.created_at,
        updated_at: item.updated_at,
    }
}

fn to_meta(query: &ListQuery, meta: UpstreamMeta) -> PageMeta {
    let page = u64::from(query.page_number);
    let size = u64::from(query.page_size);
    let total = meta.total.unwrap_or(0);

    PageMeta {
        total,
        current_page: meta.current_page.unwrap_or(page),
        per_page: meta.per_page.unwrap_or(size),
        last_page: meta.last_page.unwrap_or_else(|| total.div_ceil(size.max(1))),
        from: meta.from.unwrap_or(page.saturating_sub(1) * size + 1),
        to: meta.to.unwrap_or_else(|| (page * size).min(total)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ideas::query::{RawListQuery, Sort};
    use serde_json::json;

    const ORIGIN: &str = "https://suitmedia-backend.suitdev.com";

    fn query(page: u32, size: u32) -> ListQuery {
        ListQuery {
            page_number: page,
            page_size: size,
            sort: Sort::PublishedDesc,
        }
    }

    fn upstream(value: serde_json::Value) -> UpstreamPage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn missing_data_is_a_format_error() {
        let q = ListQuery::validate(RawListQuery::default()).unwrap();
        let err = to_canonical(&q, upstream(json!({ "meta": { "total": 3 } })), ORIGIN).unwrap_err();
        assert!(matches!(err, UpstreamError::Format(_)));
    }

    #[test]
    fn items_are_reshaped() {
        let page = upstream(json!({
            "data": [{
                "id": 1,
                "title": "Hello",
                "published_at": "2024-01-02 03:04:05",
                "small_image": { "id": 9, "url": "/s.jpg" },
                "medium_image": null,
                "created_at": "2024-01-01",
                "updated_at": "2024-01-03",
                "content": "<p>dropped</p>"
            }, {
                "id": 2,
                "title": ""
            }]
        }));

        let out = to_canonical(&query(1, 10), page, ORIGIN).unwrap();
        let first = &out.items[0];
        assert_eq!(first.title, "Hello");
        assert_eq!(first.small_image.as_ref().unwrap().url, format!("{ORIGIN}/s.jpg"));
        assert_eq!(first.small_image.as_ref().unwrap().extra["id"], json!(9));
        assert!(first.medium_image.is_none());
        assert_eq!(out.items[1].title, "Untitled");

        let value = serde_json::to_value(first).unwrap();
        assert!(value.get("content").is_none());
        assert_eq!(value["medium_image"], json!(null));
    }

    #[test]
    fn missing_title_defaults() {
        let out = to_canonical(&query(1, 10), upstream(json!({ "data": [{ "id": 5 }] })), ORIGIN).unwrap();
        assert_eq!(out.items[0].title, "Untitled");
    }

    #[test]
    fn meta_defaults_without_upstream_meta() {
        let out = to_canonical(&query(3, 10), upstream(json!({ "data": [] })), ORIGIN).unwrap();
        assert_eq!(
            out.meta,
            PageMeta {
                total: 0,
                current_page: 3,
                per_page: 10,
                last_page: 0,
                from: 21,
                to: 0,
            }
        );
    }

    #[test]
    fn meta_defaults_are_computed_from_total() {
        let out = to_canonical(
            &query(2, 10),
            upstream(json!({ "data": [], "meta": { "total": 25 } })),
            ORIGIN,
        )
        .unwrap();
        assert_eq!(out.meta.last_page, 3);
        assert_eq!(out.meta.from, 11);
        assert_eq!(out.meta.to, 20);

        let last = to_canonical(
            &query(3, 10),
            upstream(json!({ "data": [], "meta": { "total": 25 } })),
            ORIGIN,
        )
        .unwrap();
        assert_eq!(last.meta.to, 25);
    }

    #[test]
    fn upstream_meta_wins_when_present() {
        let out = to_canonical(
            &query(1, 10),
            upstream(json!({ "data": [], "meta": {
                "total": 40, "current_page": 4, "per_page": 5,
                "last_page": 8, "from": 16, "to": 20
            } })),
            ORIGIN,
        )
        .unwrap();
        assert_eq!(
            out.meta,
            PageMeta {
                total: 40,
                current_page: 4,
                per_page: 5,
                last_page: 8,
                from: 16,
                to: 20,
            }
        );
    }
}
