//! Image URL normalization.

use super::model::{Image, UpstreamImage};

/// Rewrites an upstream image so its `url` is absolute.
///
/// - absent image, or a missing/empty `url` → `None`
/// - `/path` → `{origin}/path`
/// - any other value without an `http://`/`https://` scheme → `{origin}/{value}`
/// - absolute URLs are kept as they are
///
/// Every other field of the image is carried over untouched.
///
/// # Examples
///
/// ```
/// use ideas_relay::ideas::model::UpstreamImage;
/// use ideas_relay::ideas::normalize_image;
///
/// let image = UpstreamImage { url: Some("/images/a.jpg".into()), ..Default::default() };
/// let fixed = normalize_image(Some(image), "https://suitmedia-backend.suitdev.com").unwrap();
/// assert_eq!(fixed.url, "https://suitmedia-backend.suitdev.com/images/a.jpg");
/// ```
pub fn normalize_image(image: Option<UpstreamImage>, origin: &str) -> Option<Image> {
    let UpstreamImage { url, extra } = image?;
    let url = url.filter(|u| !u.is_empty())?;

    let url = if url.starts_with("http://") || url.starts_with("https://") {
        url
    } else if url.starts_with('/') {
        format!("{origin}{url}")
    } else {
        format!("{origin}/{url}")
    };

    Some(Image { url, extra })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    const ORIGIN: &str = "https://suitmedia-backend.suitdev.com";

    fn image(url: Option<&str>) -> Option<UpstreamImage> {
        Some(UpstreamImage {
            url: url.map(str::to_owned),
            extra: Map::new(),
        })
    }

    fn url_of(input: Option<UpstreamImage>) -> Option<String> {
        normalize_image(input, ORIGIN).map(|i| i.url)
    }

    #[test]
    fn root_relative_gets_origin() {
        assert_eq!(
            url_of(image(Some("/images/a.jpg"))).as_deref(),
            Some("https://suitmedia-backend.suitdev.com/images/a.jpg")
        );
    }

    #[test]
    fn bare_relative_gets_origin_and_slash() {
        assert_eq!(
            url_of(image(Some("a.jpg"))).as_deref(),
            Some("https://suitmedia-backend.suitdev.com/a.jpg")
        );
    }

    #[test]
    fn absolute_is_unchanged() {
        assert_eq!(url_of(image(Some("https://x/a.jpg"))).as_deref(), Some("https://x/a.jpg"));
        assert_eq!(url_of(image(Some("http://x/a.jpg"))).as_deref(), Some("http://x/a.jpg"));
    }

    #[test]
    fn absent_or_empty_is_none() {
        assert!(normalize_image(None, ORIGIN).is_none());
        assert!(url_of(image(None)).is_none());
        assert!(url_of(image(Some(""))).is_none());
    }

    #[test]
    fn other_fields_pass_through() {
        let mut extra = Map::new();
        extra.insert("mime".into(), json!("image/png"));
        extra.insert("id".into(), json!(12));
        let fixed = normalize_image(
            Some(UpstreamImage {
                url: Some("a.png".into()),
                extra: extra.clone(),
            }),
            ORIGIN,
        )
        .unwrap();
        assert_eq!(fixed.extra, extra);
    }
}
