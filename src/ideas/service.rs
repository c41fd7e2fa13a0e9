//! The cached listing pipeline: validate → cache lookup → fetch → transform →
//! cache insert.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::{Clock, TtlCache};
use crate::error::RelayError;

use super::model::IdeasPage;
use super::query::{CacheKey, ListQuery, RawListQuery};
use super::transform::to_canonical;
use super::upstream::IdeasSource;

type PageCache = TtlCache<CacheKey, Arc<IdeasPage>>;

/// Serves listing pages, from the cache when fresh and from the upstream
/// otherwise.
///
/// Built once at startup and shared by reference with the request handlers.
/// The cache lock is only taken for synchronous map operations and is never
/// held while the upstream call is in flight, so concurrent misses for the
/// same key may each call upstream; the last write wins.
pub struct IdeasService {
    source: Arc<dyn IdeasSource>,
    cache: Mutex<PageCache>,
}

impl IdeasService {
    pub fn new(source: Arc<dyn IdeasSource>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            cache: Mutex::new(TtlCache::new(ttl, clock)),
        }
    }

    fn cache(&self) -> MutexGuard<'_, PageCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the canonical page for the raw query parameters.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Validation`] before any cache or network access.
    /// - Upstream failures mapped through [`RelayError::from`].
    pub async fn list(&self, raw: RawListQuery<'_>) -> Result<Arc<IdeasPage>, RelayError> {
        let query = ListQuery::validate(raw)?;
        let key = query.cache_key();

        let cached = self.cache().get(&key);
        if let Some(page) = cached {
            debug!(key = %key, "serving from cache");
            return Ok(page);
        }

        info!(
            page = query.page_number,
            size = query.page_size,
            sort = %query.sort,
            "fetching ideas"
        );

        let upstream = self.source.fetch_page(&query).await?;
        let page = Arc::new(to_canonical(&query, upstream, self.source.origin())?);

        let mut cache = self.cache();
        cache.put(key, Arc::clone(&page));
        cache.sweep();

        Ok(page)
    }

    /// Number of cached pages, including stale ones not yet evicted.
    pub fn cache_size(&self) -> usize {
        self.cache().size()
    }

    /// Drops every cached page.
    pub fn clear_cache(&self) {
        self.cache().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DEFAULT_TTL, ManualClock};
    use crate::ideas::model::UpstreamPage;
    use crate::ideas::upstream::UpstreamError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a canned result and counts calls.
    struct FakeSource {
        calls: AtomicUsize,
        respond: fn(&ListQuery) -> Result<UpstreamPage, UpstreamError>,
    }

    impl FakeSource {
        fn new(respond: fn(&ListQuery) -> Result<UpstreamPage, UpstreamError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                respond,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdeasSource for FakeSource {
        async fn fetch_page(&self, query: &ListQuery) -> Result<UpstreamPage, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.respond)(query)
        }

        fn origin(&self) -> &str {
            "https://origin.test"
        }
    }

    fn one_idea(query: &ListQuery) -> Result<UpstreamPage, UpstreamError> {
        Ok(serde_json::from_value(json!({
            "data": [{ "id": query.page_number, "small_image": { "url": "x.jpg" } }],
            "meta": { "total": 1 }
        }))
        .unwrap())
    }

    fn service(source: Arc<FakeSource>) -> (IdeasService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (IdeasService::new(source, DEFAULT_TTL, clock.clone()), clock)
    }

    fn raw<'a>(page: &'a str) -> RawListQuery<'a> {
        RawListQuery {
            page: Some(page),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let source = FakeSource::new(one_idea);
        let (svc, _clock) = service(source.clone());

        let first = svc.list(raw("1")).await.unwrap();
        let second = svc.list(raw("1")).await.unwrap();

        assert_eq!(source.calls(), 1);
        assert_eq!(
            serde_json::to_vec(&*first).unwrap(),
            serde_json::to_vec(&*second).unwrap()
        );
        assert_eq!(first.items[0].small_image.as_ref().unwrap().url, "https://origin.test/x.jpg");
        assert_eq!(svc.cache_size(), 1);
    }

    #[tokio::test]
    async fn expired_entry_triggers_one_fresh_call() {
        let source = FakeSource::new(one_idea);
        let (svc, clock) = service(source.clone());
        let key = ListQuery::validate(raw("1")).unwrap().cache_key();

        svc.list(raw("1")).await.unwrap();
        let first_stamp = svc.cache().inserted_at(&key).unwrap();

        clock.advance(DEFAULT_TTL);
        svc.list(raw("1")).await.unwrap();
        svc.list(raw("1")).await.unwrap();

        assert_eq!(source.calls(), 2);
        assert!(svc.cache().inserted_at(&key).unwrap() > first_stamp);
    }

    #[tokio::test]
    async fn distinct_parameters_are_cached_separately() {
        let source = FakeSource::new(one_idea);
        let (svc, _clock) = service(source.clone());

        svc.list(raw("1")).await.unwrap();
        svc.list(raw("2")).await.unwrap();
        svc.list(RawListQuery {
            page: Some("1"),
            sort: Some("published_at"),
            ..Default::default()
        })
        .await
        .unwrap();

        assert_eq!(source.calls(), 3);
        assert_eq!(svc.cache_size(), 3);
    }

    #[tokio::test]
    async fn invalid_query_never_reaches_upstream() {
        let source = FakeSource::new(one_idea);
        let (svc, _clock) = service(source.clone());

        for bad in [
            raw("0"),
            raw("x"),
            RawListQuery { size: Some("101"), ..Default::default() },
            RawListQuery { sort: Some("title"), ..Default::default() },
        ] {
            assert!(matches!(svc.list(bad).await, Err(RelayError::Validation(_))));
        }
        assert_eq!(source.calls(), 0);
        assert_eq!(svc.cache_size(), 0);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let source = FakeSource::new(|_| Err(UpstreamError::Timeout));
        let (svc, _clock) = service(source.clone());

        assert!(matches!(svc.list(raw("1")).await, Err(RelayError::Timeout)));
        assert!(matches!(svc.list(raw("1")).await, Err(RelayError::Timeout)));
        assert_eq!(source.calls(), 2);
        assert_eq!(svc.cache_size(), 0);
    }

    #[tokio::test]
    async fn missing_data_is_a_format_error() {
        let source = FakeSource::new(|_| Ok(UpstreamPage::default()));
        let (svc, _clock) = service(source);
        assert!(matches!(svc.list(raw("1")).await, Err(RelayError::UpstreamFormat(_))));
    }

    #[tokio::test]
    async fn put_sweeps_other_stale_entries() {
        let source = FakeSource::new(one_idea);
        let (svc, clock) = service(source);

        svc.list(raw("1")).await.unwrap();
        clock.advance(DEFAULT_TTL + Duration::from_secs(1));
        assert_eq!(svc.cache_size(), 1);

        svc.list(raw("2")).await.unwrap();
        assert_eq!(svc.cache_size(), 1);
    }

    #[tokio::test]
    async fn clear_empties_cache() {
        let source = FakeSource::new(one_idea);
        let (svc, _clock) = service(source);
        svc.list(raw("1")).await.unwrap();
        svc.clear_cache();
        assert_eq!(svc.cache_size(), 0);
    }

    /// Holds every fetch open until the test releases the gate.
    struct GatedSource {
        calls: AtomicUsize,
        gate: tokio::sync::Notify,
    }

    #[async_trait]
    impl IdeasSource for GatedSource {
        async fn fetch_page(&self, query: &ListQuery) -> Result<UpstreamPage, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            one_idea(query)
        }

        fn origin(&self) -> &str {
            "https://origin.test"
        }
    }

    #[tokio::test]
    async fn concurrent_misses_each_fetch_and_share_one_entry() {
        let source = Arc::new(GatedSource {
            calls: AtomicUsize::new(0),
            gate: tokio::sync::Notify::new(),
        });
        let svc = IdeasService::new(source.clone(), DEFAULT_TTL, Arc::new(ManualClock::new()));

        let release = async {
            while source.calls.load(Ordering::SeqCst) < 2 {
                tokio::task::yield_now().await;
            }
            source.gate.notify_waiters();
        };
        let (first, second, ()) = tokio::join!(svc.list(raw("1")), svc.list(raw("1")), release);

        assert!(first.is_ok() && second.is_ok());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(svc.cache_size(), 1);
    }
}
