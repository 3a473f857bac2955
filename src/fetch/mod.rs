//! Fetch helpers — upstream HTTP calls behind an explicit response cache.
//!
//! The four caching behaviors a framework's `fetch` wrapper hides are made
//! explicit as a [`FetchPolicy`] per call: cache forever, never cache,
//! expire after a duration, or cache under tags that can be revalidated on
//! demand. Upstream transport and HTTP-status failures surface unchanged
//! through [`FetchError`]; nothing is cached on failure.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Caching behavior for one upstream fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPolicy {
    /// Cache the response body per URL indefinitely.
    ForceCache,
    /// Always hit the upstream; never read or write the cache.
    NoStore,
    /// Serve the cached body until it is older than the given duration.
    Revalidate(Duration),
    /// Cache indefinitely under tags; [`Fetcher::revalidate_tag`] evicts.
    Tags(Vec<String>),
}

/// Errors from an upstream fetch, propagated unchanged.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Upstream(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
struct CachedFetch {
    body: String,
    fetched_at: Instant,
    tags: Vec<String>,
}

/// An upstream HTTP client with a per-URL response cache.
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
/// use cachelab::fetch::{FetchPolicy, Fetcher};
///
/// # async fn example() -> Result<(), cachelab::fetch::FetchError> {
/// let fetcher = Fetcher::new();
/// let posts = fetcher
///     .get("https://example.com/posts", FetchPolicy::Revalidate(Duration::from_secs(3600)))
///     .await?;
/// # let _ = posts;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Fetcher {
    client: reqwest::Client,
    cache: Mutex<HashMap<String, CachedFetch>>,
}

impl Fetcher {
    /// Creates a fetcher with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches `url` under the given policy, returning the response body.
    ///
    /// A cache hit short-circuits the network call entirely. On a miss the
    /// upstream is fetched; the body is cached only when the policy allows
    /// it and the fetch succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Upstream`] for transport failures and non-2xx
    /// upstream statuses, carrying the original error unchanged.
    pub async fn get(&self, url: &str, policy: FetchPolicy) -> Result<String, FetchError> {
        if policy == FetchPolicy::NoStore {
            return self.fetch_fresh(url).await;
        }

        if let Some(body) = self.cached(url, &policy) {
            tracing::debug!(url = %url, "fetch cache hit");
            return Ok(body);
        }

        let body = self.fetch_fresh(url).await?;
        let tags = match policy {
            FetchPolicy::Tags(tags) => tags,
            _ => Vec::new(),
        };
        self.lock().insert(
            url.to_string(),
            CachedFetch {
                body: body.clone(),
                fetched_at: Instant::now(),
                tags,
            },
        );
        Ok(body)
    }

    /// Evicts every cached entry carrying `tag`.
    pub fn revalidate_tag(&self, tag: &str) {
        let mut cache = self.lock();
        let before = cache.len();
        cache.retain(|_, entry| !entry.tags.iter().any(|t| t == tag));
        let evicted = before - cache.len();
        if evicted > 0 {
            tracing::debug!(tag = %tag, evicted, "fetch cache tag revalidated");
        }
    }

    fn cached(&self, url: &str, policy: &FetchPolicy) -> Option<String> {
        let cache = self.lock();
        let entry = cache.get(url)?;
        match policy {
            FetchPolicy::NoStore => None,
            FetchPolicy::ForceCache | FetchPolicy::Tags(_) => Some(entry.body.clone()),
            FetchPolicy::Revalidate(max_age) => {
                (entry.fetched_at.elapsed() < *max_age).then(|| entry.body.clone())
            }
        }
    }

    async fn fetch_fresh(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!(url = %url, "upstream fetch");
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CachedFetch>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    fn seed(&self, url: &str, body: &str, tags: &[&str]) {
        self.lock().insert(
            url.to_string(),
            CachedFetch {
                body: body.to_string(),
                fetched_at: Instant::now(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            },
        );
    }

    #[cfg(test)]
    fn is_cached(&self, url: &str) -> bool {
        self.lock().contains_key(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::server::Server;
    use crate::{Response, StatusCode};

    #[tokio::test]
    async fn force_cache_serves_cached_body_without_network() {
        let fetcher = Fetcher::new();
        fetcher.seed("http://upstream/posts", "cached posts", &[]);
        let body = fetcher
            .get("http://upstream/posts", FetchPolicy::ForceCache)
            .await
            .unwrap();
        assert_eq!(body, "cached posts");
    }

    #[tokio::test]
    async fn zero_ttl_entry_is_stale() {
        let fetcher = Fetcher::new();
        fetcher.seed("http://upstream/posts", "cached posts", &[]);
        assert!(
            fetcher
                .cached("http://upstream/posts", &FetchPolicy::Revalidate(Duration::ZERO))
                .is_none()
        );
    }

    #[tokio::test]
    async fn long_ttl_entry_is_fresh() {
        let fetcher = Fetcher::new();
        fetcher.seed("http://upstream/posts", "cached posts", &[]);
        assert_eq!(
            fetcher.cached(
                "http://upstream/posts",
                &FetchPolicy::Revalidate(Duration::from_secs(3600))
            ),
            Some("cached posts".to_string())
        );
    }

    #[tokio::test]
    async fn revalidate_tag_evicts_only_tagged_entries() {
        let fetcher = Fetcher::new();
        fetcher.seed("http://upstream/posts", "posts", &["posts"]);
        fetcher.seed("http://upstream/users", "users", &["users"]);
        fetcher.revalidate_tag("posts");
        assert!(!fetcher.is_cached("http://upstream/posts"));
        assert!(fetcher.is_cached("http://upstream/users"));
    }

    #[tokio::test]
    async fn fetch_against_local_upstream() {
        let hits = Arc::new(AtomicUsize::new(0));
        let handler_hits = Arc::clone(&hits);

        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr();
        tokio::spawn(async move {
            let _ = server
                .run(move |_req| {
                    let n = handler_hits.fetch_add(1, Ordering::SeqCst) + 1;
                    async move { Response::new(StatusCode::Ok).body(format!("hit {n}")) }
                })
                .await;
        });

        let url = format!("http://{addr}/posts");
        let fetcher = Fetcher::new();

        // ForceCache: second call must not reach the upstream.
        let first = fetcher.get(&url, FetchPolicy::ForceCache).await.unwrap();
        let second = fetcher.get(&url, FetchPolicy::ForceCache).await.unwrap();
        assert_eq!(first, "hit 1");
        assert_eq!(second, "hit 1");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // NoStore: bypasses the cache entirely.
        let fresh = fetcher.get(&url, FetchPolicy::NoStore).await.unwrap();
        assert_eq!(fresh, "hit 2");
    }

    #[tokio::test]
    async fn upstream_failure_propagates_and_is_not_cached() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{addr}/posts");
        let fetcher = Fetcher::new();
        let result = fetcher.get(&url, FetchPolicy::ForceCache).await;
        assert!(matches!(result, Err(FetchError::Upstream(_))));
        assert!(!fetcher.is_cached(&url));
    }
}
