//! Page cache — per-route full-response caching with explicit modes.
//!
//! What a framework runtime does implicitly behind `force-static` /
//! `force-dynamic` / `revalidate` flags is modeled here as an explicit
//! [`CacheMode`] per route and a trivial in-memory TTL store. The cart
//! actions call [`PageCache::revalidate_path`] after each mutation — that
//! call *is* the view invalidation signal.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How a route's rendered page may be cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Render once, serve the cached body until the path is revalidated.
    Static,
    /// Never cache; every request re-renders.
    Dynamic,
    /// Serve the cached body until it is older than the given duration.
    RevalidateAfter(Duration),
}

#[derive(Debug, Clone)]
struct CachedPage {
    body: String,
    rendered_at: Instant,
}

/// In-memory cache of rendered page bodies, keyed by path.
///
/// # Examples
///
/// ```
/// use cachelab::cache::{CacheMode, PageCache};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let pages = PageCache::new();
/// let body = pages
///     .render("/cart", CacheMode::Static, || async { "rendered".to_string() })
///     .await;
/// assert_eq!(body, "rendered");
/// pages.revalidate_path("/cart");
/// # });
/// ```
#[derive(Default)]
pub struct PageCache {
    pages: Mutex<HashMap<String, CachedPage>>,
}

impl PageCache {
    /// Creates an empty page cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `path` under the given mode, calling `render` only on a miss.
    ///
    /// The lock is never held across the render await; two concurrent
    /// misses may both render, and the later store wins. Harmless for a
    /// cache of idempotent page bodies.
    pub async fn render<F, Fut>(&self, path: &str, mode: CacheMode, render: F) -> String
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = String>,
    {
        if let Some(body) = self.lookup(path, mode) {
            tracing::debug!(path = %path, "page cache hit");
            return body;
        }

        let body = render().await;
        if mode != CacheMode::Dynamic {
            self.store(path, body.clone());
        }
        body
    }

    /// Drops the cached body for `path`, forcing the next read to re-render.
    pub fn revalidate_path(&self, path: &str) {
        if self.lock().remove(path).is_some() {
            tracing::debug!(path = %path, "page revalidated");
        }
    }

    fn lookup(&self, path: &str, mode: CacheMode) -> Option<String> {
        let pages = self.lock();
        let page = pages.get(path)?;
        match mode {
            CacheMode::Dynamic => None,
            CacheMode::Static => Some(page.body.clone()),
            CacheMode::RevalidateAfter(max_age) => {
                (page.rendered_at.elapsed() < max_age).then(|| page.body.clone())
            }
        }
    }

    fn store(&self, path: &str, body: String) {
        self.lock().insert(
            path.to_string(),
            CachedPage {
                body,
                rendered_at: Instant::now(),
            },
        );
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CachedPage>> {
        self.pages.lock().unwrap_or_else(|e| e.into_inner())
    }
}
