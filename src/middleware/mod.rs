//! Middleware pipeline — composable before/after request handler logic.
//!
//! Core types for the ordered middleware stack. Each middleware wraps the
//! next layer, so it can inspect the request, decorate the response, or
//! short-circuit without coupling handlers to infrastructure concerns.
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining chain; call [`Next::run`] to
//!   advance to the next layer.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`from_middleware`] — converts a [`Middleware`] trait object into a
//!   [`MiddlewareHandler`].
//! - [`RequestStamp`] — the shipped interceptor: stamps two response headers
//!   and logs the request path, skipping an exclusion list.

use std::{future::Future, pin::Pin, sync::Arc};

use chrono::{SecondsFormat, Utc};

use crate::{Response, StatusCode, context::Context};

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is passed to each middleware's [`Middleware::handle`]. Calling
/// [`Next::run`] advances the cursor by one position and invokes the next
/// layer (or returns a fallback `500` when the chain is exhausted without
/// producing a response).
///
/// `Next` is consumed by [`run`](Self::run), so it cannot be called more
/// than once per middleware invocation.
pub struct Next {
    middlewares: Vec<MiddlewareHandler>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
}

/// A type-erased, reference-counted middleware function.
///
/// Every entry in the middleware stack is stored as a `MiddlewareHandler`.
/// The [`Arc`] makes handlers cheap to clone so [`Next`] can advance through
/// the chain without copying closures.
pub type MiddlewareHandler = Arc<
    dyn Fn(Context, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static,
>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use cachelab::middleware::{RequestStamp, from_middleware};
///
/// let handler = from_middleware(Arc::new(RequestStamp::new()));
/// ```
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

impl Next {
    /// Creates a new `Next` positioned at the start of the given middleware stack.
    pub fn new(middlewares: Vec<MiddlewareHandler>) -> Self {
        Self {
            middlewares,
            index: 0,
        }
    }

    /// Invokes the next middleware in the chain and returns its response.
    ///
    /// Advances the internal cursor by one, clones the handler at the
    /// current position, and awaits it. If no handler remains, a `500`
    /// response is returned as a safe fallback.
    pub async fn run(mut self, ctx: Context) -> Response {
        if self.index < self.middlewares.len() {
            let handler = self.middlewares[self.index].clone();
            self.index += 1;
            handler(ctx, self).await
        } else {
            Response::new(StatusCode::InternalServerError)
                .body("No response generated by middleware pipeline")
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors receive a [`Context`] and a [`Next`] cursor. They may pass
/// through (`next.run(ctx).await`), short-circuit with their own
/// [`Response`], or decorate the downstream response before returning it.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync`; middleware is shared across
///   Tokio tasks.
/// - `handle` **must** return a pinned, `Send` future.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the next middleware.
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

/// The request interceptor: stamps cache-hint headers and logs each request.
///
/// Runs before the router for every inbound request. For non-excluded paths
/// it emits one `tracing::info!` line with the request path, then sets two
/// headers on the downstream response:
///
/// - `cache-control-hint: no-cache`
/// - `request-timestamp: <RFC 3339 UTC>`
///
/// Headers are *set* (replacing any existing value), never appended. The
/// interceptor never alters the request and never short-circuits; excluded
/// paths (static assets, favicon) pass through untouched.
///
/// # Examples
///
/// ```rust
/// use cachelab::middleware::RequestStamp;
///
/// let stamp = RequestStamp::new().exclude("/healthz");
/// ```
pub struct RequestStamp {
    excluded: Vec<String>,
}

impl Default for RequestStamp {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestStamp {
    /// Creates the interceptor with the default exclusion list:
    /// `/_internal-assets/*` and `/favicon.ico`.
    pub fn new() -> Self {
        Self {
            excluded: vec![
                "/_internal-assets/*".to_string(),
                "/favicon.ico".to_string(),
            ],
        }
    }

    /// Adds a path to the exclusion list.
    ///
    /// A pattern ending in `/*` excludes every path under that prefix;
    /// anything else is an exact path match.
    #[must_use]
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excluded.push(pattern.into());
        self
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.excluded.iter().any(|pattern| {
            match pattern.strip_suffix("/*") {
                Some(prefix) => path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
                None => pattern == path,
            }
        })
    }
}

impl Middleware for RequestStamp {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let skip = self.is_excluded(ctx.request().path());
        let path = ctx.request().path().to_owned();

        Box::pin(async move {
            if skip {
                return next.run(ctx).await;
            }

            tracing::info!(path = %path, "request");

            let mut response = next.run(ctx).await;
            response.set_header("cache-control-hint", "no-cache");
            response.set_header(
                "request-timestamp",
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            );
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;

    fn make_context(path: &str) -> Context {
        let raw = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        Context::new(req)
    }

    fn terminal() -> MiddlewareHandler {
        Arc::new(|_ctx, _next| Box::pin(async { Response::new(StatusCode::Ok).body("done") }))
    }

    #[tokio::test]
    async fn empty_chain_falls_back_to_500() {
        let res = Next::new(vec![]).run(make_context("/")).await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
    }

    #[tokio::test]
    async fn chain_reaches_terminal_handler() {
        let chain = vec![terminal()];
        let res = Next::new(chain).run(make_context("/")).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn stamp_sets_both_headers() {
        let chain = vec![from_middleware(Arc::new(RequestStamp::new())), terminal()];
        let res = Next::new(chain).run(make_context("/dashboard")).await;
        assert_eq!(res.headers().get("cache-control-hint"), Some("no-cache"));
        assert!(res.headers().contains("request-timestamp"));
    }

    #[tokio::test]
    async fn stamp_replaces_rather_than_appends() {
        let downstream: MiddlewareHandler = Arc::new(|_ctx, _next| {
            Box::pin(async {
                Response::new(StatusCode::Ok).header("cache-control-hint", "stale-value")
            })
        });
        let chain = vec![from_middleware(Arc::new(RequestStamp::new())), downstream];
        let res = Next::new(chain).run(make_context("/dashboard")).await;
        let values: Vec<_> = res.headers().get_all("cache-control-hint").collect();
        assert_eq!(values, vec!["no-cache"]);
    }

    #[tokio::test]
    async fn favicon_is_excluded() {
        let chain = vec![from_middleware(Arc::new(RequestStamp::new())), terminal()];
        let res = Next::new(chain).run(make_context("/favicon.ico")).await;
        assert!(!res.headers().contains("cache-control-hint"));
        assert!(!res.headers().contains("request-timestamp"));
    }

    #[tokio::test]
    async fn internal_assets_are_excluded() {
        let chain = vec![from_middleware(Arc::new(RequestStamp::new())), terminal()];
        let res = Next::new(chain)
            .run(make_context("/_internal-assets/img/logo.png"))
            .await;
        assert!(!res.headers().contains("cache-control-hint"));
    }

    #[tokio::test]
    async fn custom_exclusion_respected() {
        let stamp = RequestStamp::new().exclude("/healthz");
        let chain = vec![from_middleware(Arc::new(stamp)), terminal()];
        let res = Next::new(chain).run(make_context("/healthz")).await;
        assert!(!res.headers().contains("request-timestamp"));
    }

    #[test]
    fn exclusion_prefix_does_not_match_sibling() {
        let stamp = RequestStamp::new();
        assert!(stamp.is_excluded("/_internal-assets/app.css"));
        assert!(!stamp.is_excluded("/_internal-assets-v2/app.css"));
        assert!(!stamp.is_excluded("/dashboard"));
    }
}
