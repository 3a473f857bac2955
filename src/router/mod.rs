//! Request routing — map URL patterns and HTTP methods to handler functions.
//!
//! [`Router`] dispatches incoming requests to handlers by method and path.
//! Two pattern styles cover everything the demo serves:
//!
//! | Pattern                | Example match                    |
//! |------------------------|----------------------------------|
//! | `/api/users`           | `/api/users`                     |
//! | `/_internal-assets/*`  | `/_internal-assets/app.css`      |
//!
//! Trailing slashes are normalized on both patterns and incoming paths, so
//! `/api/users/` and `/api/users` are equivalent. Routes are matched in
//! registration order; the first route whose method and pattern both match
//! wins. When nothing matches, the router answers `404 Not Found`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::{Method, Response, StatusCode};

/// Type-erased, heap-allocated async handler that processes a [`Context`]
/// and returns a [`Response`].
///
/// Stored behind `Arc<dyn Fn(…)>` so handlers can be shared across Tokio
/// tasks without copying the underlying closure. Constructed internally by
/// [`Router::get`] and [`Router::post`].
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this automatically via the blanket
/// impl, so route registration accepts plain async closures.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

// Compiled representation of a route pattern string.
#[derive(Debug, Clone)]
enum Pattern {
    // Matches one exact path string, e.g. `/api/users`.
    Exact(String),
    // Matches any path starting with the prefix, e.g. `/_internal-assets/*`.
    Prefix(String),
}

impl Pattern {
    // Classify a pattern string: a `/*` suffix makes it a prefix glob,
    // anything else is an exact match. A trailing slash (other than the
    // root `/`) is stripped first.
    fn parse(pattern: &str) -> Self {
        let pattern = normalize(pattern);
        match pattern.strip_suffix("/*") {
            Some(prefix) => Pattern::Prefix(prefix.to_string()),
            None => Pattern::Exact(pattern.to_string()),
        }
    }

    fn matches(&self, path: &str) -> bool {
        let path = normalize(path);
        match self {
            Pattern::Exact(p) => p == path,
            Pattern::Prefix(prefix) => path.strip_prefix(prefix.as_str()).is_some_and(|rest| {
                // `/files/*` must not match `/filesystem`.
                rest.is_empty() || rest.starts_with('/')
            }),
        }
    }
}

fn normalize(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

// A single registered route binding a method + pattern to a handler.
struct Route {
    method: Method,
    pattern: Pattern,
    handler: Handler,
}

impl Route {
    fn matches(&self, method: &Method, path: &str) -> bool {
        &self.method == method && self.pattern.matches(path)
    }
}

/// HTTP request router.
///
/// # Examples
///
/// ```rust,no_run
/// use cachelab::{Router, Response, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/ping", |_ctx| async { Response::new(StatusCode::Ok) });
/// router.post("/api/users", |_ctx| async { Response::new(StatusCode::Created) });
/// ```
pub struct Router {
    routes: Vec<Route>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a new, empty `Router` with no registered routes.
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a handler for `GET` requests matching `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Get, path, handler);
    }

    /// Register a handler for `POST` requests matching `path`.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Post, path, handler);
    }

    // Erase the concrete handler type and store it as a `Handler` trait object.
    fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |ctx| handler.call(ctx));
        self.routes.push(Route {
            method,
            pattern: Pattern::parse(path),
            handler,
        });
    }

    /// Return the number of routes registered in this router.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch `ctx` to the first matching route and return its response.
    ///
    /// Routes are tested in registration order; when no route matches, a
    /// `404 Not Found` response is returned.
    pub async fn dispatch(&self, ctx: Context) -> Response {
        for route in &self.routes {
            if route.matches(ctx.request().method(), ctx.request().path()) {
                return (route.handler)(ctx).await;
            }
        }
        Response::new(StatusCode::NotFound)
    }
}
