//! Demo application wiring — shared state, routes, and the middleware stack.
//!
//! Everything the binary serves is assembled here: the seeded [`Store`],
//! the [`PageCache`] with one cache mode per page route, the [`Fetcher`]
//! for the upstream posts proxy, and the [`RequestStamp`] interceptor in
//! front of the router.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde_json::json;

use crate::cache::{CacheMode, PageCache};
use crate::cart;
use crate::context::Context;
use crate::fetch::{FetchPolicy, Fetcher};
use crate::middleware::{MiddlewareHandler, Next, RequestStamp, from_middleware};
use crate::resources;
use crate::store::Store;
use crate::{Request, Response, Router, StatusCode};

/// How long the index page is served from cache before re-rendering.
const INDEX_MAX_AGE: Duration = Duration::from_secs(60);

/// Upstream used by the posts proxy route.
const POSTS_UPSTREAM: &str = "https://jsonplaceholder.typicode.com/posts";

/// Process-wide application state shared across all request tasks.
pub struct AppState {
    pub store: Store,
    pub pages: PageCache,
    pub fetcher: Fetcher,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Creates the demo state: seeded store, empty caches.
    pub fn new() -> Self {
        Self {
            store: Store::with_demo_data(),
            pages: PageCache::new(),
            fetcher: Fetcher::new(),
        }
    }
}

/// Registers every demo route on a fresh router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new();

    // Index page, re-rendered at most once a minute.
    let st = Arc::clone(&state);
    router.get("/", move |_ctx| {
        let st = Arc::clone(&st);
        async move {
            let render_st = Arc::clone(&st);
            let body = st
                .pages
                .render("/", CacheMode::RevalidateAfter(INDEX_MAX_AGE), move || async move {
                    render_index(&render_st)
                })
                .await;
            Response::new(StatusCode::Ok)
                .header("Content-Type", "application/json")
                .body(body)
        }
    });

    // Cart page: static until a cart action invalidates it.
    let st = Arc::clone(&state);
    router.get("/cart", move |_ctx| {
        let st = Arc::clone(&st);
        async move {
            let render_st = Arc::clone(&st);
            let body = st
                .pages
                .render("/cart", CacheMode::Static, move || async move {
                    render_cart(&render_st)
                })
                .await;
            Response::new(StatusCode::Ok)
                .header("Content-Type", "application/json")
                .body(body)
        }
    });

    // User resource.
    let st = Arc::clone(&state);
    router.get("/api/users", move |_ctx| {
        let st = Arc::clone(&st);
        async move { resources::list_users(&st.store).await }
    });
    let st = Arc::clone(&state);
    router.post("/api/users", move |ctx| {
        let st = Arc::clone(&st);
        async move { resources::create_user(&st.store, &ctx).await }
    });

    // Product resource.
    let st = Arc::clone(&state);
    router.get("/api/products", move |_ctx| {
        let st = Arc::clone(&st);
        async move { resources::list_products(&st.store).await }
    });
    let st = Arc::clone(&state);
    router.post("/api/products", move |ctx| {
        let st = Arc::clone(&st);
        async move { resources::create_product(&st.store, &ctx).await }
    });

    // Cart form actions.
    let st = Arc::clone(&state);
    router.post("/actions/add-to-cart", move |ctx| {
        let st = Arc::clone(&st);
        async move { cart::add_to_cart(&st.store, &st.pages, &ctx).await }
    });
    let st = Arc::clone(&state);
    router.post("/actions/remove-from-cart", move |ctx| {
        let st = Arc::clone(&st);
        async move { cart::remove_from_cart(&st.store, &st.pages, &ctx).await }
    });
    let st = Arc::clone(&state);
    router.get("/actions/cart-items", move |_ctx| {
        let st = Arc::clone(&st);
        async move { cart::cart_items(&st.store).await }
    });

    // Posts proxy: upstream fetch with an hour of revalidation.
    let st = Arc::clone(&state);
    router.get("/posts", move |_ctx| {
        let st = Arc::clone(&st);
        async move {
            match st
                .fetcher
                .get(POSTS_UPSTREAM, FetchPolicy::Revalidate(Duration::from_secs(3600)))
                .await
            {
                Ok(body) => Response::new(StatusCode::Ok)
                    .header("Content-Type", "application/json")
                    .body(body),
                Err(e) => {
                    Response::new(StatusCode::BadGateway).body(format!("upstream error: {e}"))
                }
            }
        }
    });

    // Asset stubs, excluded from the interceptor.
    router.get("/favicon.ico", |_ctx| async {
        Response::new(StatusCode::NoContent)
    });
    router.get("/_internal-assets/*", |_ctx| async {
        Response::new(StatusCode::NoContent)
    });

    router
}

/// Builds the per-request middleware stack: interceptor first, router last.
pub fn middleware_stack(router: Arc<Router>) -> Vec<MiddlewareHandler> {
    vec![
        from_middleware(Arc::new(RequestStamp::new())),
        route_dispatch(router),
    ]
}

/// Runs one parsed request through the stack to a response.
pub async fn handle(stack: &[MiddlewareHandler], request: Request) -> Response {
    Next::new(stack.to_vec()).run(Context::new(request)).await
}

// Terminal middleware: hand the context to the router, ignoring `next`.
fn route_dispatch(router: Arc<Router>) -> MiddlewareHandler {
    Arc::new(move |ctx, _next| {
        let router = Arc::clone(&router);
        Box::pin(async move { router.dispatch(ctx).await })
    })
}

fn render_index(state: &AppState) -> String {
    json!({
        "name": "cachelab",
        "rendered_at": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "users": state.store.users.len(),
        "products": state.store.products.len(),
        "endpoints": [
            "GET /api/users",
            "POST /api/users",
            "GET /api/products",
            "POST /api/products",
            "POST /actions/add-to-cart",
            "POST /actions/remove-from-cart",
            "GET /actions/cart-items",
            "GET /cart",
            "GET /posts",
        ],
    })
    .to_string()
}

fn render_cart(state: &AppState) -> String {
    json!({
        "rendered_at": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "items": state.store.cart.list(),
    })
    .to_string()
}
