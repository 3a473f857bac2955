//! Cart action handlers — server-side form actions over the cart sequence.
//!
//! The cart is a plain list of lines with no merge policy: adding the same
//! product twice produces two lines, and removal drops **every** line for
//! the given product id. Each mutation emits a view invalidation signal for
//! the `/cart` page so the next read re-renders it.

use serde::{Deserialize, Serialize};

use crate::cache::PageCache;
use crate::context::Context;
use crate::store::Store;
use crate::{Response, StatusCode};

/// One line in the cart. No uniqueness constraint on `product_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(rename = "productId")]
    pub product_id: String,
    pub quantity: u32,
}

/// Confirmation result returned by the remove action.
#[derive(Debug, Serialize)]
pub struct RemoveResult {
    pub success: bool,
    pub message: String,
}

/// `POST /actions/add-to-cart` — append a line, invalidate the cart view.
///
/// Form fields: `productId` (required), `quantity` (optional; absent or
/// unparsable values default to `1`). Fire-and-forget: replies `204` with
/// no body.
pub async fn add_to_cart(store: &Store, pages: &PageCache, ctx: &Context) -> Response {
    let form = ctx.form();
    let Some(product_id) = form.get("productId").filter(|id| !id.is_empty()) else {
        return Response::new(StatusCode::BadRequest).body("missing form field: productId");
    };
    let quantity = form
        .get("quantity")
        .and_then(|q| q.parse().ok())
        .unwrap_or(1);

    store.cart.append(CartLine {
        product_id: product_id.clone(),
        quantity,
    });
    tracing::debug!(product_id = %product_id, quantity, "cart line added");
    pages.revalidate_path("/cart");

    Response::new(StatusCode::NoContent)
}

/// `POST /actions/remove-from-cart` — drop every line for a product id.
///
/// Invalidates the cart view and returns a confirmation body even when no
/// line matched, mirroring the filter-then-confirm shape of the action.
pub async fn remove_from_cart(store: &Store, pages: &PageCache, ctx: &Context) -> Response {
    let form = ctx.form();
    let Some(product_id) = form.get("productId").filter(|id| !id.is_empty()) else {
        return Response::new(StatusCode::BadRequest).body("missing form field: productId");
    };

    let removed = store.cart.remove_where(|line| &line.product_id == product_id);
    tracing::debug!(product_id = %product_id, removed, "cart lines removed");
    pages.revalidate_path("/cart");

    Response::json(
        StatusCode::Ok,
        &RemoveResult {
            success: true,
            message: format!("Removed product {product_id} from cart"),
        },
    )
}

/// `GET /actions/cart-items` — the current cart lines, verbatim.
pub async fn cart_items(store: &Store) -> Response {
    Response::json(StatusCode::Ok, &store.cart.list())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;

    fn form_context(path: &str, body: &str) -> Context {
        let raw = format!(
            "POST {path} HTTP/1.1\r\nHost: x\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        Context::new(req)
    }

    async fn add(store: &Store, pages: &PageCache, body: &str) -> Response {
        add_to_cart(store, pages, &form_context("/actions/add-to-cart", body)).await
    }

    #[tokio::test]
    async fn add_appends_line() {
        let store = Store::new();
        let pages = PageCache::new();
        let res = add(&store, &pages, "productId=prod-1&quantity=2").await;
        assert_eq!(res.status(), StatusCode::NoContent);
        assert_eq!(
            store.cart.list(),
            vec![CartLine {
                product_id: "prod-1".to_string(),
                quantity: 2
            }]
        );
    }

    #[tokio::test]
    async fn missing_quantity_defaults_to_one() {
        let store = Store::new();
        let pages = PageCache::new();
        add(&store, &pages, "productId=prod-1").await;
        assert_eq!(store.cart.list()[0].quantity, 1);
    }

    #[tokio::test]
    async fn unparsable_quantity_defaults_to_one() {
        let store = Store::new();
        let pages = PageCache::new();
        add(&store, &pages, "productId=prod-1&quantity=lots").await;
        assert_eq!(store.cart.list()[0].quantity, 1);
    }

    #[tokio::test]
    async fn missing_product_id_is_400() {
        let store = Store::new();
        let pages = PageCache::new();
        let res = add(&store, &pages, "quantity=2").await;
        assert_eq!(res.status(), StatusCode::BadRequest);
        assert!(store.cart.is_empty());
    }

    #[tokio::test]
    async fn duplicate_adds_produce_two_lines() {
        let store = Store::new();
        let pages = PageCache::new();
        add(&store, &pages, "productId=p1&quantity=1").await;
        add(&store, &pages, "productId=p1&quantity=2").await;
        assert_eq!(store.cart.len(), 2);
    }

    #[tokio::test]
    async fn remove_drops_all_matching_lines() {
        let store = Store::new();
        let pages = PageCache::new();
        add(&store, &pages, "productId=p1&quantity=1").await;
        add(&store, &pages, "productId=p1&quantity=2").await;

        let res = remove_from_cart(
            &store,
            &pages,
            &form_context("/actions/remove-from-cart", "productId=p1"),
        )
        .await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert!(store.cart.is_empty());

        let confirm: serde_json::Value = serde_json::from_slice(res.body_ref()).unwrap();
        assert_eq!(confirm["success"], true);
        assert_eq!(confirm["message"], "Removed product p1 from cart");
    }

    #[tokio::test]
    async fn add_add_remove_scenario() {
        let store = Store::new();
        let pages = PageCache::new();
        add(&store, &pages, "productId=prod-1&quantity=1").await;
        add(&store, &pages, "productId=prod-2&quantity=3").await;
        remove_from_cart(
            &store,
            &pages,
            &form_context("/actions/remove-from-cart", "productId=prod-1"),
        )
        .await;

        let res = cart_items(&store).await;
        let items: Vec<CartLine> = serde_json::from_slice(res.body_ref()).unwrap();
        assert_eq!(
            items,
            vec![CartLine {
                product_id: "prod-2".to_string(),
                quantity: 3
            }]
        );
    }

    #[tokio::test]
    async fn cart_lines_serialize_with_camel_case_product_id() {
        let store = Store::new();
        let pages = PageCache::new();
        add(&store, &pages, "productId=p9&quantity=4").await;
        let res = cart_items(&store).await;
        let raw: serde_json::Value = serde_json::from_slice(res.body_ref()).unwrap();
        assert_eq!(raw[0]["productId"], "p9");
        assert_eq!(raw[0]["quantity"], 4);
    }

    #[tokio::test]
    async fn mutations_invalidate_the_cart_page() {
        let store = Store::new();
        let pages = PageCache::new();

        // Prime the cached cart page, then mutate.
        let first = pages
            .render("/cart", crate::cache::CacheMode::Static, || async {
                "old view".to_string()
            })
            .await;
        assert_eq!(first, "old view");

        add(&store, &pages, "productId=p1").await;

        let second = pages
            .render("/cart", crate::cache::CacheMode::Static, || async {
                "fresh view".to_string()
            })
            .await;
        assert_eq!(second, "fresh view", "stale view served after mutation");
    }
}
