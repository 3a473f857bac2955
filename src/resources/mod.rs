//! Resource handlers — list/create over the `users` and `products`
//! collections.
//!
//! Both resources share the same contract shape: `GET` returns the full
//! collection unfiltered and unpaginated, `POST` appends one record and
//! returns it with a `201`. Create bodies are validated strictly: a missing
//! or wrong-typed field is a `400`, not a silently-stored hole.

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::store::Store;
use crate::{Response, StatusCode};

/// A demo user record. Never updated or deleted once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

/// A demo product record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub price: f64,
}

/// Create-user request body.
#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

/// Create-product request body.
#[derive(Debug, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
}

/// `GET /api/users` — the full users collection as a JSON array.
pub async fn list_users(store: &Store) -> Response {
    Response::json(StatusCode::Ok, &store.users.list())
}

/// `POST /api/users` — append one user and return it with `201`.
pub async fn create_user(store: &Store, ctx: &Context) -> Response {
    let input: NewUser = match ctx.json() {
        Ok(input) => input,
        Err(e) => {
            return Response::new(StatusCode::BadRequest).body(format!("invalid user payload: {e}"));
        }
    };

    let user = store.users.append_with_id(|id| User {
        id,
        name: input.name,
        email: input.email,
    });
    tracing::debug!(id = user.id, "user created");
    Response::json(StatusCode::Created, &user)
}

/// `GET /api/products` — the full products collection as a JSON array.
pub async fn list_products(store: &Store) -> Response {
    Response::json(StatusCode::Ok, &store.products.list())
}

/// `POST /api/products` — append one product and return it with `201`.
pub async fn create_product(store: &Store, ctx: &Context) -> Response {
    let input: NewProduct = match ctx.json() {
        Ok(input) => input,
        Err(e) => {
            return Response::new(StatusCode::BadRequest)
                .body(format!("invalid product payload: {e}"));
        }
    };

    let product = store.products.append_with_id(|id| Product {
        id,
        name: input.name,
        price: input.price,
    });
    tracing::debug!(id = product.id, "product created");
    Response::json(StatusCode::Created, &product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;

    fn post_context(path: &str, body: &str) -> Context {
        let raw = format!(
            "POST {path} HTTP/1.1\r\nHost: x\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        Context::new(req)
    }

    fn body_json(res: Response) -> serde_json::Value {
        serde_json::from_slice(res.body_ref()).unwrap()
    }

    #[tokio::test]
    async fn list_users_returns_seed_rows() {
        let store = Store::with_demo_data();
        let res = list_users(&store).await;
        assert_eq!(res.status(), StatusCode::Ok);
        let users = body_json(res);
        assert_eq!(users.as_array().unwrap().len(), 3);
        assert_eq!(users[0]["name"], "John Doe");
    }

    #[tokio::test]
    async fn create_user_appends_and_returns_record() {
        let store = Store::with_demo_data();
        let ctx = post_context(
            "/api/users",
            r#"{"name":"Alice Example","email":"alice@example.com"}"#,
        );
        let res = create_user(&store, &ctx).await;
        assert_eq!(res.status(), StatusCode::Created);
        let created = body_json(res);
        assert_eq!(created["id"], 4);
        assert_eq!(created["email"], "alice@example.com");
        assert_eq!(store.users.len(), 4);
    }

    #[tokio::test]
    async fn create_user_missing_field_is_400() {
        let store = Store::with_demo_data();
        let ctx = post_context("/api/users", r#"{"name":"No Email"}"#);
        let res = create_user(&store, &ctx).await;
        assert_eq!(res.status(), StatusCode::BadRequest);
        assert_eq!(store.users.len(), 3, "rejected payload must not be stored");
    }

    #[tokio::test]
    async fn create_product_continues_seed_numbering() {
        let store = Store::with_demo_data();
        let ctx = post_context("/api/products", r#"{"name":"Tablet","price":299.99}"#);
        let res = create_product(&store, &ctx).await;
        assert_eq!(res.status(), StatusCode::Created);
        let created = body_json(res);
        assert_eq!(created["id"], 4);
        assert_eq!(created["name"], "Tablet");

        let listed = body_json(list_products(&store).await);
        assert_eq!(listed.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn create_product_wrong_type_is_400() {
        let store = Store::with_demo_data();
        let ctx = post_context("/api/products", r#"{"name":"Tablet","price":"cheap"}"#);
        let res = create_product(&store, &ctx).await;
        assert_eq!(res.status(), StatusCode::BadRequest);
    }
}
