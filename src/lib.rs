//! # cachelab
//!
//! A teaching-demo HTTP server that makes a web framework's hidden moving
//! parts explicit: an HTTP/1.1 server loop, a router, a middleware
//! pipeline, server-side form actions over an in-memory store, and two
//! response-caching layers — a per-route page cache with invalidation
//! signals, and a fetch-response cache with TTL and tag revalidation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cachelab::app::{self, AppState};
//! use cachelab::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let state = Arc::new(AppState::new());
//!     let router = Arc::new(app::build_router(state));
//!     let stack = app::middleware_stack(router);
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     server.run(move |request| {
//!         let stack = stack.clone();
//!         async move { app::handle(&stack, request).await }
//!     }).await?;
//!     Ok(())
//! }
//! ```

// ── Protocol and plumbing ─────────────────────────────────────────────────────
pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

// ── Demo application ──────────────────────────────────────────────────────────
pub mod app;
pub mod cache;
pub mod cart;
pub mod fetch;
pub mod resources;
pub mod store;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
