//! Demo server binary: seeds the store, wires the routes and middleware,
//! and serves until terminated.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use cachelab::app::{self, AppState};
use cachelab::server::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string());

    let state = Arc::new(AppState::new());
    let router = Arc::new(app::build_router(state));
    let stack = app::middleware_stack(router);

    let server = Server::bind(&addr).await?;
    tracing::info!(address = %server.local_addr(), "demo server ready");

    server
        .run(move |request| {
            let stack = stack.clone();
            async move { app::handle(&stack, request).await }
        })
        .await?;

    Ok(())
}
