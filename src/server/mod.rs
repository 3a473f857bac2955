//! Async TCP server using Tokio.
//!
//! Accepts connections and dispatches HTTP/1.1 requests to a handler
//! function. Each connection gets its own task and [`Conn`] state;
//! persistent connections (keep-alive) are supported out of the box. The
//! demo's middleware chain and router plug in as the handler.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum size of a complete HTTP request we will buffer before rejecting it (1 MiB).
///
/// The demo's bodies are tiny JSON and form payloads; anything near this
/// limit is a client error.
const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Initial read buffer capacity per connection.
const READ_BUF_SIZE: usize = 4096;

/// The demo HTTP server.
///
/// Binds to a TCP address and dispatches incoming HTTP/1.1 requests to a
/// handler function.
///
/// # Examples
///
/// ```rust,no_run
/// use cachelab::server::Server;
/// use cachelab::http::{Request, Response, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.run(|_req| async {
///         Response::new(StatusCode::Ok).body("Hello!")
///     }).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts accepting connections and dispatching requests to `handler`.
    ///
    /// The handler receives a [`Request`] and must return a [`Future`]
    /// resolving to a [`Response`]. It is wrapped in an [`Arc`] and shared
    /// across all spawned Tokio tasks, so it must be `Send + Sync + 'static`.
    ///
    /// Runs until the process is terminated or an unrecoverable listener
    /// error occurs.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let handler = Arc::new(handler);
        info!(address = %self.local_addr, "cachelab listening");

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                debug!(peer = %peer, "connection accepted");
                if let Err(e) = Conn::new(stream, peer).serve(handler).await {
                    warn!(peer = %peer, error = %e, "connection closed with error");
                }
            });
        }
    }
}

// Per-connection state: the stream plus the accumulated read buffer.
struct Conn {
    stream: TcpStream,
    peer: SocketAddr,
    buf: BytesMut,
}

// Outcome of waiting for the next request on a connection.
enum Inbound {
    // A complete request (headers + declared body) is buffered;
    // `consumed` is how many buffer bytes it spans.
    Available { request: Request, consumed: usize },
    // The peer went away or the request was rejected; stop serving.
    Done,
}

impl Conn {
    fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            buf: BytesMut::with_capacity(READ_BUF_SIZE),
        }
    }

    /// Serves requests on this connection until it closes.
    ///
    /// HTTP/1.1 connections are persistent by default: one request per
    /// iteration until the peer disconnects or signals `Connection: close`.
    async fn serve<H, F>(mut self, handler: Arc<H>) -> Result<(), std::io::Error>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        loop {
            let (request, consumed) = match self.next_request().await? {
                Inbound::Available { request, consumed } => (request, consumed),
                Inbound::Done => return Ok(()),
            };

            let keep_alive = request.is_keep_alive();
            debug!(
                peer = %self.peer,
                method = %request.method(),
                path = %request.path(),
                "dispatching request"
            );

            let response = handler(request).await;
            self.send(response).await?;

            // Drop the consumed request bytes; pipelined data stays buffered.
            let _ = self.buf.split_to(consumed);

            if !keep_alive {
                debug!(peer = %self.peer, "Connection: close — shutting down");
                return Ok(());
            }
        }
    }

    // Reads until one full request is buffered, rejecting oversized or
    // malformed input with an error response.
    async fn next_request(&mut self) -> Result<Inbound, std::io::Error> {
        loop {
            if self.stream.read_buf(&mut self.buf).await? == 0 {
                debug!(peer = %self.peer, "connection closed by peer");
                return Ok(Inbound::Done);
            }

            if self.buf.len() > MAX_REQUEST_SIZE {
                warn!(peer = %self.peer, "request too large — sending 413");
                self.reject(StatusCode::PayloadTooLarge, "Request entity too large")
                    .await?;
                return Ok(Inbound::Done);
            }

            let (request, body_offset) = match Request::parse(&self.buf) {
                Ok(pair) => pair,
                Err(RequestError::Incomplete) => {
                    // Headers not yet fully received — read more data.
                    continue;
                }
                Err(e) => {
                    warn!(peer = %self.peer, error = %e, "bad request — sending 400");
                    self.reject(StatusCode::BadRequest, format!("Bad Request: {e}"))
                        .await?;
                    return Ok(Inbound::Done);
                }
            };

            let consumed = body_offset + request.content_length().unwrap_or(0);
            if self.buf.len() < consumed {
                // Declared body not fully arrived yet — re-read and re-parse.
                continue;
            }

            return Ok(Inbound::Available { request, consumed });
        }
    }

    async fn send(&mut self, response: Response) -> Result<(), std::io::Error> {
        self.stream.write_all(&response.into_bytes()).await?;
        self.stream.flush().await
    }

    async fn reject(
        &mut self,
        status: StatusCode,
        body: impl Into<String>,
    ) -> Result<(), std::io::Error> {
        self.send(Response::new(status).body(body).keep_alive(false))
            .await
    }
}
