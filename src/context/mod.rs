//! Per-request context passed through the middleware chain into handlers.
//!
//! Wraps the parsed [`Request`] and exposes body decoding helpers: JSON for
//! the resource endpoints, URL-encoded form data for the cart actions.

use std::collections::HashMap;

use crate::Request;

/// Per-request context.
///
/// Owned by exactly one middleware layer or handler at a time; the chain
/// hands it forward by value.
pub struct Context {
    request: Request,
}

impl Context {
    /// Creates a context from a parsed request.
    pub fn new(request: Request) -> Self {
        Self { request }
    }

    /// Returns the underlying request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Consumes the context, returning the request.
    pub fn into_request(self) -> Request {
        self.request
    }

    /// Decodes the request body as JSON into `T`.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the body is not valid JSON for
    /// `T` — handlers map this to a `400 Bad Request`.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }

    /// Decodes the request body as a URL-encoded form.
    pub fn form(&self) -> HashMap<String, String> {
        self.request.form_params()
    }
}
