//! HTTP client module
//!
//! Provides the HTTP transport used by HTTP steps.

mod client;
#[cfg(test)]
pub(crate) mod test_server;

pub use client::{HttpClient, HttpError, HttpRequest, HttpResponse, DEFAULT_TIMEOUT_SECS};
