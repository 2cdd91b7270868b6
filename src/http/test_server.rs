//! HTTP server for tests
//!
//! Serves an axum router whose fallback answers every request with a reply
//! built by a handler closure.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Request as seen by the server
#[derive(Clone, Debug, Default)]
pub struct Received {
    pub method: String,
    pub path: String,
    /// First value of every header, keyed by lowercase name
    pub headers: HashMap<String, String>,
    /// Every header line in arrival order
    pub header_lines: Vec<(String, String)>,
    pub body: String,
}

impl Received {
    /// All values sent for header `name`
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.header_lines
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

/// Reply sent back to the client
#[derive(Clone, Debug)]
pub struct Reply {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl Reply {
    pub fn new(status: u16, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body: body.into(),
        }
    }
}

type Handler = Arc<dyn Fn(&Received) -> Reply + Send + Sync>;

pub struct TestServer {
    url: String,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn<F>(handler: F) -> Self
    where
        F: Fn(&Received) -> Reply + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let app = Router::new().fallback(move |request: Request<Body>| {
            let handler = handler.clone();
            async move { respond(request, handler).await }
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{addr}"),
            handle,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn respond(request: Request<Body>, handler: Handler) -> Response {
    let (parts, body) = request.into_parts();

    let mut received = Received {
        method: parts.method.to_string(),
        path: parts
            .uri
            .path_and_query()
            .map(|p| p.as_str().to_string())
            .unwrap_or_default(),
        ..Default::default()
    };
    for (name, value) in &parts.headers {
        let value = String::from_utf8_lossy(value.as_bytes()).to_string();
        received
            .headers
            .entry(name.as_str().to_string())
            .or_insert_with(|| value.clone());
        received.header_lines.push((name.as_str().to_string(), value));
    }
    let bytes = to_bytes(body, usize::MAX).await.unwrap_or_default();
    received.body = String::from_utf8_lossy(&bytes).to_string();

    let reply = handler(&received);
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    // closed connections keep pooled clients from outliving the server
    (
        status,
        [
            (header::CONTENT_TYPE, reply.content_type),
            (header::CONNECTION, "close".to_string()),
        ],
        reply.body,
    )
        .into_response()
}
