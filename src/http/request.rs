//! Inbound request capture.
//!
//! # Responsibilities
//! - Buffer the caller's request once so every candidate can copy it
//! - Carry the client address and the caller's cancellation token
//! - Build outbound copies for backend dispatch
//!
//! # Design Decisions
//! - Body is buffered as `Bytes`; copies are reference-counted, not deep
//! - Original request preserved read-only; each candidate forwards a copy

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::http::{header, request::Parts, HeaderMap, Method, Request, Uri, Version};
use tokio_util::sync::CancellationToken;

/// Header carrying the request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Request sent to a backend. Filters may mutate it freely.
pub type OutboundRequest = Request<Bytes>;

/// The caller's request, fully buffered.
#[derive(Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Bytes,
    client_addr: Option<SocketAddr>,
    cancel: CancellationToken,
}

impl InboundRequest {
    pub fn new(parts: Parts, body: Bytes) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            client_addr: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Build from an already assembled request (tests, internal callers).
    pub fn from_request(request: Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self::new(parts, body)
    }

    pub fn with_client_addr(mut self, addr: SocketAddr) -> Self {
        self.client_addr = Some(addr);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client_addr
    }

    /// Token cancelled when the caller abandons the request.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Host the caller addressed, without port normalisation.
    pub fn host(&self) -> Option<&str> {
        self.headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| self.uri.host())
    }

    pub fn request_id(&self) -> Option<&str> {
        self.headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
    }

    /// Copy method, URI, headers and body into a fresh outbound request.
    pub fn to_outbound(&self) -> OutboundRequest {
        let mut outbound = Request::new(self.body.clone());
        *outbound.method_mut() = self.method.clone();
        *outbound.uri_mut() = self.uri.clone();
        *outbound.version_mut() = self.version;
        *outbound.headers_mut() = self.headers.clone();
        outbound
    }
}
