//! Backend responses and the caller-facing write surface.
//!
//! The coordinator produces exactly one [`Response`] per inbound request:
//! a bare status, a verbatim passthrough, or a merged body.

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Response, StatusCode};

/// A fully buffered backend response.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BackendResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Write backend status, headers and raw body verbatim.
    pub fn into_passthrough(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// A response carrying only a status code.
pub fn status_only(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}
