//! Aggregation of fan-out responses into one JSON object.
//!
//! Output body: `{"<attribution>":<raw backend body>,...}` in candidate
//! order. Bodies are embedded verbatim, so every backend must already
//! answer with a JSON value; nothing is validated or re-encoded.

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Response, StatusCode};

use crate::proxy::{Candidate, Outcome};

/// Content type of every merged response.
pub const MERGE_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Headers dropped from each part before merging; they describe a single
/// part's framing and would be inconsistent on the aggregate.
pub const MERGE_REMOVE_HEADERS: [HeaderName; 3] =
    [header::CONTENT_LENGTH, header::CONTENT_TYPE, header::DATE];

/// The aggregate response.
#[derive(Debug)]
pub struct MergedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl MergedResponse {
    pub fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Merge succeeded candidates, releasing each as soon as its part is written.
pub fn merge_responses(candidates: Vec<Candidate>) -> MergedResponse {
    let mut headers = HeaderMap::new();
    let mut body = Vec::with_capacity(
        2 + candidates
            .iter()
            .map(|c| c.response().map_or(0, |r| r.body.len()) + c.attribution_name().len() + 4)
            .sum::<usize>(),
    );

    body.push(b'{');
    for (index, candidate) in candidates.into_iter().enumerate() {
        if index > 0 {
            body.push(b',');
        }
        let key = serde_json::Value::from(candidate.attribution_name()).to_string();
        body.extend_from_slice(key.as_bytes());
        body.push(b':');

        match candidate.release() {
            Outcome::Succeeded(mut part) => {
                for name in &MERGE_REMOVE_HEADERS {
                    part.headers.remove(name);
                }
                for (name, value) in part.headers.iter() {
                    headers.append(name.clone(), value.clone());
                }
                body.extend_from_slice(&part.body);
            }
            // Only succeeded candidates are merged; keep the object well formed regardless.
            Outcome::Pending | Outcome::Failed(_) => body.extend_from_slice(b"null"),
        }
    }
    body.push(b'}');

    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(MERGE_CONTENT_TYPE));

    MergedResponse {
        status: StatusCode::OK,
        headers,
        body: Bytes::from(body),
    }
}
