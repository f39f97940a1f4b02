//! Hop-by-hop header hygiene.
//!
//! Hop-by-hop headers describe a single connection and must not be
//! forwarded by a proxy in either direction.

use axum::http::{header, HeaderMap, HeaderName};

use crate::filters::{Filter, FilterContext, FilterResult};

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    HeaderName::from_static("keep-alive"),
];

/// Strip hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in HOP_BY_HOP.iter().chain(listed.iter()) {
        headers.remove(name);
    }
}

#[derive(Debug, Default)]
pub struct HeadersFilter;

impl HeadersFilter {
    pub const NAME: &'static str = "headers";
}

impl Filter for HeadersFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn pre(&self, ctx: &mut FilterContext<'_>) -> FilterResult {
        strip_hop_by_hop(ctx.outbound_mut().headers_mut());
        Ok(())
    }

    fn post(&self, ctx: &mut FilterContext<'_>) -> FilterResult {
        if let Some(response) = ctx.response_mut() {
            strip_hop_by_hop(&mut response.headers);
        }
        Ok(())
    }
}
