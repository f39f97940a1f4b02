//! `X-Forwarded-*` propagation.

use axum::http::{HeaderName, HeaderValue};

use crate::filters::{Filter, FilterContext, FilterResult};

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

#[derive(Debug, Default)]
pub struct XForwardedFilter;

impl XForwardedFilter {
    pub const NAME: &'static str = "x-forwarded";
}

impl Filter for XForwardedFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn pre(&self, ctx: &mut FilterContext<'_>) -> FilterResult {
        let client_ip = ctx.inbound().client_addr().map(|addr| addr.ip().to_string());
        let host = ctx.inbound().host().map(str::to_owned);
        let headers = ctx.outbound_mut().headers_mut();

        if let Some(ip) = client_ip {
            let chain = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
                Some(prior) if !prior.is_empty() => format!("{prior}, {ip}"),
                _ => ip,
            };
            if let Ok(value) = HeaderValue::from_str(&chain) {
                headers.insert(X_FORWARDED_FOR, value);
            }
        }

        if !headers.contains_key(&X_FORWARDED_HOST) {
            if let Some(value) = host.and_then(|h| HeaderValue::from_str(&h).ok()) {
                headers.insert(X_FORWARDED_HOST, value);
            }
        }

        if !headers.contains_key(&X_FORWARDED_PROTO) {
            headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
        }
        Ok(())
    }
}
