//! Single-candidate dispatch lifecycle.
//!
//! ```text
//! no server ──────────────────────────────────────────▶ NoServer / 503
//! rewrite → pre filters ── stop ──────────────────────▶ FilterRejected
//!              │
//!              ▼
//!         backend call ── < 500 ─▶ post filters ─ stop ▶ FilterRejected
//!              │                        └──────────────▶ response
//!              └── error / >= 500 ─▶ post-error filters (unless caller
//!                                     cancelled) ──────▶ failure
//! ```

use std::sync::Arc;

use axum::http::uri::{PathAndQuery, Uri};
use axum::http::{header, HeaderValue, StatusCode};

use crate::filters::{ChainStop, FilterChain, FilterContext};
use crate::http::{InboundRequest, OutboundRequest};
use crate::observability::metrics;
use crate::proxy::error::{is_user_cancellation, DispatchError, Failure};
use crate::proxy::{Candidate, Resolver};
use crate::transport::Transport;

/// Runs one candidate through rewrite, filters and the backend call.
pub struct CandidateDispatcher {
    filters: FilterChain,
    transport: Arc<dyn Transport>,
}

impl CandidateDispatcher {
    pub fn new(filters: FilterChain, transport: Arc<dyn Transport>) -> Self {
        Self { filters, transport }
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    /// Dispatch `candidate`, leaving exactly one terminal outcome on it.
    pub async fn dispatch(
        &self,
        inbound: &InboundRequest,
        resolver: &dyn Resolver,
        candidate: &mut Candidate,
    ) {
        let Some(addr) = candidate.server_addr().map(str::to_owned) else {
            tracing::warn!(attribution = %candidate.attribution_name(), "No server for candidate");
            candidate.fail(StatusCode::SERVICE_UNAVAILABLE, DispatchError::NoServer);
            return;
        };

        let outbound = match build_outbound(inbound, candidate, &addr) {
            Ok(outbound) => outbound,
            Err(error) => {
                tracing::error!(error = %error, "Cannot build outbound request");
                candidate.fail(StatusCode::INTERNAL_SERVER_ERROR, error);
                return;
            }
        };

        let mut ctx = FilterContext::new(inbound, outbound, candidate, resolver);

        if let Err(stop) = self.filters.run_pre(&mut ctx) {
            tracing::warn!(filter = stop.filter, status = %stop.status, reason = %stop.reason, "Pre filter stopped the chain");
            reject(candidate, stop);
            return;
        }

        ctx.mark_start();
        let result = self.transport.invoke(ctx.outbound(), &addr).await;
        ctx.mark_end();

        let failure = match result {
            Ok(response) if response.status.as_u16() < 500 => {
                tracing::debug!(backend = %addr, status = %response.status, body_len = response.body.len(), "Backend responded");
                ctx.set_response(response);
                let stopped = self.filters.run_post(&mut ctx);
                let (response, _) = ctx.finish();

                match (stopped, response) {
                    (Err(stop), _) => {
                        tracing::info!(filter = stop.filter, status = %stop.status, reason = %stop.reason, "Post filter stopped the chain");
                        reject(candidate, stop);
                    }
                    (Ok(()), Some(response)) => candidate.succeed(response),
                    (Ok(()), None) => candidate.fail(
                        StatusCode::BAD_GATEWAY,
                        DispatchError::Aborted("backend response lost in post filters".into()),
                    ),
                }
                return;
            }
            Ok(response) => {
                tracing::info!(backend = %addr, status = %response.status, "Backend failed");
                Failure::new(
                    response.status,
                    DispatchError::BackendServerError {
                        addr,
                        status: response.status,
                    },
                )
            }
            Err(source) => {
                tracing::info!(backend = %addr, error = %source, "Backend unreachable");
                Failure::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    DispatchError::Transport { addr, source },
                )
            }
        };

        if is_user_cancellation(&failure.error) {
            tracing::debug!(attribution = %candidate.attribution_name(), "Request canceled by caller");
        } else {
            ctx.set_failure(failure.clone());
            self.filters.run_post_err(&mut ctx);
        }
        drop(ctx);

        candidate.fail(failure.status, failure.error);
    }
}

fn reject(candidate: &mut Candidate, stop: ChainStop) {
    metrics::record_filter_rejection(stop.filter);
    let (status, error) = stop.into_error();
    candidate.fail(status, error);
}

/// Copy the inbound request and point it at the candidate's target.
///
/// A non-empty rewrite replaces URI and host; otherwise only the path is
/// substituted and the inbound query string is kept byte for byte.
fn build_outbound(
    inbound: &InboundRequest,
    candidate: &Candidate,
    addr: &str,
) -> Result<OutboundRequest, DispatchError> {
    let mut outbound = inbound.to_outbound();
    outbound
        .extensions_mut()
        .insert(inbound.cancellation().clone());

    if let Some(rewritten) = candidate.rewrite().replacement() {
        let uri: Uri = rewritten.parse().map_err(|e| DispatchError::InvalidRewrite {
            uri: rewritten.to_string(),
            reason: format!("{e}"),
        })?;
        tracing::info!(from = %inbound.uri, to = %uri, "URL rewrite");
        *outbound.uri_mut() = uri;

        let host = HeaderValue::from_str(addr).map_err(|e| DispatchError::InvalidRewrite {
            uri: rewritten.to_string(),
            reason: format!("bad host {addr}: {e}"),
        })?;
        outbound.headers_mut().insert(header::HOST, host);
    } else if let Some(path) = candidate.target_path() {
        *outbound.uri_mut() = replace_path(&inbound.uri, path)?;
    }

    Ok(outbound)
}

fn replace_path(uri: &Uri, path: &str) -> Result<Uri, DispatchError> {
    let invalid = |reason: String| DispatchError::InvalidRewrite {
        uri: path.to_string(),
        reason,
    };

    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query =
        Some(PathAndQuery::try_from(path_and_query).map_err(|e| invalid(format!("{e}")))?);
    Uri::from_parts(parts).map_err(|e| invalid(format!("{e}")))
}
