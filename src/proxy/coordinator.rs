//! Fan-out entry point.
//!
//! One candidate is dispatched inline. Several candidates are dispatched as
//! one tokio task each and joined all-or-nothing: nothing is inspected or
//! written before every task has finished, and a failing candidate never
//! cancels its siblings. The first failing candidate in resolver order
//! decides the response; otherwise all parts are merged.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Response, StatusCode};
use futures_util::future::join_all;
use futures_util::FutureExt;
use tracing::Instrument;

use crate::http::{status_only, InboundRequest};
use crate::proxy::merge::merge_responses;
use crate::proxy::{Candidate, CandidateDispatcher, Outcome, Resolver};

pub struct FanoutCoordinator {
    dispatcher: Arc<CandidateDispatcher>,
}

impl FanoutCoordinator {
    pub fn new(dispatcher: CandidateDispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn dispatcher(&self) -> &CandidateDispatcher {
        &self.dispatcher
    }

    /// Dispatch every candidate and build the single caller-facing response.
    pub async fn dispatch(
        &self,
        inbound: Arc<InboundRequest>,
        resolver: Arc<dyn Resolver>,
        mut candidates: Vec<Candidate>,
    ) -> Response<Body> {
        let count = candidates.len();
        if count == 0 {
            return status_only(StatusCode::SERVICE_UNAVAILABLE);
        }

        let merge = count > 1;
        // Err carries why a dispatch died before leaving an outcome.
        let joined: Vec<Result<Candidate, String>> = if merge {
            for candidate in &mut candidates {
                candidate.set_merge(true);
            }

            let tasks = candidates.into_iter().map(|mut candidate| {
                let dispatcher = self.dispatcher.clone();
                let inbound = inbound.clone();
                let resolver = resolver.clone();
                let span = tracing::debug_span!(
                    "dispatch",
                    attribution = %candidate.attribution_name(),
                    backend = candidate.server_addr().unwrap_or("none"),
                );
                tokio::spawn(
                    async move {
                        dispatcher
                            .dispatch(&inbound, resolver.as_ref(), &mut candidate)
                            .await;
                        candidate
                    }
                    .instrument(span),
                )
            });
            join_all(tasks)
                .await
                .into_iter()
                .map(|joined| joined.map_err(|e| e.to_string()))
                .collect()
        } else {
            let mut joined = Vec::with_capacity(1);
            for mut candidate in candidates {
                let dispatched = AssertUnwindSafe(self.dispatcher.dispatch(
                    &inbound,
                    resolver.as_ref(),
                    &mut candidate,
                ))
                .catch_unwind()
                .await;
                // A panicked dispatch drops its candidate here, releasing the server.
                joined.push(dispatched.map(|()| candidate).map_err(panic_message));
            }
            joined
        };

        if let Some((index, status)) = first_failure(&joined) {
            tracing::info!(
                candidate = index,
                count,
                status = %status,
                merge,
                "Dispatch failed, discarding all candidates"
            );
            for candidate in joined.into_iter().flatten() {
                candidate.release();
            }
            return status_only(status);
        }

        let candidates: Vec<Candidate> = joined.into_iter().flatten().collect();
        if merge {
            return merge_responses(candidates).into_response();
        }

        match candidates.into_iter().next().map(Candidate::release) {
            Some(Outcome::Succeeded(response)) => response.into_passthrough(),
            _ => status_only(StatusCode::BAD_GATEWAY),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("dispatch panicked: {detail}")
}

/// Position and status of the first candidate, in resolver order, that did
/// not succeed. A dispatch that panicked counts as a 500 at its position.
fn first_failure(joined: &[Result<Candidate, String>]) -> Option<(usize, StatusCode)> {
    joined.iter().enumerate().find_map(|(index, slot)| match slot {
        Err(err) => {
            tracing::error!(candidate = index, error = %err, "Dispatch task aborted");
            Some((index, StatusCode::INTERNAL_SERVER_ERROR))
        }
        Ok(candidate) => match candidate.outcome() {
            Outcome::Succeeded(_) => None,
            Outcome::Failed(failure) => {
                tracing::debug!(
                    attribution = %candidate.attribution_name(),
                    error = %failure.error,
                    "Candidate failed"
                );
                Some((index, failure.status))
            }
            Outcome::Pending => Some((index, StatusCode::BAD_GATEWAY)),
        },
    })
}
