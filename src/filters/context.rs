//! Per-dispatch state threaded through the filter chain.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::http::{BackendResponse, InboundRequest, OutboundRequest};
use crate::proxy::error::Failure;
use crate::proxy::{Candidate, Resolver};

/// Shared state for one candidate dispatch.
///
/// Built fresh by the dispatcher for each candidate. The backend response is
/// only visible during the post phase and the failure only during the
/// post-error phase.
pub struct FilterContext<'a> {
    inbound: &'a InboundRequest,
    outbound: OutboundRequest,
    candidate: &'a Candidate,
    resolver: &'a dyn Resolver,
    vars: HashMap<String, String>,
    start_at: Option<Instant>,
    end_at: Option<Instant>,
    response: Option<BackendResponse>,
    failure: Option<Failure>,
}

impl<'a> FilterContext<'a> {
    pub fn new(
        inbound: &'a InboundRequest,
        outbound: OutboundRequest,
        candidate: &'a Candidate,
        resolver: &'a dyn Resolver,
    ) -> Self {
        Self {
            inbound,
            outbound,
            candidate,
            resolver,
            vars: HashMap::new(),
            start_at: None,
            end_at: None,
            response: None,
            failure: None,
        }
    }

    pub fn inbound(&self) -> &InboundRequest {
        self.inbound
    }

    pub fn outbound(&self) -> &OutboundRequest {
        &self.outbound
    }

    pub fn outbound_mut(&mut self) -> &mut OutboundRequest {
        &mut self.outbound
    }

    pub fn candidate(&self) -> &Candidate {
        self.candidate
    }

    pub fn resolver(&self) -> &dyn Resolver {
        self.resolver
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub(crate) fn mark_start(&mut self) {
        self.start_at = Some(Instant::now());
    }

    pub(crate) fn mark_end(&mut self) {
        self.end_at = Some(Instant::now());
    }

    pub fn start_at(&self) -> Option<Instant> {
        self.start_at
    }

    pub fn end_at(&self) -> Option<Instant> {
        self.end_at
    }

    /// Time spent in the backend call, once it has completed.
    pub fn backend_latency(&self) -> Option<Duration> {
        Some(self.end_at?.saturating_duration_since(self.start_at?))
    }

    pub fn response(&self) -> Option<&BackendResponse> {
        self.response.as_ref()
    }

    pub fn response_mut(&mut self) -> Option<&mut BackendResponse> {
        self.response.as_mut()
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    pub(crate) fn set_response(&mut self, response: BackendResponse) {
        self.response = Some(response);
    }

    pub(crate) fn set_failure(&mut self, failure: Failure) {
        self.failure = Some(failure);
    }

    /// Consume the context, yielding the response and failure it carried.
    pub(crate) fn finish(self) -> (Option<BackendResponse>, Option<Failure>) {
        (self.response, self.failure)
    }
}
