//! Per-target dispatch record.
//!
//! A [`Candidate`] is created by the resolver for one matched target of one
//! inbound request. It is owned by exactly one dispatcher task while the
//! backend is being called, and consumed exactly once by [`Candidate::release`]
//! afterwards. Releasing drops the backend connection guard.

use axum::http::{HeaderMap, StatusCode};

use crate::http::BackendResponse;
use crate::load_balancer::BackendConnectionGuard;
use crate::proxy::error::{DispatchError, Failure};

/// Rewrite decision computed by the resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rewrite {
    needs_rewrite: bool,
    rewritten_uri: String,
}

impl Rewrite {
    /// No rewrite: the dispatcher only substitutes the path.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn to(uri: impl Into<String>) -> Self {
        Self {
            needs_rewrite: true,
            rewritten_uri: uri.into(),
        }
    }

    pub fn needs_rewrite(&self) -> bool {
        self.needs_rewrite
    }

    /// The full replacement URI, if any. An empty rewrite counts as none.
    pub fn replacement(&self) -> Option<&str> {
        if self.needs_rewrite && !self.rewritten_uri.is_empty() {
            Some(&self.rewritten_uri)
        } else {
            None
        }
    }
}

/// Terminal state of a candidate.
#[derive(Debug, Default)]
pub enum Outcome {
    #[default]
    Pending,
    Succeeded(BackendResponse),
    Failed(Failure),
}

/// One resolved backend target for the current inbound request.
#[derive(Debug)]
pub struct Candidate {
    server: Option<BackendConnectionGuard>,
    attribution_name: String,
    target_path: Option<String>,
    rewrite: Rewrite,
    merge: bool,
    outcome: Outcome,
}

impl Candidate {
    pub fn new(attribution_name: impl Into<String>, server: Option<BackendConnectionGuard>) -> Self {
        Self {
            server,
            attribution_name: attribution_name.into(),
            target_path: None,
            rewrite: Rewrite::none(),
            merge: false,
            outcome: Outcome::Pending,
        }
    }

    /// Path substituted into the outbound URI when no rewrite applies.
    pub fn with_target_path(mut self, path: impl Into<String>) -> Self {
        self.target_path = Some(path.into());
        self
    }

    pub fn with_rewrite(mut self, rewrite: Rewrite) -> Self {
        self.rewrite = rewrite;
        self
    }

    pub fn server(&self) -> Option<&BackendConnectionGuard> {
        self.server.as_ref()
    }

    pub fn server_addr(&self) -> Option<&str> {
        self.server.as_ref().map(|s| s.addr.as_str())
    }

    pub fn attribution_name(&self) -> &str {
        &self.attribution_name
    }

    pub fn target_path(&self) -> Option<&str> {
        self.target_path.as_deref()
    }

    pub fn rewrite(&self) -> &Rewrite {
        &self.rewrite
    }

    pub fn is_merge(&self) -> bool {
        self.merge
    }

    pub(crate) fn set_merge(&mut self, merge: bool) {
        self.merge = merge;
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn response(&self) -> Option<&BackendResponse> {
        match &self.outcome {
            Outcome::Succeeded(res) => Some(res),
            _ => None,
        }
    }

    pub fn response_headers_mut(&mut self) -> Option<&mut HeaderMap> {
        match &mut self.outcome {
            Outcome::Succeeded(res) => Some(&mut res.headers),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match &self.outcome {
            Outcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&DispatchError> {
        self.failure().map(|f| &f.error)
    }

    /// Status the caller would see for this candidate alone.
    pub fn status_code(&self) -> Option<StatusCode> {
        match &self.outcome {
            Outcome::Pending => None,
            Outcome::Succeeded(res) => Some(res.status),
            Outcome::Failed(failure) => Some(failure.status),
        }
    }

    pub(crate) fn succeed(&mut self, response: BackendResponse) {
        debug_assert!(matches!(self.outcome, Outcome::Pending), "outcome set twice");
        self.outcome = Outcome::Succeeded(response);
    }

    pub(crate) fn fail(&mut self, status: StatusCode, error: DispatchError) {
        debug_assert!(matches!(self.outcome, Outcome::Pending), "outcome set twice");
        self.outcome = Outcome::Failed(Failure::new(status, error));
    }

    /// Give the backend slot back and hand out whatever the dispatch produced.
    pub fn release(self) -> Outcome {
        tracing::trace!(
            attribution = %self.attribution_name,
            backend = ?self.server_addr(),
            "Candidate released"
        );
        self.outcome
    }
}
