//! Dispatch error taxonomy and cancellation classification.
//!
//! # Taxonomy
//! - `NoServer`: the resolver produced a candidate without a usable backend
//! - `Transport`: network/connection failure calling the backend
//! - `BackendServerError`: backend answered with a 5xx status
//! - `FilterRejected`: a pre or post filter stopped the chain
//! - `InvalidRewrite`: the resolver's target could not form a valid URI
//! - `Aborted`: the dispatch task itself died
//!
//! A user cancellation is a `Transport` failure whose kind is
//! [`TransportErrorKind::Canceled`]. It still fails the candidate but is
//! excluded from post-error filters and failure accounting.

use axum::http::StatusCode;
use thiserror::Error;

/// Message prefix transports use when the caller abandoned the request.
pub const ERR_PREFIX_REQUEST_CANCEL: &str = "request canceled";

/// Broad class of a transport failure, decided where the failure originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The caller went away before the backend answered.
    Canceled,
    /// Could not establish a connection to the backend.
    Connect,
    /// The transport's own deadline elapsed.
    Timeout,
    /// Anything else (protocol errors, broken bodies, ...).
    Other,
}

/// Failure reported by a backend transport.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The caller abandoned the request.
    pub fn canceled() -> Self {
        Self::new(
            TransportErrorKind::Canceled,
            format!("{ERR_PREFIX_REQUEST_CANCEL}: caller went away"),
        )
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Why a single candidate dispatch failed.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("has no server")]
    NoServer,

    #[error("backend {addr} unreachable: {source}")]
    Transport {
        addr: String,
        #[source]
        source: TransportError,
    },

    #[error("backend {addr} responded with {status}")]
    BackendServerError { addr: String, status: StatusCode },

    #[error("filter <{filter}> rejected request: {reason}")]
    FilterRejected { filter: &'static str, reason: String },

    #[error("cannot route to {uri}: {reason}")]
    InvalidRewrite { uri: String, reason: String },

    #[error("dispatch task aborted: {0}")]
    Aborted(String),
}

/// A terminal failure: the status surfaced to the caller plus its cause.
#[derive(Debug, Clone)]
pub struct Failure {
    pub status: StatusCode,
    pub error: DispatchError,
}

impl Failure {
    pub fn new(status: StatusCode, error: DispatchError) -> Self {
        Self { status, error }
    }
}

/// Returns true when `err` denotes caller-initiated cancellation.
///
/// Only gates post-error filters and failure telemetry; the terminal
/// status code of the candidate is never affected.
pub fn is_user_cancellation(err: &DispatchError) -> bool {
    match err {
        DispatchError::Transport { source, .. } => {
            source.kind() == TransportErrorKind::Canceled
                || source.message().starts_with(ERR_PREFIX_REQUEST_CANCEL)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(kind: TransportErrorKind, msg: &str) -> DispatchError {
        DispatchError::Transport {
            addr: "127.0.0.1:9000".into(),
            source: TransportError::new(kind, msg),
        }
    }

    #[test]
    fn canceled_kind_is_user_cancellation() {
        let err = DispatchError::Transport {
            addr: "127.0.0.1:9000".into(),
            source: TransportError::canceled(),
        };
        assert!(is_user_cancellation(&err));
    }

    #[test]
    fn cancel_prefix_is_recognised_without_tag() {
        let err = transport(TransportErrorKind::Other, "request canceled while waiting");
        assert!(is_user_cancellation(&err));
    }

    #[test]
    fn genuine_failures_are_not_cancellation() {
        assert!(!is_user_cancellation(&transport(
            TransportErrorKind::Connect,
            "connection refused"
        )));
        assert!(!is_user_cancellation(&transport(
            TransportErrorKind::Timeout,
            "backend timed out"
        )));
        assert!(!is_user_cancellation(&DispatchError::NoServer));
        assert!(!is_user_cancellation(&DispatchError::BackendServerError {
            addr: "x".into(),
            status: StatusCode::BAD_GATEWAY,
        }));
    }

    #[test]
    fn prefix_must_lead_the_message() {
        let err = transport(TransportErrorKind::Other, "upstream said: request canceled");
        assert!(!is_user_cancellation(&err));
    }
}
