//! Filter subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     config.filters (ordered names)
//!     → registry.rs (name → constructor, unknown name is fatal)
//!     → chain.rs (immutable FilterChain, shared via Arc)
//!
//! Per candidate:
//!     pre filters → backend call → post filters | post-error filters
//! ```
//!
//! # Design Decisions
//! - Registration order is execution order for every phase
//! - Filters are synchronous and must not block on the network
//! - A pre/post rejection stops the chain; post-error results are only logged

pub mod access;
pub mod analysis;
pub mod chain;
pub mod context;
pub mod forwarded;
pub mod headers;
pub mod rate_limit;
pub mod registry;

use std::fmt;

use axum::http::StatusCode;
use thiserror::Error;

pub use chain::{ChainStop, FilterChain};
pub use context::FilterContext;

/// Why a filter stopped the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub reason: String,
}

impl Rejection {
    pub fn new(status: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }
}

pub type FilterResult = Result<(), Rejection>;

/// A pipeline stage. Every phase defaults to "continue".
pub trait Filter: Send + Sync + fmt::Debug {
    /// Name the filter is registered under.
    fn name(&self) -> &'static str;

    /// Runs before the backend call.
    fn pre(&self, _ctx: &mut FilterContext<'_>) -> FilterResult {
        Ok(())
    }

    /// Runs after a backend answered with a status below 500.
    fn post(&self, _ctx: &mut FilterContext<'_>) -> FilterResult {
        Ok(())
    }

    /// Runs after a genuine backend failure. Never after a user cancellation.
    fn post_err(&self, _ctx: &mut FilterContext<'_>) -> FilterResult {
        Ok(())
    }
}

/// Startup-time filter construction failure.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("unknown filter <{0}>")]
    Unknown(String),

    #[error("invalid settings for filter <{filter}>: {reason}")]
    InvalidSettings { filter: &'static str, reason: String },
}
