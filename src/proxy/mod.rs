//! Request-dispatch core.
//!
//! # Data Flow
//! ```text
//! Resolver::select(inbound) → Vec<Candidate>
//!     → coordinator.rs (inline for one, one task each for many, join all)
//!         → dispatcher.rs (rewrite → pre → backend → post | post-error)
//!     → first failure in order → status only
//!     → single success → passthrough
//!     → all succeeded → merge.rs (aggregate JSON)
//! ```
//!
//! # Design Decisions
//! - Each candidate is owned by exactly one task; no shared mutable state
//! - The caller-facing response is built only after every task finished
//! - Candidates are released exactly once, by whoever reads them last

pub mod candidate;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod merge;

#[cfg(test)]
pub(crate) mod testing;

pub use candidate::{Candidate, Outcome, Rewrite};
pub use coordinator::FanoutCoordinator;
pub use dispatcher::CandidateDispatcher;
pub use error::{is_user_cancellation, DispatchError, Failure, TransportError, TransportErrorKind};
pub use merge::{merge_responses, MergedResponse, MERGE_CONTENT_TYPE};

use crate::http::InboundRequest;

/// Resolves an inbound request to its ordered backend candidates.
pub trait Resolver: Send + Sync {
    /// May return an empty list when nothing matches.
    fn select(&self, inbound: &InboundRequest) -> Vec<Candidate>;
}
