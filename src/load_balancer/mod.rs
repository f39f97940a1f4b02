//! Backend pool subsystem.
//!
//! # Data Flow
//! ```text
//! Route target → cluster identified
//!     → pool.rs (backends of the cluster)
//!     → round_robin.rs (rotate through backends with free capacity)
//!     → backend.rs (connection guard, held by the candidate)
//! ```
//!
//! # Design Decisions
//! - Selection is a resolver concern; the dispatch core only sees the guard
//! - A saturated or empty cluster yields no server rather than an error
//! - The guard is released when the candidate is released

pub mod backend;
pub mod pool;
pub mod round_robin;

pub use backend::{Backend, BackendConnectionGuard};
pub use pool::BackendManager;
