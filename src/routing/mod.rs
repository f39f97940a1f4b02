//! Routing subsystem: the resolver in front of the dispatch core.
//!
//! # Data Flow
//! ```text
//! Inbound request (host, path)
//!     → table.rs (first matching route by priority)
//!     → matcher.rs (evaluate match conditions)
//!     → one Candidate per route target, server picked from its cluster
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - First match wins (ordered by priority)

pub mod matcher;
pub mod table;

pub use table::{Route, RouteTable};
