//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, body limit, tracing)
//!     → request.rs (buffer once, attach client addr + cancellation)
//!     → [route table selects candidates]
//!     → [fan-out coordinator dispatches them]
//!     → response.rs (passthrough, merged body, or bare status)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{InboundRequest, OutboundRequest, X_REQUEST_ID};
pub use response::{status_only, BackendResponse};
pub use server::{AppState, HttpServer};
