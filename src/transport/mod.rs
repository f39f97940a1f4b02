//! Backend transport seam.
//!
//! # Data Flow
//! ```text
//! CandidateDispatcher
//!     → Transport::invoke(outbound request, backend address)
//!     → client.rs (hyper-util pooled client, optional deadline)
//!     → BackendResponse | TransportError{kind}
//! ```
//!
//! # Design Decisions
//! - Timeouts belong here, never to the dispatch core
//! - Caller cancellation is observed here and tagged `Canceled`
//! - Responses are fully buffered so they can be merged

pub mod client;

use async_trait::async_trait;

use crate::http::{BackendResponse, OutboundRequest};
use crate::proxy::error::TransportError;

pub use client::HyperTransport;

/// Sends one outbound request to one backend.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn invoke(
        &self,
        outbound: &OutboundRequest,
        addr: &str,
    ) -> Result<BackendResponse, TransportError>;
}
