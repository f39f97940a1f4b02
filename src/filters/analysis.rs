//! Backend latency and failure accounting.
//!
//! This is the only place backend failures are counted. It never runs for a
//! user cancellation, so abandoned requests do not inflate failure rates.

use crate::filters::{Filter, FilterContext, FilterResult};
use crate::observability::metrics;

/// Variable-bag key holding the backend latency in milliseconds.
pub const VAR_LATENCY_MS: &str = "analysis.latency_ms";

#[derive(Debug, Default)]
pub struct AnalysisFilter;

impl AnalysisFilter {
    pub const NAME: &'static str = "analysis";
}

impl Filter for AnalysisFilter {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn post(&self, ctx: &mut FilterContext<'_>) -> FilterResult {
        let backend = ctx.candidate().server_addr().unwrap_or("none").to_owned();
        let status = ctx.response().map(|r| r.status.as_u16()).unwrap_or_default();

        if let Some(latency) = ctx.backend_latency() {
            metrics::record_backend_call(&backend, status, latency);
            ctx.set_var(VAR_LATENCY_MS, latency.as_millis().to_string());
        }
        Ok(())
    }

    fn post_err(&self, ctx: &mut FilterContext<'_>) -> FilterResult {
        let backend = ctx.candidate().server_addr().unwrap_or("none").to_owned();
        let status = ctx.failure().map(|f| f.status.as_u16()).unwrap_or_default();

        metrics::record_backend_failure(&backend);
        if let Some(latency) = ctx.backend_latency() {
            metrics::record_backend_call(&backend, status, latency);
            ctx.set_var(VAR_LATENCY_MS, latency.as_millis().to_string());
        }
        Ok(())
    }
}
