//! Ordered, short-circuiting filter pipeline.

use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;

use crate::config::FilterSettings;
use crate::filters::{registry, Filter, FilterContext, FilterError};
use crate::proxy::error::DispatchError;

/// The filter that stopped a chain, with the outcome it imposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStop {
    pub filter: &'static str,
    pub status: StatusCode,
    pub reason: String,
}

impl ChainStop {
    pub fn into_error(self) -> (StatusCode, DispatchError) {
        (
            self.status,
            DispatchError::FilterRejected {
                filter: self.filter,
                reason: self.reason,
            },
        )
    }
}

/// Immutable ordered sequence of filters, cheap to clone and share.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Arc<[Arc<dyn Filter>]>,
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl FilterChain {
    pub fn new(filters: Vec<Arc<dyn Filter>>) -> Self {
        Self {
            filters: filters.into(),
        }
    }

    /// Build the chain from configured names, in order.
    /// Any unknown name or bad setting fails the whole chain.
    pub fn from_names(names: &[String], settings: &FilterSettings) -> Result<Self, FilterError> {
        let filters = names
            .iter()
            .map(|name| registry::new_filter(name, settings))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(filters))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn run_pre(&self, ctx: &mut FilterContext<'_>) -> Result<(), ChainStop> {
        for filter in self.filters.iter() {
            if let Err(rejection) = filter.pre(ctx) {
                return Err(ChainStop {
                    filter: filter.name(),
                    status: rejection.status,
                    reason: rejection.reason,
                });
            }
        }
        Ok(())
    }

    pub fn run_post(&self, ctx: &mut FilterContext<'_>) -> Result<(), ChainStop> {
        for filter in self.filters.iter() {
            if let Err(rejection) = filter.post(ctx) {
                return Err(ChainStop {
                    filter: filter.name(),
                    status: rejection.status,
                    reason: rejection.reason,
                });
            }
        }
        Ok(())
    }

    /// Best effort: every filter runs, failures are only logged.
    pub fn run_post_err(&self, ctx: &mut FilterContext<'_>) {
        for filter in self.filters.iter() {
            if let Err(rejection) = filter.post_err(ctx) {
                tracing::warn!(
                    filter = filter.name(),
                    status = %rejection.status,
                    reason = %rejection.reason,
                    "Post-error filter failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::InboundRequest;
    use crate::proxy::testing::{inbound, Phase, RecordingFilter, StaticResolver};
    use crate::proxy::Candidate;

    fn run<F>(chain: &FilterChain, f: F)
    where
        F: FnOnce(&FilterChain, &mut FilterContext<'_>),
    {
        let inbound: InboundRequest = inbound("/api");
        let candidate = Candidate::new("a", None);
        let resolver = StaticResolver::default();
        let mut ctx = FilterContext::new(&inbound, inbound.to_outbound(), &candidate, &resolver);
        f(chain, &mut ctx);
    }

    #[test]
    fn runs_in_registration_order() {
        let log = RecordingFilter::log();
        let chain = FilterChain::new(vec![
            RecordingFilter::passing("first", &log),
            RecordingFilter::passing("second", &log),
            RecordingFilter::passing("third", &log),
        ]);

        run(&chain, |chain, ctx| {
            chain.run_pre(ctx).unwrap();
            chain.run_post(ctx).unwrap();
        });

        assert_eq!(
            log.entries(),
            vec![
                ("first", Phase::Pre),
                ("second", Phase::Pre),
                ("third", Phase::Pre),
                ("first", Phase::Post),
                ("second", Phase::Post),
                ("third", Phase::Post),
            ]
        );
    }

    #[test]
    fn rejection_short_circuits() {
        let log = RecordingFilter::log();
        let chain = FilterChain::new(vec![
            RecordingFilter::passing("first", &log),
            RecordingFilter::rejecting("guard", Phase::Pre, StatusCode::FORBIDDEN, &log),
            RecordingFilter::passing("third", &log),
        ]);

        run(&chain, |chain, ctx| {
            let stop = chain.run_pre(ctx).unwrap_err();
            assert_eq!(stop.filter, "guard");
            assert_eq!(stop.status, StatusCode::FORBIDDEN);
        });

        assert_eq!(log.entries(), vec![("first", Phase::Pre), ("guard", Phase::Pre)]);
    }

    #[test]
    fn post_err_failures_do_not_stop_the_chain() {
        let log = RecordingFilter::log();
        let chain = FilterChain::new(vec![
            RecordingFilter::rejecting("noisy", Phase::PostErr, StatusCode::IM_A_TEAPOT, &log),
            RecordingFilter::passing("after", &log),
        ]);

        run(&chain, |chain, ctx| chain.run_post_err(ctx));

        assert_eq!(
            log.entries(),
            vec![("noisy", Phase::PostErr), ("after", Phase::PostErr)]
        );
    }

    #[test]
    fn unknown_name_fails_construction() {
        let names = vec!["headers".to_string(), "does-not-exist".to_string()];
        let err = FilterChain::from_names(&names, &FilterSettings::default()).unwrap_err();
        assert!(matches!(err, FilterError::Unknown(name) if name == "does-not-exist"));
    }

    #[test]
    fn builds_known_names_in_order() {
        let names = vec!["x-forwarded".to_string(), "headers".to_string(), "analysis".to_string()];
        let chain = FilterChain::from_names(&names, &FilterSettings::default()).unwrap();
        assert_eq!(chain.names(), vec!["x-forwarded", "headers", "analysis"]);
    }
}
