//! Startup-time registration table of built-in filters.

use std::sync::Arc;

use crate::config::FilterSettings;
use crate::filters::{
    access::IpAccessFilter, analysis::AnalysisFilter, forwarded::XForwardedFilter,
    headers::HeadersFilter, rate_limit::RateLimitFilter, Filter, FilterError,
};

type Constructor = fn(&FilterSettings) -> Result<Arc<dyn Filter>, FilterError>;

const BUILTIN: &[(&str, Constructor)] = &[
    (HeadersFilter::NAME, headers),
    (XForwardedFilter::NAME, x_forwarded),
    (IpAccessFilter::NAME, ip_access),
    (RateLimitFilter::NAME, rate_limit),
    (AnalysisFilter::NAME, analysis),
];

fn headers(_: &FilterSettings) -> Result<Arc<dyn Filter>, FilterError> {
    Ok(Arc::new(HeadersFilter))
}

fn x_forwarded(_: &FilterSettings) -> Result<Arc<dyn Filter>, FilterError> {
    Ok(Arc::new(XForwardedFilter))
}

fn ip_access(settings: &FilterSettings) -> Result<Arc<dyn Filter>, FilterError> {
    Ok(Arc::new(IpAccessFilter::from_config(&settings.access)?))
}

fn rate_limit(settings: &FilterSettings) -> Result<Arc<dyn Filter>, FilterError> {
    Ok(Arc::new(RateLimitFilter::from_config(&settings.rate_limit)?))
}

fn analysis(_: &FilterSettings) -> Result<Arc<dyn Filter>, FilterError> {
    Ok(Arc::new(AnalysisFilter))
}

/// Construct the filter registered under `name`.
pub fn new_filter(name: &str, settings: &FilterSettings) -> Result<Arc<dyn Filter>, FilterError> {
    let (_, constructor) = BUILTIN
        .iter()
        .find(|(registered, _)| *registered == name)
        .ok_or_else(|| FilterError::Unknown(name.to_string()))?;
    constructor(settings)
}

pub fn is_registered(name: &str) -> bool {
    BUILTIN.iter().any(|(registered, _)| *registered == name)
}

pub fn registered_names() -> impl Iterator<Item = &'static str> {
    BUILTIN.iter().map(|(name, _)| *name)
}
