//! Test doubles shared by the dispatch-core unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, Request, StatusCode};

use crate::filters::{Filter, FilterContext, FilterResult, Rejection};
use crate::http::{BackendResponse, InboundRequest, OutboundRequest};
use crate::load_balancer::Backend;
use crate::proxy::error::TransportError;
use crate::proxy::{Candidate, Resolver};
use crate::transport::Transport;

pub fn inbound(uri: &str) -> InboundRequest {
    inbound_with(uri, &[("host", "gateway.local")])
}

pub fn inbound_with(uri: &str, headers: &[(&str, &str)]) -> InboundRequest {
    let mut builder = Request::builder().uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    InboundRequest::from_request(builder.body(Bytes::new()).unwrap())
}

pub fn backend(addr: &str) -> Arc<Backend> {
    Arc::new(Backend::new(addr, "test", addr, 16))
}

/// Resolver that never matches; filters only need something to point at.
#[derive(Debug, Default)]
pub struct StaticResolver;

impl Resolver for StaticResolver {
    fn select(&self, _inbound: &InboundRequest) -> Vec<Candidate> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pre,
    Post,
    PostErr,
}

#[derive(Debug, Clone, Default)]
pub struct FilterLog(Arc<Mutex<Vec<(&'static str, Phase)>>>);

impl FilterLog {
    pub fn entries(&self) -> Vec<(&'static str, Phase)> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, name: &'static str, phase: Phase) {
        self.0.lock().unwrap().push((name, phase));
    }
}

/// Records every phase it runs in; optionally rejects in one phase.
#[derive(Debug)]
pub struct RecordingFilter {
    name: &'static str,
    reject: Option<(Phase, StatusCode)>,
    log: FilterLog,
}

impl RecordingFilter {
    pub fn log() -> FilterLog {
        FilterLog::default()
    }

    pub fn passing(name: &'static str, log: &FilterLog) -> Arc<dyn Filter> {
        Arc::new(Self {
            name,
            reject: None,
            log: log.clone(),
        })
    }

    pub fn rejecting(
        name: &'static str,
        phase: Phase,
        status: StatusCode,
        log: &FilterLog,
    ) -> Arc<dyn Filter> {
        Arc::new(Self {
            name,
            reject: Some((phase, status)),
            log: log.clone(),
        })
    }

    fn run(&self, phase: Phase) -> FilterResult {
        self.log.push(self.name, phase);
        match self.reject {
            Some((p, status)) if p == phase => Err(Rejection::new(status, format!("{} says no", self.name))),
            _ => Ok(()),
        }
    }
}

impl Filter for RecordingFilter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn pre(&self, _ctx: &mut FilterContext<'_>) -> FilterResult {
        self.run(Phase::Pre)
    }

    fn post(&self, _ctx: &mut FilterContext<'_>) -> FilterResult {
        self.run(Phase::Post)
    }

    fn post_err(&self, _ctx: &mut FilterContext<'_>) -> FilterResult {
        self.run(Phase::PostErr)
    }
}

/// Records the `merge` flag every candidate carries into its filters.
#[derive(Debug, Clone, Default)]
pub struct MergeProbe(Arc<Mutex<Vec<bool>>>);

impl MergeProbe {
    pub fn seen(&self) -> Vec<bool> {
        self.0.lock().unwrap().clone()
    }
}

impl Filter for MergeProbe {
    fn name(&self) -> &'static str {
        "merge-probe"
    }

    fn pre(&self, ctx: &mut FilterContext<'_>) -> FilterResult {
        self.0.lock().unwrap().push(ctx.candidate().is_merge());
        Ok(())
    }

    fn post(&self, ctx: &mut FilterContext<'_>) -> FilterResult {
        self.0.lock().unwrap().push(ctx.candidate().is_merge());
        Ok(())
    }
}

/// Panics in the pre phase.
#[derive(Debug, Default)]
pub struct PanickingFilter;

impl Filter for PanickingFilter {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn pre(&self, _ctx: &mut FilterContext<'_>) -> FilterResult {
        panic!("filter blew up");
    }
}

#[derive(Debug, Clone)]
pub struct Reply {
    result: Result<(StatusCode, &'static str), TransportError>,
    delay: Option<Duration>,
}

impl Reply {
    pub fn ok(body: &'static str) -> Self {
        Self::status(StatusCode::OK, body)
    }

    pub fn status(status: StatusCode, body: &'static str) -> Self {
        Self {
            result: Ok((status, body)),
            delay: None,
        }
    }

    pub fn error(err: TransportError) -> Self {
        Self {
            result: Err(err),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub addr: String,
    pub uri: String,
    pub host: Option<String>,
}

/// Transport answering from a fixed per-address script.
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: HashMap<String, Reply>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn reply(mut self, addr: &str, reply: Reply) -> Self {
        self.replies.insert(addr.to_string(), reply);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn invoke(
        &self,
        outbound: &OutboundRequest,
        addr: &str,
    ) -> Result<BackendResponse, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            addr: addr.to_string(),
            uri: outbound.uri().to_string(),
            host: outbound
                .headers()
                .get(header::HOST)
                .and_then(|h| h.to_str().ok())
                .map(str::to_owned),
        });

        let reply = self.replies.get(addr).cloned().unwrap_or_else(|| {
            Reply::status(StatusCode::NOT_FOUND, "{}")
        });
        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }

        let (status, body) = reply.result?;
        Ok(BackendResponse::new(status, HeaderMap::new(), body))
    }
}
