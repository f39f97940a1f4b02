//! hyper-util backed transport.

use std::error::Error as StdError;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::uri::{Authority, Scheme};
use axum::http::{header, HeaderValue, Request, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio_util::sync::CancellationToken;

use crate::http::{BackendResponse, OutboundRequest};
use crate::proxy::error::{TransportError, TransportErrorKind};
use crate::transport::Transport;

/// Pooled HTTP/1.1 + HTTP/2 client towards backends.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
    timeout: Option<Duration>,
    max_body_size: usize,
}

impl HyperTransport {
    pub fn new(timeout: Option<Duration>, max_body_size: usize) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self {
            client,
            timeout,
            max_body_size,
        }
    }

    fn build_request(outbound: &OutboundRequest, addr: &str) -> Result<Request<Body>, TransportError> {
        let authority = Authority::from_str(addr)
            .map_err(|e| TransportError::new(TransportErrorKind::Other, format!("bad backend address {addr}: {e}")))?;

        let mut uri_parts = outbound.uri().clone().into_parts();
        uri_parts.scheme = Some(Scheme::HTTP);
        uri_parts.authority = Some(authority);
        if uri_parts.path_and_query.is_none() {
            uri_parts.path_and_query = Some("/".parse().map_err(|e| {
                TransportError::new(TransportErrorKind::Other, format!("{e}"))
            })?);
        }
        let uri = Uri::from_parts(uri_parts)
            .map_err(|e| TransportError::new(TransportErrorKind::Other, format!("bad outbound uri: {e}")))?;

        let mut request = Request::new(Body::from(outbound.body().clone()));
        *request.method_mut() = outbound.method().clone();
        *request.uri_mut() = uri;
        *request.headers_mut() = outbound.headers().clone();
        if !request.headers().contains_key(header::HOST) {
            if let Ok(host) = HeaderValue::from_str(addr) {
                request.headers_mut().insert(header::HOST, host);
            }
        }
        Ok(request)
    }

    async fn send(&self, request: Request<Body>) -> Result<BackendResponse, TransportError> {
        let response = self.client.request(request).await.map_err(classify)?;
        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), self.max_body_size)
            .await
            .map_err(|e| TransportError::new(TransportErrorKind::Other, format!("reading backend body: {e}")))?;

        let mut headers = parts.headers;
        // The body is buffered; framing is recomputed when it is written out.
        headers.remove(header::TRANSFER_ENCODING);
        headers.remove(header::CONNECTION);

        Ok(BackendResponse::new(parts.status, headers, body))
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn invoke(
        &self,
        outbound: &OutboundRequest,
        addr: &str,
    ) -> Result<BackendResponse, TransportError> {
        let request = Self::build_request(outbound, addr)?;
        let cancel = outbound
            .extensions()
            .get::<CancellationToken>()
            .cloned()
            .unwrap_or_default();

        let call = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, self.send(request))
                    .await
                    .map_err(|_| {
                        TransportError::new(
                            TransportErrorKind::Timeout,
                            format!("backend did not answer within {limit:?}"),
                        )
                    })?,
                None => self.send(request).await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::canceled()),
            result = call => result,
        }
    }
}

/// Map a client error onto a transport error kind.
fn classify(err: hyper_util::client::legacy::Error) -> TransportError {
    if err.is_connect() {
        return TransportError::new(TransportErrorKind::Connect, err.to_string());
    }

    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(hyper_err) = inner.downcast_ref::<hyper::Error>() {
            if hyper_err.is_canceled() {
                return TransportError::new(
                    TransportErrorKind::Canceled,
                    format!("{}: {hyper_err}", crate::proxy::error::ERR_PREFIX_REQUEST_CANCEL),
                );
            }
            if hyper_err.is_timeout() {
                return TransportError::new(TransportErrorKind::Timeout, hyper_err.to_string());
            }
        }
        source = inner.source();
    }

    TransportError::new(TransportErrorKind::Other, err.to_string())
}
