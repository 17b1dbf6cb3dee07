//! Streaming forward of a resolved link.
//!
//! # Responsibilities
//! - Build the outbound request from the caller's headers plus upstream suggestions
//! - Execute it once and relay status, filtered headers and body
//! - Keep memory bounded while streaming large files
//!
//! # Design Decisions
//! - No retries; a failed round-trip is a 502
//! - The timeout covers time-to-headers only; long downloads are not cut off
//! - Once the status line is sent, stream failures are logged, never reported

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{HeaderMap, HOST};
use axum::http::Method;
use axum::response::Response;
use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use tokio_util::io::{ReaderStream, StreamReader};

use crate::config::UpstreamConfig;
use crate::error::GatewayError;
use crate::http::request::X_REQUEST_ID;
use crate::observability::metrics;
use crate::security::headers::{copy_response_headers, merge_upstream_headers, strip_hop_by_hop};
use crate::upstream::link::ResolvedLink;

/// Size of the intermediate read buffer used while streaming bodies.
pub const COPY_BUFFER_SIZE: usize = 256 * 1024;

/// Executes proxied fetches against resolved links.
#[derive(Debug, Clone)]
pub struct StreamForwarder {
    client: reqwest::Client,
    response_timeout: Duration,
}

impl StreamForwarder {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            response_timeout: Duration::from_secs(config.fetch_timeout_secs),
        })
    }

    /// Fetch `link` with `method` and turn the upstream answer into the caller's response.
    pub async fn forward(
        &self,
        method: &Method,
        inbound: &HeaderMap,
        link: ResolvedLink,
    ) -> Result<Response, GatewayError> {
        let url = reqwest::Url::parse(&link.url).map_err(|e| {
            GatewayError::InternalRequestBuild(format!("invalid target url {}: {}", link.url, e))
        })?;

        let request = self
            .client
            .request(method.clone(), url)
            .headers(outbound_headers(inbound, &link.headers));

        let upstream = match tokio::time::timeout(self.response_timeout, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_builder() => {
                return Err(GatewayError::InternalRequestBuild(e.to_string()));
            }
            Ok(Err(e)) => return Err(GatewayError::UpstreamTransport(e.to_string())),
            Err(_) => {
                return Err(GatewayError::UpstreamTransport(format!(
                    "upstream did not respond within {}s",
                    self.response_timeout.as_secs()
                )));
            }
        };

        let status = upstream.status();
        let mut headers = HeaderMap::new();
        copy_response_headers(upstream.headers(), &mut headers);

        let body = if *method == Method::HEAD {
            Body::empty()
        } else {
            let expected = upstream.content_length();
            Body::from_stream(ForwardedBody::new(
                bounded_stream(upstream.bytes_stream()),
                link.url,
                expected,
            ))
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Caller headers with `Host` and the gateway's request ID dropped, upstream
/// suggestions merged underneath, and hop-by-hop headers removed.
pub fn outbound_headers(inbound: &HeaderMap, suggested: &HeaderMap) -> HeaderMap {
    let mut headers = inbound.clone();
    headers.remove(HOST);
    headers.remove(X_REQUEST_ID);
    merge_upstream_headers(&mut headers, suggested);
    strip_hop_by_hop(&mut headers);
    headers
}

/// Re-chunk `source` through a fixed `COPY_BUFFER_SIZE` read buffer.
pub fn bounded_stream<S, E>(source: S) -> impl Stream<Item = io::Result<Bytes>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let reader = StreamReader::new(source.map_err(|e| io::Error::new(io::ErrorKind::Other, e)));
    ReaderStream::with_capacity(reader, COPY_BUFFER_SIZE)
}

/// Response body that reports how a proxied transfer ended.
///
/// The transfer is complete once the upstream body ends or `expected` bytes
/// (the upstream Content-Length) have been relayed; hyper stops polling at
/// that point. Dropped before completion means the caller went away.
struct ForwardedBody {
    inner: Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>,
    target: String,
    expected: Option<u64>,
    sent: u64,
    finished: bool,
}

impl ForwardedBody {
    fn new(
        inner: impl Stream<Item = io::Result<Bytes>> + Send + 'static,
        target: String,
        expected: Option<u64>,
    ) -> Self {
        Self {
            inner: Box::pin(inner),
            target,
            expected,
            sent: 0,
            finished: false,
        }
    }

    fn complete(&mut self) {
        if !self.finished {
            self.finished = true;
            tracing::debug!(target_url = %self.target, bytes_sent = self.sent, "Stream complete");
        }
    }
}

impl Stream for ForwardedBody {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.sent += chunk.len() as u64;
                if this.expected.is_some_and(|expected| this.sent >= expected) {
                    this.complete();
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                tracing::warn!(
                    target_url = %this.target,
                    bytes_sent = this.sent,
                    error = %e,
                    "Upstream body failed mid-stream"
                );
                metrics::record_stream_abort("upstream");
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.complete();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ForwardedBody {
    fn drop(&mut self) {
        metrics::record_streamed_bytes(self.sent);
        if !self.finished {
            tracing::warn!(
                target_url = %self.target,
                bytes_sent = self.sent,
                "Copy to client aborted, caller disconnected"
            );
            metrics::record_stream_abort("caller");
        }
    }
}
