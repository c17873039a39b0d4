//! Streaming response interception.
//!
//! # Responsibilities
//! - Decorate the upstream body without buffering it
//! - Hand each success-class chunk to a [`ChunkInspector`]
//! - Count forwarded bytes and time the exchange
//! - Emit exactly one [`ResponseEvent`] per response (complete, failed or cancelled)
//!
//! # Design Decisions
//! - The decorator forwards `poll_frame` to the inner body, so chunking,
//!   backpressure and end-of-stream signalling are the upstream's own
//! - Non-success responses are never wrapped; their payloads reach the
//!   client untouched
//! - Inspection fails open: an inspector error or panic forwards the
//!   original chunk and is logged, never surfaced to the client

use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use bytes::Bytes;
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use serde::Serialize;

use crate::observability::metrics;

/// Coarse classification of a response for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Success,
    ClientError,
    ServerError,
}

impl Outcome {
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_server_error() {
            Outcome::ServerError
        } else if status.is_client_error() {
            Outcome::ClientError
        } else {
            Outcome::Success
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::ClientError => "client-error",
            Outcome::ServerError => "server-error",
        }
    }
}

/// One per request; produced when the response stream ends or is dropped.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEvent {
    pub request_id: String,
    pub status: u16,
    /// Bytes forwarded to the client. Zero for non-success responses,
    /// whose bodies are not observed.
    pub bytes: u64,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
    pub outcome: Outcome,
    /// The client went away before the stream completed.
    pub cancelled: bool,
    /// The upstream body errored before the stream completed.
    pub failed: bool,
}

/// How an observed body stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    Complete,
    Failed,
    Cancelled,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Destination for response events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ResponseEvent);
}

/// Logs each event and records response metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: ResponseEvent) {
        match event.outcome {
            Outcome::Success if event.failed => tracing::error!(
                request_id = %event.request_id,
                status = event.status,
                bytes = event.bytes,
                elapsed_ms = event.elapsed.as_millis() as u64,
                "Upstream body failed mid-stream"
            ),
            Outcome::Success => tracing::info!(
                request_id = %event.request_id,
                status = event.status,
                bytes = event.bytes,
                elapsed_ms = event.elapsed.as_millis() as u64,
                cancelled = event.cancelled,
                "Response completed"
            ),
            Outcome::ClientError => tracing::warn!(
                request_id = %event.request_id,
                status = event.status,
                elapsed_ms = event.elapsed.as_millis() as u64,
                "Upstream returned client error"
            ),
            Outcome::ServerError => tracing::error!(
                request_id = %event.request_id,
                status = event.status,
                elapsed_ms = event.elapsed.as_millis() as u64,
                "Upstream returned server error"
            ),
        }
        metrics::record_response(&event);
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum InspectError {
    #[error("inspector failed: {0}")]
    Failed(String),
    #[error("inspector panicked")]
    Panicked,
}

/// Observes (and may rewrite) success-class body chunks.
///
/// The inspector owns each chunk it is given and returns the buffer to emit.
pub trait ChunkInspector: Send {
    fn inspect(&mut self, chunk: Bytes) -> Result<Bytes, InspectError>;

    /// Whether emitted chunks always have the length of their input.
    /// When false the upstream `Content-Length` is dropped.
    fn preserves_length(&self) -> bool {
        true
    }
}

/// Creates one inspector per success response.
pub trait InspectorFactory: Send + Sync {
    fn create(&self, request_id: &str, status: StatusCode) -> Result<Box<dyn ChunkInspector>, InspectError>;
}

/// Default inspector: logs a bounded preview of each chunk at debug level.
#[derive(Debug, Clone)]
pub struct LoggingInspector {
    request_id: String,
    status: StatusCode,
    preview_limit: usize,
}

impl ChunkInspector for LoggingInspector {
    fn inspect(&mut self, chunk: Bytes) -> Result<Bytes, InspectError> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            let end = chunk.len().min(self.preview_limit);
            let preview = String::from_utf8_lossy(&chunk[..end]);
            tracing::debug!(
                request_id = %self.request_id,
                status = %self.status,
                len = chunk.len(),
                preview = %preview,
                "<--- response chunk"
            );
        }
        Ok(chunk)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoggingInspectorFactory {
    pub preview_limit: usize,
}

impl Default for LoggingInspectorFactory {
    fn default() -> Self {
        Self { preview_limit: 256 }
    }
}

impl InspectorFactory for LoggingInspectorFactory {
    fn create(&self, request_id: &str, status: StatusCode) -> Result<Box<dyn ChunkInspector>, InspectError> {
        Ok(Box::new(LoggingInspector {
            request_id: request_id.to_string(),
            status,
            preview_limit: self.preview_limit,
        }))
    }
}

/// Returned when interception could not be set up; carries the untouched response.
#[derive(Debug)]
pub struct InterceptError {
    pub error: InspectError,
    response: Response<Body>,
}

impl InterceptError {
    pub fn into_response(self) -> Response<Body> {
        self.response
    }
}

/// Wraps upstream responses on their way back to the client.
#[derive(Clone)]
pub struct ResponseInterceptor {
    sink: Arc<dyn EventSink>,
    inspectors: Arc<dyn InspectorFactory>,
}

impl ResponseInterceptor {
    pub fn new(sink: Arc<dyn EventSink>, inspectors: Arc<dyn InspectorFactory>) -> Self {
        Self { sink, inspectors }
    }

    /// Attach observation to `response`. `started` is when the request was admitted.
    pub fn intercept(
        &self,
        response: Response<Body>,
        request_id: &str,
        started: Instant,
    ) -> Result<Response<Body>, InterceptError> {
        let status = response.status();

        if !status.is_success() {
            self.sink.emit(ResponseEvent {
                request_id: request_id.to_string(),
                status: status.as_u16(),
                bytes: 0,
                elapsed: started.elapsed(),
                outcome: Outcome::from_status(status),
                cancelled: false,
                failed: false,
            });
            return Ok(response);
        }

        let inspector = match self.inspectors.create(request_id, status) {
            Ok(inspector) => inspector,
            Err(error) => return Err(InterceptError { error, response }),
        };

        let (mut parts, body) = response.into_parts();
        if !inspector.preserves_length() {
            parts.headers.remove(header::CONTENT_LENGTH);
        }

        let observed = ObservedBody {
            inner: body,
            inspector: Some(inspector),
            bytes: 0,
            pending: Some(PendingEvent {
                request_id: request_id.to_string(),
                status,
                started,
                sink: self.sink.clone(),
            }),
        };
        Ok(Response::from_parts(parts, Body::new(observed)))
    }
}

impl Default for ResponseInterceptor {
    fn default() -> Self {
        Self::new(Arc::new(LogSink), Arc::new(LoggingInspectorFactory::default()))
    }
}

struct PendingEvent {
    request_id: String,
    status: StatusCode,
    started: Instant,
    sink: Arc<dyn EventSink>,
}

/// Body decorator that observes every data frame of the inner body.
struct ObservedBody {
    inner: Body,
    /// `None` once the inspector has failed hard; later chunks pass through.
    inspector: Option<Box<dyn ChunkInspector>>,
    bytes: u64,
    /// Taken when the event is emitted, so it fires exactly once.
    pending: Option<PendingEvent>,
}

impl ObservedBody {
    fn observe(&mut self, chunk: Bytes) -> Bytes {
        let Some(inspector) = self.inspector.as_mut() else {
            self.bytes += chunk.len() as u64;
            return chunk;
        };

        let original = chunk.clone();
        let result = panic::catch_unwind(AssertUnwindSafe(|| inspector.inspect(chunk)))
            .unwrap_or(Err(InspectError::Panicked));

        let out = match result {
            Ok(rewritten) => {
                drop(original);
                rewritten
            }
            Err(error) => {
                let request_id = self.pending.as_ref().map(|p| p.request_id.as_str()).unwrap_or("");
                tracing::error!(
                    request_id = %request_id,
                    error = %error,
                    "Chunk inspection failed, forwarding chunk unmodified"
                );
                metrics::record_inspection_error();
                if matches!(error, InspectError::Panicked) {
                    self.inspector = None;
                }
                original
            }
        };
        self.bytes += out.len() as u64;
        out
    }

    fn finish(&mut self, end: StreamEnd) {
        if let Some(pending) = self.pending.take() {
            pending.sink.emit(ResponseEvent {
                request_id: pending.request_id,
                status: pending.status.as_u16(),
                bytes: self.bytes,
                elapsed: pending.started.elapsed(),
                outcome: Outcome::from_status(pending.status),
                cancelled: end == StreamEnd::Cancelled,
                failed: end == StreamEnd::Failed,
            });
        }
    }
}

impl HttpBody for ObservedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(frame))) => {
                let frame = match frame.into_data() {
                    Ok(data) => Frame::data(this.observe(data)),
                    Err(trailers) => trailers,
                };
                // The server may stop polling once the inner body reports its end.
                if this.inner.is_end_stream() {
                    this.finish(StreamEnd::Complete);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::warn!(error = %e, "Upstream body failed mid-stream");
                this.finish(StreamEnd::Failed);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finish(StreamEnd::Complete);
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inspector {
            Some(inspector) if !inspector.preserves_length() => SizeHint::default(),
            _ => self.inner.size_hint(),
        }
    }
}

impl Drop for ObservedBody {
    fn drop(&mut self) {
        // Still pending with data left means the client disconnected mid-stream.
        let end = if self.inner.is_end_stream() {
            StreamEnd::Complete
        } else {
            StreamEnd::Cancelled
        };
        self.finish(end);
    }
}
