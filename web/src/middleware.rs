//! Request correlation.
//!
//! [`CorrelationLayer`] tags each request with a [`CorrelationId`]: the
//! caller's `X-Correlation-ID` when it parses as a UUID, a fresh one
//! otherwise. Handlers and their store calls run inside a `request` span
//! carrying the id, a `Request finished` event records status and latency,
//! and the id is echoed back so a failed payout run can be traced from the
//! admin's browser to the server log.
//!
//! ```
//! use axum::{Router, routing::get};
//! use dormclean_web::middleware::correlation_id_layer;
//!
//! let app: Router = Router::new()
//!     .route("/health", get(|| async { "ok" }))
//!     .layer(correlation_id_layer());
//! ```

use crate::extractors::CorrelationId;
use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    response::Response,
};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Request and response header holding the correlation id.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// The layer applied by [`crate::build_router`].
#[must_use]
pub const fn correlation_id_layer() -> CorrelationLayer {
    CorrelationLayer
}

/// Read the caller-supplied id, if it is a UUID.
pub(crate) fn incoming_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
}

/// Wraps a service in [`Correlated`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CorrelationLayer;

impl<S> Layer<S> for CorrelationLayer {
    type Service = Correlated<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Correlated { inner }
    }
}

/// Service produced by [`CorrelationLayer`].
#[derive(Clone, Debug)]
pub struct Correlated<S> {
    inner: S,
}

type ResponseFuture<E> = Pin<Box<dyn Future<Output = Result<Response, E>> + Send>>;

impl<S> Service<Request> for Correlated<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = ResponseFuture<S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let id = incoming_id(request.headers()).unwrap_or_else(Uuid::new_v4);
        request.extensions_mut().insert(CorrelationId(id));

        let span = tracing::info_span!(
            "request",
            correlation_id = %id,
            method = %request.method(),
            path = %request.uri().path(),
        );
        let started = Instant::now();
        let pending = self.inner.call(request);

        Box::pin(
            async move {
                let mut response = pending.await?;
                let status = response.status();
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                if status.is_server_error() {
                    tracing::warn!(status = status.as_u16(), elapsed_ms, "Request finished");
                } else {
                    tracing::debug!(status = status.as_u16(), elapsed_ms, "Request finished");
                }

                if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
                    response.headers_mut().insert(CORRELATION_ID_HEADER, value);
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}
