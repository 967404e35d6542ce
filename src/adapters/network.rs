//! Network failure adapters.
//!
//! - [`FetchCaptureLayer`] wraps any tower service whose responses carry a status code. A
//!   response outside `200..300` is reported as `["Fetch Error: <status>", url]`; an error from
//!   the inner service is reported as `["Fetch Network Error", request, error]`. The inner
//!   result is always passed through unchanged.
//! - [`report_transport_error`] / [`report_transport_status`] cover request/response
//!   transports driven through lifecycle callbacks rather than a service call.

use crate::engine::{CaptureEngine, Dispatch};
use crate::event::{CaptureKind, CapturedEvent};
use crate::payload::PayloadValue;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// A response that exposes its status code.
pub trait ResponseStatus {
    fn status_code(&self) -> u16;

    /// Final address of the response, when known.
    fn location(&self) -> Option<String> {
        None
    }
}

/// Tower layer reporting failed fetches to a [`CaptureEngine`].
#[derive(Debug, Clone)]
pub struct FetchCaptureLayer {
    engine: CaptureEngine,
}

impl FetchCaptureLayer {
    pub fn new(engine: CaptureEngine) -> Self {
        Self { engine }
    }
}

impl<S> Layer<S> for FetchCaptureLayer {
    type Service = FetchCaptureService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        FetchCaptureService { inner, engine: self.engine.clone() }
    }
}

/// Service produced by [`FetchCaptureLayer`].
#[derive(Debug, Clone)]
pub struct FetchCaptureService<S> {
    inner: S,
    engine: CaptureEngine,
}

impl<S, Req> Service<Req> for FetchCaptureService<S>
where
    S: Service<Req>,
    S::Response: ResponseStatus + Send + 'static,
    S::Error: std::error::Error + Send + 'static,
    S::Future: Send + 'static,
    Req: fmt::Debug,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let request = format!("{:?}", req);
        let engine = self.engine.clone();
        let fut = self.inner.call(req);

        Box::pin(async move {
            match fut.await {
                Ok(response) => {
                    let status = response.status_code();
                    if !(200..300).contains(&status) {
                        let location = response.location().unwrap_or_else(|| request.clone());
                        engine.capture(CapturedEvent::new(
                            CaptureKind::NetworkFetchError,
                            [format!("Fetch Error: {}", status), location],
                        ));
                    }
                    Ok(response)
                }
                Err(err) => {
                    engine.capture(CapturedEvent::new(
                        CaptureKind::NetworkFetchError,
                        vec![
                            PayloadValue::from("Fetch Network Error"),
                            PayloadValue::from(request),
                            PayloadValue::error(&err),
                        ],
                    ));
                    Err(err)
                }
            }
        })
    }
}

/// Request details recorded by transport adapters. Carries no credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportRequest {
    pub method: String,
    pub url: String,
}

impl TransportRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self { method: method.into(), url: url.into() }
    }
}

/// Report a transport that failed before producing a response.
///
/// Payload: `["Transport Network Error", request]`.
pub fn report_transport_error(engine: &CaptureEngine, request: &TransportRequest) -> Dispatch {
    engine.capture(CapturedEvent::new(
        CaptureKind::NetworkTransportError,
        vec![
            PayloadValue::from("Transport Network Error"),
            PayloadValue::structured(request.clone()),
        ],
    ))
}

/// Report a completed transport whose status is >= 400; other statuses return `None`.
///
/// Payload: `["Transport HTTP Error: <status>", request]`.
pub fn report_transport_status(
    engine: &CaptureEngine,
    request: &TransportRequest,
    status: u16,
) -> Option<Dispatch> {
    if status < 400 {
        return None;
    }
    Some(engine.capture(CapturedEvent::new(
        CaptureKind::NetworkTransportError,
        vec![
            PayloadValue::from(format!("Transport HTTP Error: {}", status)),
            PayloadValue::structured(request.clone()),
        ],
    )))
}
