use caught::adapters::{FetchCaptureLayer, ResponseStatus};
use caught::{CaptureEngine, CaptureKind, CapturedEvent, ManualClock, NullSink, PayloadValue};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use std::time::Duration;
use tower::{Service, ServiceBuilder};
use futures::future::Ready;

// Upstream that always answers with a server error.
#[derive(Clone)]
struct ErrorStatusService;

struct Status(u16);

impl ResponseStatus for Status {
    fn status_code(&self) -> u16 {
        self.0
    }
}

impl Service<&'static str> for ErrorStatusService {
    type Response = Status;
    type Error = std::io::Error;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: &'static str) -> Self::Future {
        futures::future::ready(Ok(Status(503)))
    }
}

fn engine(clock: &ManualClock) -> CaptureEngine {
    CaptureEngine::builder()
        .ttl(Duration::from_secs(3))
        .clock(clock.clone())
        .default_sink(NullSink)
        .build()
        .unwrap()
}

fn structured_event() -> CapturedEvent {
    CapturedEvent::new(
        CaptureKind::NetworkFetchError,
        vec![
            PayloadValue::from("Fetch Error: 503"),
            PayloadValue::structured(json!({
                "url": "/api/items",
                "attempt": 2,
                "tags": ["a", "b"],
            })),
        ],
    )
}

fn capture_suppressed(c: &mut Criterion) {
    let clock = ManualClock::new();
    let engine = engine(&clock);
    engine.capture(structured_event());

    c.bench_function("capture_suppressed_duplicate", |b| {
        b.iter(|| black_box(engine.capture(black_box(structured_event()))));
    });
}

fn capture_admitted(c: &mut Criterion) {
    let clock = ManualClock::new();
    let engine = engine(&clock);

    c.bench_function("capture_admitted_default_sink", |b| {
        b.iter(|| {
            // each iteration opens a fresh window for the same fingerprint
            clock.advance(3_000);
            black_box(engine.capture(black_box(structured_event())))
        });
    });
}

fn fetch_layer_error_status(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let clock = ManualClock::new();
    let layer = FetchCaptureLayer::new(engine(&clock));
    let svc = ServiceBuilder::new().layer(layer).service(ErrorStatusService);

    c.bench_function("fetch_layer_error_status", |b| {
        b.to_async(&rt).iter(|| async {
            let mut local_svc = svc.clone();
            let _ = black_box(local_svc.call(black_box("GET /api/items"))).await;
        });
    });
}

criterion_group!(benches, capture_suppressed, capture_admitted, fetch_layer_error_status);
criterion_main!(benches);
