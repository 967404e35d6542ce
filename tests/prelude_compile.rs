//! Compile-time prelude coverage test (adapter-focused).
use caught::prelude::*;
use std::sync::Arc;
use tower::{service_fn, ServiceExt};
use tower_layer::Layer;

struct Status(u16);

impl caught::adapters::ResponseStatus for Status {
    fn status_code(&self) -> u16 {
        self.0
    }
}

#[tokio::test]
async fn prelude_reexports_core_types() {
    let engine = CaptureEngine::new();
    let observer: SharedObserver = Arc::new(|_: &CapturedEvent| {});
    let subscription: Subscription = engine.subscribe(observer);

    let svc = FetchCaptureLayer::new(engine.clone())
        .layer(service_fn(|_req: &'static str| async { Ok::<_, std::io::Error>(Status(502)) }));
    let response = svc.oneshot("GET /health").await.expect("inner service succeeds");
    assert_eq!(response.0, 502);

    let outcome: Dispatch = engine.capture(CapturedEvent::new(
        CaptureKind::FrameworkError,
        vec![PayloadValue::from(ErrorDetails::new("RenderError", "missing template"))],
    ));
    assert!(outcome.is_admitted());
    assert_eq!(engine.stats().captured, 2);
    assert_eq!(format_messages(&[PayloadValue::from("x")]), "x");
    let _layer: CaptureLayer = CaptureLayer::new(engine.clone());
    let _options = InstallOptions::from(&CaptureConfig::default());
    subscription.unsubscribe();
}
