//! Logged-warning / logged-error adapter as a `tracing_subscriber` layer.

use crate::engine::{is_dispatching, CaptureEngine};
use crate::event::{CaptureKind, CapturedEvent};
use crate::payload::PayloadValue;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

const OWN_TARGET: &str = "caught";

/// Captures `WARN` and `ERROR` events.
///
/// The payload is the event message followed by one `name=value` text element per extra field,
/// in field order. Events emitted by this crate, and events emitted while the engine is
/// dispatching on the same thread, are ignored. Other layers still see every event.
#[derive(Debug, Clone)]
pub struct CaptureLayer {
    engine: CaptureEngine,
}

impl CaptureLayer {
    pub fn new(engine: CaptureEngine) -> Self {
        Self { engine }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let kind = match *metadata.level() {
            Level::ERROR => CaptureKind::LoggedError,
            Level::WARN => CaptureKind::LoggedWarning,
            _ => return,
        };
        if is_own_target(metadata.target()) || is_dispatching() {
            return;
        }

        let mut visitor = PayloadVisitor::default();
        event.record(&mut visitor);
        self.engine.capture(CapturedEvent::new(kind, visitor.into_payload()));
    }
}

fn is_own_target(target: &str) -> bool {
    target == OWN_TARGET
        || target.strip_prefix(OWN_TARGET).map_or(false, |rest| rest.starts_with("::"))
}

#[derive(Default)]
struct PayloadVisitor {
    message: Option<String>,
    fields: Vec<String>,
}

impl PayloadVisitor {
    fn into_payload(self) -> Vec<PayloadValue> {
        self.message.into_iter().chain(self.fields).map(PayloadValue::Text).collect()
    }
}

impl Visit for PayloadVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}
