//! Framework error-handler adapter.

use crate::engine::{CaptureEngine, Dispatch};
use crate::event::{CaptureKind, CapturedEvent};
use crate::payload::PayloadValue;

/// Report an error a host framework handed to its error handler, together with the
/// framework's context string (component, lifecycle hook, route, ...).
///
/// Payload: `[error, info]`.
pub fn report_framework_error<E>(engine: &CaptureEngine, error: &E, info: &str) -> Dispatch
where
    E: std::error::Error + ?Sized,
{
    engine.capture(CapturedEvent::new(
        CaptureKind::FrameworkError,
        vec![PayloadValue::error(error), PayloadValue::from(info)],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    #[test]
    fn reports_error_with_context() {
        let sink = MemorySink::new();
        let engine = CaptureEngine::builder().default_sink(sink.clone()).build().unwrap();
        let err = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad template");

        report_framework_error(&engine, &err, "render of <Header>");

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, CaptureKind::FrameworkError);
        assert_eq!(
            events[0].formatted(),
            "Message:bad template\nStack:(no stack trace)\nrender of <Header>"
        );
    }
}
