//! Resource-load failure adapter.

use crate::engine::{CaptureEngine, Dispatch};
use crate::event::{CaptureKind, CapturedEvent};
use std::fmt;

/// What kind of resource failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Script,
    Link,
    Image,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Script => "script",
            ResourceKind::Link => "link",
            ResourceKind::Image => "image",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report a resource that failed to load.
///
/// `locator` is the resource's address; failures without one are not reportable and return
/// `None`. `descriptor` is the rendered element or manifest entry that referenced it.
/// Payload: `["Resource load error: <kind>", descriptor]`.
pub fn report_resource_error(
    engine: &CaptureEngine,
    kind: ResourceKind,
    locator: &str,
    descriptor: &str,
) -> Option<Dispatch> {
    if locator.is_empty() {
        return None;
    }
    Some(engine.capture(CapturedEvent::new(
        CaptureKind::ResourceLoadError,
        [format!("Resource load error: {}", kind), descriptor.to_string()],
    )))
}
