//! Human-readable rendering of payloads.
//!
//! Semantics:
//! - A sequence is rendered element by element and joined with `\n`, preserving order.
//! - Error-like values render as `Message:<message>` / `Stack:<stack>` lines, with
//!   `(no message)` / `(no stack trace)` placeholders.
//! - Structured values render as indented JSON, falling back to their default string
//!   conversion when serialization fails. A nested sequence counts as a structured value.
//! - Primitives use their plain string form.
//!
//! Invariants:
//! - Formatting never panics outward. A failure while rendering one element is replaced by
//!   `Error while formatting message: <reason>` and its siblings are still rendered.

use crate::error::panic_message;
use crate::payload::{ErrorDetails, PayloadValue};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Render a single payload element, or every element of a top-level sequence.
pub fn format_value(value: &PayloadValue) -> String {
    match value {
        PayloadValue::List(items) => format_messages(items),
        other => format_single(other),
    }
}

/// Render an ordered payload, one element per line group.
pub fn format_messages(values: &[PayloadValue]) -> String {
    values.iter().map(format_single).collect::<Vec<_>>().join("\n")
}

fn format_single(value: &PayloadValue) -> String {
    catch_unwind(AssertUnwindSafe(|| render(value))).unwrap_or_else(|panic| {
        format!("Error while formatting message: {}", panic_message(panic.as_ref()))
    })
}

fn render(value: &PayloadValue) -> String {
    match value {
        PayloadValue::Error(details) => render_error(details),
        PayloadValue::Structured(structured) => match structured.to_json() {
            Ok(json) => {
                serde_json::to_string_pretty(&json).unwrap_or_else(|_| structured.describe())
            }
            Err(_) => structured.describe(),
        },
        PayloadValue::List(_) => match value.to_json() {
            Ok(json) => {
                serde_json::to_string_pretty(&json).unwrap_or_else(|_| format!("{:?}", value))
            }
            Err(_) => format!("{:?}", value),
        },
        PayloadValue::Null => "null".to_string(),
        PayloadValue::Bool(b) => b.to_string(),
        PayloadValue::Int(n) => n.to_string(),
        PayloadValue::Float(n) => n.to_string(),
        PayloadValue::Text(s) => s.clone(),
    }
}

fn render_error(details: &ErrorDetails) -> String {
    let message = details.message.as_deref().unwrap_or("(no message)");
    let stack = details.stack.as_deref().unwrap_or("(no stack trace)");
    format!("Message:{}\nStack:{}", message, stack)
}
