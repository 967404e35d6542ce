//! Payload values carried by captured events.
//!
//! Adapters describe a failure as an ordered list of [`PayloadValue`]s. The engine treats the
//! list opaquely except when fingerprinting it; the formatter is the only place that looks at
//! the individual variants.

use serde::Serialize;
use serde_json::{json, Value};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// A structured, non-error value that can be rendered as JSON.
///
/// `to_json` may fail (cyclic graphs, maps with non-string keys, custom serializers that
/// refuse); callers then fall back to `describe`.
pub trait StructuredValue: fmt::Debug + Send + Sync {
    /// Serialize into a JSON tree.
    fn to_json(&self) -> Result<Value, serde_json::Error>;

    /// Default string conversion used when serialization fails.
    fn describe(&self) -> String {
        format!("{:?}", self)
    }
}

struct Serialized<T>(T);

impl<T: fmt::Debug> fmt::Debug for Serialized<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<T> StructuredValue for Serialized<T>
where
    T: Serialize + fmt::Debug + Send + Sync,
{
    fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(&self.0)
    }
}

/// Error-like payload: a message plus an optional stack trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetails {
    /// Short type name of the originating error.
    pub name: String,
    /// Rendered message, if the error had one.
    pub message: Option<String>,
    /// Stack trace or source chain, if one was recorded.
    pub stack: Option<String>,
}

impl ErrorDetails {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), message: Some(message.into()), stack: None }
    }

    /// Describe an error without a stack trace. The source chain, if any, becomes the stack.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        Self {
            name: short_type_name::<E>(),
            message: non_empty(err.to_string()),
            stack: source_chain(err),
        }
    }

    /// Describe an error and record the current backtrace as its stack.
    ///
    /// The backtrace is only present when enabled through `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE`;
    /// otherwise the source chain is used as with [`from_error`](Self::from_error).
    pub fn capture<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let mut details = Self::from_error(err);
        if let Some(trace) = captured_backtrace() {
            details.stack = Some(trace);
        }
        details
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Record the current backtrace as the stack, when backtraces are enabled.
    pub fn with_backtrace(mut self) -> Self {
        if let Some(trace) = captured_backtrace() {
            self.stack = Some(trace);
        }
        self
    }

    pub(crate) fn to_json(&self) -> Value {
        json!({ "name": self.name, "message": self.message, "stack": self.stack })
    }
}

/// One element of a captured event's payload.
#[derive(Clone)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Something that behaves like an error (message + stack).
    Error(ErrorDetails),
    /// Any other structured value.
    Structured(Arc<dyn StructuredValue>),
    /// A nested ordered sequence.
    List(Vec<PayloadValue>),
}

impl PayloadValue {
    /// Wrap any serializable value as a structured payload element.
    pub fn structured<T>(value: T) -> Self
    where
        T: Serialize + fmt::Debug + Send + Sync + 'static,
    {
        PayloadValue::Structured(Arc::new(Serialized(value)))
    }

    /// Describe an error as a payload element.
    pub fn error<E>(err: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        PayloadValue::Error(ErrorDetails::from_error(err))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PayloadValue::Error(_))
    }

    /// Deterministic JSON rendering used for fingerprints and structural formatting.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        Ok(match self {
            PayloadValue::Null => Value::Null,
            PayloadValue::Bool(b) => Value::Bool(*b),
            PayloadValue::Int(n) => Value::from(*n),
            // NaN and infinities have no JSON form
            PayloadValue::Float(n) => {
                serde_json::Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null)
            }
            PayloadValue::Text(s) => Value::String(s.clone()),
            PayloadValue::Error(details) => details.to_json(),
            PayloadValue::Structured(value) => value.to_json()?,
            PayloadValue::List(items) => {
                Value::Array(items.iter().map(PayloadValue::to_json).collect::<Result<_, _>>()?)
            }
        })
    }

    /// Like [`to_json`](Self::to_json), but substitutes the default string conversion for any
    /// element that refuses to serialize or panics while serializing. Never fails and never
    /// panics; an element whose `describe` panics too becomes [`UNDESCRIBABLE`].
    pub(crate) fn to_json_lossy(&self) -> Value {
        match self {
            PayloadValue::Structured(value) => structured_lossy(value.as_ref()),
            PayloadValue::List(items) => {
                Value::Array(items.iter().map(PayloadValue::to_json_lossy).collect())
            }
            other => other.to_json().unwrap_or(Value::Null),
        }
    }
}

impl fmt::Debug for PayloadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadValue::Null => f.write_str("Null"),
            PayloadValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            PayloadValue::Int(n) => f.debug_tuple("Int").field(n).finish(),
            PayloadValue::Float(n) => f.debug_tuple("Float").field(n).finish(),
            PayloadValue::Text(s) => f.debug_tuple("Text").field(s).finish(),
            PayloadValue::Error(d) => f.debug_tuple("Error").field(d).finish(),
            PayloadValue::Structured(v) => f.debug_tuple("Structured").field(v).finish(),
            PayloadValue::List(items) => f.debug_tuple("List").field(items).finish(),
        }
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        PayloadValue::Text(value.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        PayloadValue::Text(value)
    }
}

impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        PayloadValue::Bool(value)
    }
}

impl From<i64> for PayloadValue {
    fn from(value: i64) -> Self {
        PayloadValue::Int(value)
    }
}

impl From<i32> for PayloadValue {
    fn from(value: i32) -> Self {
        PayloadValue::Int(i64::from(value))
    }
}

impl From<u32> for PayloadValue {
    fn from(value: u32) -> Self {
        PayloadValue::Int(i64::from(value))
    }
}

impl From<u16> for PayloadValue {
    fn from(value: u16) -> Self {
        PayloadValue::Int(i64::from(value))
    }
}

impl From<f64> for PayloadValue {
    fn from(value: f64) -> Self {
        PayloadValue::Float(value)
    }
}

impl From<ErrorDetails> for PayloadValue {
    fn from(value: ErrorDetails) -> Self {
        PayloadValue::Error(value)
    }
}

impl From<Vec<PayloadValue>> for PayloadValue {
    fn from(value: Vec<PayloadValue>) -> Self {
        PayloadValue::List(value)
    }
}

impl<T: Into<PayloadValue>> From<Option<T>> for PayloadValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PayloadValue::Null, Into::into)
    }
}

impl From<Value> for PayloadValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => PayloadValue::Null,
            Value::Bool(b) => PayloadValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PayloadValue::Int(i),
                None => n.as_f64().map_or(PayloadValue::Null, PayloadValue::Float),
            },
            Value::String(s) => PayloadValue::Text(s),
            structured @ (Value::Array(_) | Value::Object(_)) => {
                PayloadValue::structured(structured)
            }
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

fn source_chain<E: std::error::Error + ?Sized>(err: &E) -> Option<String> {
    let mut lines = Vec::new();
    let mut current = err.source();
    while let Some(source) = current {
        lines.push(format!("caused by: {}", source));
        current = source.source();
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Stand-in for a structured element that can be neither serialized nor described.
pub(crate) const UNDESCRIBABLE: &str = "<undescribable value>";

fn structured_lossy(value: &dyn StructuredValue) -> Value {
    match catch_unwind(AssertUnwindSafe(|| value.to_json())) {
        Ok(Ok(json)) => json,
        _ => catch_unwind(AssertUnwindSafe(|| value.describe()))
            .map(Value::String)
            .unwrap_or_else(|_| Value::String(UNDESCRIBABLE.to_string())),
    }
}

fn captured_backtrace() -> Option<String> {
    let trace = Backtrace::capture();
    match trace.status() {
        BacktraceStatus::Captured => Some(trace.to_string()),
        _ => None,
    }
}
