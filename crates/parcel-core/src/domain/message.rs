//! Message model: payload + immutable headers.
//!
//! A `Message` is never mutated after it is built. Derive a new one with
//! `MessageBuilder::from_message` (or `Message::to_builder`).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::headers::MessageHeaders;

/// Whether a message carries a regular payload or a failure.
///
/// Consumers route `Error` messages to failure handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Generic,
    Error,
}

/// Something a message can carry.
///
/// The only question the builder asks of a payload is whether it represents a
/// failure. Most types just opt in with `impl Payload for MyType {}`.
pub trait Payload {
    fn is_failure(&self) -> bool {
        false
    }
}

macro_rules! plain_payload {
    ($($t:ty),* $(,)?) => {
        $(impl Payload for $t {})*
    };
}

plain_payload!(
    (),
    bool,
    i32,
    i64,
    u32,
    u64,
    f64,
    String,
    &'static str,
    Vec<u8>,
    serde_json::Value,
);

impl<T: Payload + ?Sized> Payload for Box<T> {
    fn is_failure(&self) -> bool {
        (**self).is_failure()
    }
}

impl<T: Payload + ?Sized> Payload for Arc<T> {
    fn is_failure(&self) -> bool {
        (**self).is_failure()
    }
}

/// A failure carried as a payload. Building a message around one yields
/// `MessageKind::Error`.
///
/// Equality is identity: two `Failure`s are equal only if they share the same
/// underlying error.
#[derive(Clone)]
pub struct Failure(Arc<dyn std::error::Error + Send + Sync>);

impl Failure {
    pub fn new(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(error))
    }

    pub fn error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.0.as_ref()
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Failure {
    fn from(error: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self(Arc::from(error))
    }
}

impl Payload for Failure {
    fn is_failure(&self) -> bool {
        true
    }
}

impl PartialEq for Failure {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Failure").field(&self.0).finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An immutable payload + headers bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message<T> {
    payload: T,
    headers: MessageHeaders,
    kind: MessageKind,
}

impl<T> Message<T> {
    pub(crate) fn new(payload: T, headers: MessageHeaders, kind: MessageKind) -> Self {
        Self {
            payload,
            headers,
            kind,
        }
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn headers(&self) -> &MessageHeaders {
        &self.headers
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn is_error(&self) -> bool {
        self.kind == MessageKind::Error
    }

    pub fn into_payload(self) -> T {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("disk full")]
    struct DiskFull;

    #[test]
    fn only_failures_are_failures() {
        assert!(!"hello".is_failure());
        assert!(!serde_json::json!({"a": 1}).is_failure());
        assert!(Failure::new(DiskFull).is_failure());
        assert!(Arc::new(Failure::new(DiskFull)).is_failure());
    }

    #[test]
    fn failure_equality_is_identity() {
        let a = Failure::new(DiskFull);
        let b = Failure::new(DiskFull);

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "disk full");
    }

    #[test]
    fn message_kind_serializes_as_upper_case() {
        let s = serde_json::to_string(&MessageKind::Error).unwrap();
        assert_eq!(s, "\"ERROR\"");
    }
}
