//! Header values.
//!
//! Headers are open-ended, so values are a small closed set of shapes rather
//! than a type parameter. `Null` only exists as an argument: writing it removes
//! the header, and it appears inside lists (sequence-details frames) to mark a
//! missing element.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ids::MessageId;
use crate::ports::MessageChannel;

/// A single header value.
///
/// Serialized as `{"type": ..., "value": ...}`. `Channel` handles are
/// process-local and are never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum HeaderValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Id(MessageId),
    List(Vec<HeaderValue>),
    Json(serde_json::Value),
    #[serde(skip)]
    Channel(ChannelRef),
}

impl HeaderValue {
    /// JSON `null` counts as null too.
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            HeaderValue::Null | HeaderValue::Json(serde_json::Value::Null)
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HeaderValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<MessageId> {
        match self {
            HeaderValue::Id(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[HeaderValue]> {
        match self {
            HeaderValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            HeaderValue::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_channel(&self) -> Option<&ChannelRef> {
        match self {
            HeaderValue::Channel(c) => Some(c),
            _ => None,
        }
    }
}

impl From<bool> for HeaderValue {
    fn from(value: bool) -> Self {
        HeaderValue::Bool(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        HeaderValue::Int(value)
    }
}

impl From<i32> for HeaderValue {
    fn from(value: i32) -> Self {
        HeaderValue::Int(i64::from(value))
    }
}

impl From<u32> for HeaderValue {
    fn from(value: u32) -> Self {
        HeaderValue::Int(i64::from(value))
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Str(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Str(value)
    }
}

impl From<MessageId> for HeaderValue {
    fn from(value: MessageId) -> Self {
        HeaderValue::Id(value)
    }
}

impl From<Vec<HeaderValue>> for HeaderValue {
    fn from(value: Vec<HeaderValue>) -> Self {
        HeaderValue::List(value)
    }
}

impl From<serde_json::Value> for HeaderValue {
    fn from(value: serde_json::Value) -> Self {
        HeaderValue::Json(value)
    }
}

impl From<ChannelRef> for HeaderValue {
    fn from(value: ChannelRef) -> Self {
        HeaderValue::Channel(value)
    }
}

impl From<&HeaderValue> for HeaderValue {
    fn from(value: &HeaderValue) -> Self {
        value.clone()
    }
}

impl<T: Into<HeaderValue>> From<Option<T>> for HeaderValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(HeaderValue::Null, Into::into)
    }
}

/// Shared handle to a channel, stored in reply/error channel headers.
///
/// Two handles are equal when they point at the same channel instance.
#[derive(Clone)]
pub struct ChannelRef(Arc<dyn MessageChannel>);

impl ChannelRef {
    pub fn new(channel: impl MessageChannel + 'static) -> Self {
        Self(Arc::new(channel))
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn channel(&self) -> &Arc<dyn MessageChannel> {
        &self.0
    }
}

impl From<Arc<dyn MessageChannel>> for ChannelRef {
    fn from(value: Arc<dyn MessageChannel>) -> Self {
        Self(value)
    }
}

impl PartialEq for ChannelRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ChannelRef").field(&self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl MessageChannel for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn none_converts_to_null() {
        let v: HeaderValue = None::<i64>.into();
        assert!(v.is_null());

        let v: HeaderValue = Some("x").into();
        assert_eq!(v.as_str(), Some("x"));
    }

    #[test]
    fn json_null_is_null() {
        assert!(HeaderValue::from(serde_json::Value::Null).is_null());
        assert!(!HeaderValue::from(serde_json::json!(0)).is_null());
    }

    #[test]
    fn serializes_adjacently_tagged() {
        let v = HeaderValue::List(vec![HeaderValue::Int(3), HeaderValue::Null]);
        let json: serde_json::Value = serde_json::to_value(&v).unwrap();

        assert_eq!(json["type"], "List");
        assert_eq!(json["value"][0]["type"], "Int");
        assert_eq!(json["value"][0]["value"], 3);
        assert_eq!(json["value"][1]["type"], "Null");
    }

    #[test]
    fn channel_values_are_not_serializable() {
        let v = HeaderValue::Channel(ChannelRef::new(Named("replies")));
        assert!(serde_json::to_string(&v).is_err());
    }

    #[test]
    fn channel_refs_compare_by_instance() {
        let a = ChannelRef::new(Named("replies"));
        let b = ChannelRef::new(Named("replies"));

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(format!("{:?}", a), "ChannelRef(\"replies\")");
    }
}
