//! Well-known header names and the immutable header map.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::header_value::HeaderValue;
use super::ids::MessageId;
use super::sequence::{self, SequenceFrame};
use crate::error::Result;

/// Message identity. Reserved.
pub const ID: &str = "id";

/// Creation time in epoch milliseconds. Reserved.
pub const TIMESTAMP: &str = "timestamp";

pub const CORRELATION_ID: &str = "correlationId";

pub const SEQUENCE_NUMBER: &str = "sequenceNumber";

pub const SEQUENCE_SIZE: &str = "sequenceSize";

/// Stack of saved `[correlationId, sequenceNumber, sequenceSize]` frames.
pub const SEQUENCE_DETAILS: &str = "sequenceDetails";

pub const REPLY_CHANNEL: &str = "replyChannel";

pub const ERROR_CHANNEL: &str = "errorChannel";

/// Expiration time in epoch milliseconds.
pub const EXPIRATION_DATE: &str = "expirationDate";

pub const PRIORITY: &str = "priority";

/// Headers only the header store may write.
pub const RESERVED: [&str; 2] = [ID, TIMESTAMP];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

/// Immutable headers of a finalized message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHeaders(BTreeMap<String, HeaderValue>);

impl MessageHeaders {
    /// Wrap an already materialized map. Header stores call this from
    /// `HeaderStore::materialize`.
    pub fn from_map(map: BTreeMap<String, HeaderValue>) -> Self {
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.0.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HeaderValue)> {
        self.0.iter()
    }

    pub fn id(&self) -> Option<MessageId> {
        self.get(ID).and_then(HeaderValue::as_id)
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.get(TIMESTAMP).and_then(HeaderValue::as_i64)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp().and_then(DateTime::from_timestamp_millis)
    }

    pub fn correlation_id(&self) -> Option<&HeaderValue> {
        self.get(CORRELATION_ID)
    }

    pub fn sequence_number(&self) -> Option<i64> {
        self.get(SEQUENCE_NUMBER).and_then(HeaderValue::as_i64)
    }

    pub fn sequence_size(&self) -> Option<i64> {
        self.get(SEQUENCE_SIZE).and_then(HeaderValue::as_i64)
    }

    /// Saved frames, outermost first. Empty when the header is absent.
    pub fn sequence_details(&self) -> Result<Vec<SequenceFrame>> {
        match self.get(SEQUENCE_DETAILS) {
            Some(stack) => sequence::frames(stack),
            None => Ok(Vec::new()),
        }
    }

    pub fn priority(&self) -> Option<i64> {
        self.get(PRIORITY).and_then(HeaderValue::as_i64)
    }

    pub fn expiration_date(&self) -> Option<i64> {
        self.get(EXPIRATION_DATE).and_then(HeaderValue::as_i64)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiration_date()
            .and_then(DateTime::from_timestamp_millis)
    }

    /// Either a `Channel` handle or a channel name.
    pub fn reply_channel(&self) -> Option<&HeaderValue> {
        self.get(REPLY_CHANNEL)
    }

    /// Either a `Channel` handle or a channel name.
    pub fn error_channel(&self) -> Option<&HeaderValue> {
        self.get(ERROR_CHANNEL)
    }
}

impl<'a> IntoIterator for &'a MessageHeaders {
    type Item = (&'a String, &'a HeaderValue);
    type IntoIter = std::collections::btree_map::Iter<'a, String, HeaderValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(entries: &[(&str, HeaderValue)]) -> MessageHeaders {
        MessageHeaders::from_map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn typed_getters_read_well_known_keys() {
        let h = headers(&[
            (TIMESTAMP, HeaderValue::Int(1_704_110_400_000)),
            (CORRELATION_ID, "order-1".into()),
            (SEQUENCE_NUMBER, HeaderValue::Int(2)),
            (SEQUENCE_SIZE, HeaderValue::Int(5)),
            (PRIORITY, HeaderValue::Int(9)),
        ]);

        assert_eq!(h.correlation_id().and_then(HeaderValue::as_str), Some("order-1"));
        assert_eq!(h.sequence_number(), Some(2));
        assert_eq!(h.sequence_size(), Some(5));
        assert_eq!(h.priority(), Some(9));
        assert_eq!(
            h.created_at().map(|t| t.to_rfc3339()),
            Some("2024-01-01T12:00:00+00:00".to_string())
        );
        assert!(h.id().is_none());
    }

    #[test]
    fn wrongly_typed_values_read_as_absent() {
        let h = headers(&[(SEQUENCE_NUMBER, "two".into())]);
        assert_eq!(h.sequence_number(), None);
    }

    #[test]
    fn missing_sequence_details_is_an_empty_stack() {
        assert!(MessageHeaders::default().sequence_details().unwrap().is_empty());
    }

    #[test]
    fn reserved_names() {
        assert!(is_reserved(ID));
        assert!(is_reserved(TIMESTAMP));
        assert!(!is_reserved(CORRELATION_ID));
    }

    #[test]
    fn serializes_as_plain_object() {
        let h = headers(&[(PRIORITY, HeaderValue::Int(1))]);
        let json = serde_json::to_value(&h).unwrap();
        assert_eq!(json, serde_json::json!({"priority": {"type": "Int", "value": 1}}));
    }
}
