//! MessageBuilder - copy-on-write な Message の構築
//!
//! # 学習ポイント
//! - Builder パターン（`self` を消費して `Self` を返す）
//! - 何も変えていなければ元の `Arc<Message<T>>` をそのまま返す
//! - sequence details の push / pop で入れ子の split / aggregate を表現

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::domain::headers::{
    CORRELATION_ID, ERROR_CHANNEL, EXPIRATION_DATE, PRIORITY, REPLY_CHANNEL, SEQUENCE_DETAILS,
    SEQUENCE_NUMBER, SEQUENCE_SIZE,
};
use crate::domain::sequence::{self, SequenceFrame};
use crate::domain::{ChannelRef, HeaderValue, Message, MessageKind, Payload};
use crate::error::Result;
use crate::impls::HeaderAccessor;
use crate::ports::HeaderStore;

/// Builds a new `Message` from a payload, or derives one from an existing
/// message.
///
/// # 使用例
/// ```ignore
/// let message = MessageBuilder::with_payload("hello")
///     .set_correlation_id("order-42")
///     .set_priority(5)
///     .build();
///
/// let same = MessageBuilder::from_message(&message).build();
/// assert!(Arc::ptr_eq(&message, &same));
/// ```
///
/// A builder is consumed by `build()`. It can be moved to another thread
/// before that; the header store's modified flag is published with
/// release/acquire ordering.
pub struct MessageBuilder<T, S = HeaderAccessor> {
    payload: T,
    original: Option<Arc<Message<T>>>,
    headers: S,
    payload_changed: bool,
}

impl<T: Payload + PartialEq> MessageBuilder<T, HeaderAccessor> {
    /// Start a message with no headers besides the ones stamped on `build()`.
    pub fn with_payload(payload: T) -> Self {
        Self::with_store(payload, None, HeaderAccessor::new(None))
    }

    /// Seed headers from `message` but carry `payload` instead of its payload.
    pub fn from_message_with_payload(message: &Arc<Message<T>>, payload: T) -> Self {
        let headers = HeaderAccessor::new(Some(message.headers()));
        Self::with_store(payload, Some(Arc::clone(message)), headers)
    }
}

impl<T: Payload + PartialEq + Clone> MessageBuilder<T, HeaderAccessor> {
    /// Derive from `message`. Without any effective change, `build()` returns
    /// `message` itself.
    pub fn from_message(message: &Arc<Message<T>>) -> Self {
        Self::from_message_with_payload(message, message.payload().clone())
    }
}

impl<T: Payload + PartialEq, S: HeaderStore> MessageBuilder<T, S> {
    /// Build on top of any `HeaderStore`.
    ///
    /// `headers` must already be seeded from `original` when one is given.
    /// Whether the payload changed is decided here, once, by `PartialEq`.
    pub fn with_store(payload: T, original: Option<Arc<Message<T>>>, headers: S) -> Self {
        let payload_changed = original
            .as_ref()
            .is_some_and(|original| original.payload() != &payload);

        Self {
            payload,
            original,
            headers,
            payload_changed,
        }
    }

    /// `HeaderValue::Null` removes the header.
    pub fn set_header(mut self, name: &str, value: impl Into<HeaderValue>) -> Self {
        self.headers.set(name, value.into());
        self
    }

    pub fn set_header_if_absent(mut self, name: &str, value: impl Into<HeaderValue>) -> Self {
        self.headers.set_if_absent(name, value.into());
        self
    }

    pub fn remove_header(mut self, name: &str) -> Self {
        self.headers.remove(name);
        self
    }

    /// Remove every header matching one of `patterns` (`foo*`, `*bar`,
    /// `*mid*`, `a*z`, or an exact name).
    pub fn remove_headers(mut self, patterns: &[&str]) -> Self {
        self.headers.remove_matching(patterns);
        self
    }

    /// Overwrites existing headers, except the reserved `id` and `timestamp`.
    pub fn copy_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<HeaderValue>,
    {
        self.headers.copy_from(
            headers.into_iter().map(|(k, v)| (k.into(), v.into())),
            true,
        );
        self
    }

    pub fn copy_headers_if_absent<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<HeaderValue>,
    {
        self.headers.copy_from(
            headers.into_iter().map(|(k, v)| (k.into(), v.into())),
            false,
        );
        self
    }

    pub fn set_correlation_id(self, correlation_id: impl Into<HeaderValue>) -> Self {
        self.set_header(CORRELATION_ID, correlation_id)
    }

    pub fn set_sequence_number(self, sequence_number: i64) -> Self {
        self.set_header(SEQUENCE_NUMBER, sequence_number)
    }

    pub fn set_sequence_size(self, sequence_size: i64) -> Self {
        self.set_header(SEQUENCE_SIZE, sequence_size)
    }

    pub fn set_priority(self, priority: i64) -> Self {
        self.set_header(PRIORITY, priority)
    }

    pub fn set_reply_channel(self, channel: ChannelRef) -> Self {
        self.set_header(REPLY_CHANNEL, channel)
    }

    pub fn set_reply_channel_name(self, name: impl Into<String>) -> Self {
        self.set_header(REPLY_CHANNEL, name.into())
    }

    pub fn set_error_channel(self, channel: ChannelRef) -> Self {
        self.set_header(ERROR_CHANNEL, channel)
    }

    pub fn set_error_channel_name(self, name: impl Into<String>) -> Self {
        self.set_header(ERROR_CHANNEL, name.into())
    }

    /// Expiration as epoch milliseconds.
    pub fn set_expiration_date(self, epoch_millis: i64) -> Self {
        self.set_header(EXPIRATION_DATE, epoch_millis)
    }

    /// `None` removes the expiration.
    pub fn set_expiration_date_at(self, at: Option<DateTime<Utc>>) -> Self {
        self.set_header(EXPIRATION_DATE, at.map(|at| at.timestamp_millis()))
    }

    /// Save the current correlation context and replace it.
    ///
    /// Number and size are saved as stored, not as decoded integers.
    /// Nothing is saved if no correlation id is set yet; the new values are
    /// written either way.
    pub fn push_sequence_details(
        mut self,
        correlation_id: impl Into<HeaderValue>,
        sequence_number: i64,
        sequence_size: i64,
    ) -> Result<Self> {
        if let Some(current) = self.headers.get(CORRELATION_ID).cloned() {
            let stored = |name: &str| self.headers.get(name).cloned().unwrap_or(HeaderValue::Null);
            let frame =
                SequenceFrame::saved(current, stored(SEQUENCE_NUMBER), stored(SEQUENCE_SIZE));
            let stack = sequence::push(self.headers.get(SEQUENCE_DETAILS), &frame)?;
            debug!(depth = sequence::depth(Some(&stack)), "pushed sequence details");
            self.headers.set(SEQUENCE_DETAILS, stack);
        }

        Ok(self
            .set_correlation_id(correlation_id)
            .set_sequence_number(sequence_number)
            .set_sequence_size(sequence_size))
    }

    /// Restore the correlation context saved by the matching push.
    ///
    /// No-op when nothing was pushed. Number and size are only restored when
    /// the frame has them.
    pub fn pop_sequence_details(mut self) -> Result<Self> {
        let Some(stack) = self.headers.get(SEQUENCE_DETAILS) else {
            return Ok(self);
        };
        let popped = sequence::pop(stack)?;
        debug!(
            depth = sequence::depth(popped.remaining.as_ref()),
            "popped sequence details"
        );

        let frame = popped.frame;
        self.headers.set(CORRELATION_ID, frame.correlation_id);
        if !frame.sequence_number.is_null() {
            self.headers.set(SEQUENCE_NUMBER, frame.sequence_number);
        }
        if !frame.sequence_size.is_null() {
            self.headers.set(SEQUENCE_SIZE, frame.sequence_size);
        }

        match popped.remaining {
            Some(rest) => self.headers.set(SEQUENCE_DETAILS, rest),
            None => self.headers.remove(SEQUENCE_DETAILS),
        }
        Ok(self)
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    pub fn correlation_id(&self) -> Option<&HeaderValue> {
        self.headers.get(CORRELATION_ID)
    }

    pub fn sequence_number(&self) -> Option<i64> {
        self.headers.get(SEQUENCE_NUMBER).and_then(HeaderValue::as_i64)
    }

    pub fn sequence_size(&self) -> Option<i64> {
        self.headers.get(SEQUENCE_SIZE).and_then(HeaderValue::as_i64)
    }

    /// Number of saved correlation contexts.
    pub fn sequence_depth(&self) -> usize {
        sequence::depth(self.headers.get(SEQUENCE_DETAILS))
    }

    /// True if `build()` would create a new message.
    pub fn is_modified(&self) -> bool {
        self.original.is_none() || self.payload_changed || self.headers.is_modified()
    }

    /// Finish the message.
    ///
    /// # 判定順序
    /// 1. 元の message があり、payload も headers も変わっていない → 元の `Arc` をそのまま返す
    /// 2. payload が failure → `MessageKind::Error`
    /// 3. それ以外 → `MessageKind::Generic`
    pub fn build(self) -> Arc<Message<T>> {
        if let Some(original) = self.original
            && !self.payload_changed
            && !self.headers.is_modified()
        {
            trace!(id = ?original.headers().id(), "no changes, reusing original message");
            return original;
        }

        let kind = if self.payload.is_failure() {
            MessageKind::Error
        } else {
            MessageKind::Generic
        };
        Arc::new(Message::new(self.payload, self.headers.materialize(), kind))
    }
}

impl<T: Payload + PartialEq + Clone> Message<T> {
    /// Shorthand for `MessageBuilder::from_message(self)`.
    pub fn to_builder(self: &Arc<Self>) -> MessageBuilder<T> {
        MessageBuilder::from_message(self)
    }
}
