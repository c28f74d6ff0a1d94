//! Sequence-details stack codec.
//!
//! Nested split/aggregate keeps the parent's correlation context in a single
//! header: a list of `[correlationId, sequenceNumber, sequenceSize]` frames,
//! outermost first. Every function here is pure. A new list is returned on each
//! push/pop and the input value is never touched.

use super::header_value::HeaderValue;
use crate::error::{MessageError, Result};

/// One saved correlation context.
///
/// Number and size are kept exactly as they were stored, whatever their
/// shape. `Null` means the header was absent when the frame was saved.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceFrame {
    pub correlation_id: HeaderValue,
    pub sequence_number: HeaderValue,
    pub sequence_size: HeaderValue,
}

impl SequenceFrame {
    pub fn new(
        correlation_id: impl Into<HeaderValue>,
        sequence_number: Option<i64>,
        sequence_size: Option<i64>,
    ) -> Self {
        Self::saved(correlation_id, sequence_number.into(), sequence_size.into())
    }

    /// Frame from raw header values.
    pub fn saved(
        correlation_id: impl Into<HeaderValue>,
        sequence_number: HeaderValue,
        sequence_size: HeaderValue,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            sequence_number,
            sequence_size,
        }
    }

    pub fn number(&self) -> Option<i64> {
        self.sequence_number.as_i64()
    }

    pub fn size(&self) -> Option<i64> {
        self.sequence_size.as_i64()
    }

    /// Encode as a 3-element list.
    pub fn to_value(&self) -> HeaderValue {
        HeaderValue::List(vec![
            self.correlation_id.clone(),
            self.sequence_number.clone(),
            self.sequence_size.clone(),
        ])
    }

    /// A frame is exactly three elements with a non-null correlation id.
    pub fn from_value(value: &HeaderValue) -> Result<Self> {
        let malformed = || MessageError::MalformedSequenceDetails(format!("{value:?}"));

        let items = value.as_list().ok_or_else(malformed)?;
        let [correlation_id, number, size] = items else {
            return Err(malformed());
        };
        if correlation_id.is_null() {
            return Err(malformed());
        }

        Ok(Self::saved(correlation_id.clone(), number.clone(), size.clone()))
    }
}

/// Result of popping the innermost frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Popped {
    pub frame: SequenceFrame,
    /// What is left of the stack, `None` once it is empty.
    pub remaining: Option<HeaderValue>,
}

/// Append `frame` to a copy of `stack` (or to a new stack).
pub fn push(stack: Option<&HeaderValue>, frame: &SequenceFrame) -> Result<HeaderValue> {
    let mut items = match stack {
        Some(stack) => stack_items(stack)?.to_vec(),
        None => Vec::new(),
    };
    items.push(frame.to_value());
    Ok(HeaderValue::List(items))
}

/// Remove the innermost frame from a copy of `stack`.
pub fn pop(stack: &HeaderValue) -> Result<Popped> {
    let mut items = stack_items(stack)?.to_vec();
    let last = items.pop().ok_or_else(|| {
        MessageError::MalformedSequenceDetails("empty sequence details".to_string())
    })?;
    let frame = SequenceFrame::from_value(&last)?;

    let remaining = if items.is_empty() {
        None
    } else {
        Some(HeaderValue::List(items))
    };

    Ok(Popped { frame, remaining })
}

/// Decode every frame, outermost first.
pub fn frames(stack: &HeaderValue) -> Result<Vec<SequenceFrame>> {
    stack_items(stack)?
        .iter()
        .map(SequenceFrame::from_value)
        .collect()
}

/// Number of saved frames without decoding them.
pub fn depth(stack: Option<&HeaderValue>) -> usize {
    stack.and_then(HeaderValue::as_list).map_or(0, <[_]>::len)
}

fn stack_items(stack: &HeaderValue) -> Result<&[HeaderValue]> {
    stack
        .as_list()
        .ok_or_else(|| MessageError::InvalidSequenceDetails(format!("{stack:?}")))
}
