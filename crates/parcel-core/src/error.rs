use thiserror::Error;

/// Result type used by the builder and the sequence-details codec.
pub type Result<T> = std::result::Result<T, MessageError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// A popped frame was not `[correlation_id, sequence_number, sequence_size]`.
    #[error("wrong sequence details (not created by MessageBuilder?): {0}")]
    MalformedSequenceDetails(String),

    /// The sequence-details header holds something other than a list of frames.
    #[error("sequence details header is not a list: {0}")]
    InvalidSequenceDetails(String),
}
