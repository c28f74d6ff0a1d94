//! Domain model (ids, header values, headers, messages, sequence details).

pub mod header_value;
pub mod headers;
pub mod ids;
pub mod message;
pub mod sequence;

pub use header_value::{ChannelRef, HeaderValue};
pub use headers::MessageHeaders;
pub use ids::MessageId;
pub use message::{Failure, Message, MessageKind, Payload};
pub use sequence::SequenceFrame;
