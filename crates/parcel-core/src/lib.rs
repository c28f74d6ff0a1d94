//! parcel-core
//!
//! Immutable message envelopes and the builder that derives new ones from old
//! ones.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, header_value, headers, message, sequence）
//! - **ports**: 抽象化レイヤー（HeaderStore, Clock, IdGenerator, MessageChannel）
//! - **impls**: 実装（HeaderAccessor）
//! - **app**: MessageBuilder
//! - **error**: MessageError

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;

pub use app::MessageBuilder;
pub use domain::{
    ChannelRef, Failure, HeaderValue, Message, MessageHeaders, MessageId, MessageKind, Payload,
    SequenceFrame, headers,
};
pub use error::{MessageError, Result};
pub use impls::HeaderAccessor;
pub use ports::{Clock, HeaderStore, IdGenerator, MessageChannel};
