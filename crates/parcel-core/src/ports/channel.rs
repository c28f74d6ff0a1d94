//! MessageChannel port - チャネルの抽象化
//!
//! Channels are implemented outside this crate. The builder only needs to
//! put a handle to one into the reply/error channel headers.

/// A destination that finished messages can be sent to.
pub trait MessageChannel: Send + Sync {
    /// Name the channel is registered under.
    fn name(&self) -> &str;
}
