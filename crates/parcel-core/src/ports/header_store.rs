//! HeaderStore port - ヘッダーのステージング領域
//!
//! `MessageBuilder` は headers をこの trait 経由でのみ操作します。
//! 既定の実装は `impls::HeaderAccessor` です。

use crate::domain::{HeaderValue, MessageHeaders};

/// Mutable staging area for the headers of a message under construction.
///
/// Implementations must:
/// - treat `HeaderValue::Null` written through `set` as a removal
/// - never let `set`, `set_if_absent` or `copy_from` overwrite the reserved
///   `id` and `timestamp` headers
/// - report `is_modified() == true` once any call changed the staged headers
/// - assign `id` and `timestamp` in `materialize`
pub trait HeaderStore {
    fn get(&self, name: &str) -> Option<&HeaderValue>;

    fn set(&mut self, name: &str, value: HeaderValue);

    fn set_if_absent(&mut self, name: &str, value: HeaderValue);

    fn remove(&mut self, name: &str);

    /// Remove every header whose name matches at least one `*` pattern.
    fn remove_matching(&mut self, patterns: &[&str]);

    /// Bulk upsert. With `overwrite == false` only unset keys are written.
    fn copy_from<I>(&mut self, headers: I, overwrite: bool)
    where
        I: IntoIterator<Item = (String, HeaderValue)>;

    fn is_modified(&self) -> bool;

    fn materialize(self) -> MessageHeaders;
}
