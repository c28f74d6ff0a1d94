//! Implementations - ports の具体実装
//!
//! - **HeaderAccessor**: 既定の HeaderStore（in-memory staging）

pub mod header_accessor;

pub use self::header_accessor::{HeaderAccessor, simple_match};
