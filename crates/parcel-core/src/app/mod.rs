//! App - builder とその周辺
//!
//! - **builder**: MessageBuilder（copy-on-write、sequence details の push / pop）

pub mod builder;

pub use self::builder::MessageBuilder;
