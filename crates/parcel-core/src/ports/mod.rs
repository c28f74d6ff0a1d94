//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は builder の外側にある協調者（header storage, 時刻, ID 生成, チャネル）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod channel;
pub mod clock;
pub mod header_store;
pub mod id_generator;

// 主要な trait を再エクスポート
pub use self::channel::MessageChannel;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::header_store::HeaderStore;
pub use self::id_generator::{IdGenerator, UlidGenerator};
