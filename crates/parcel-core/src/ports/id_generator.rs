//! IdGenerator port - message id の払い出し
//!
//! `build()` で新しい message を作るたびに 1 つ払い出される。

use crate::domain::ids::MessageId;
use crate::ports::Clock;
use ulid::Ulid;

/// Source of the `id` header stamped on every newly built message.
pub trait IdGenerator: Send + Sync {
    fn generate_message_id(&self) -> MessageId;
}

/// ULID whose time part comes from `C`, so ids sort by creation time.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_message_id(&self) -> MessageId {
        let created_ms = self.clock.now().timestamp_millis() as u64;
        MessageId::from(Ulid::from_parts(created_ms, rand::random()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn messages_built_in_the_same_millisecond_get_distinct_ids() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let ids = UlidGenerator::new(FixedClock::new(at));

        let first = ids.generate_message_id();
        let second = ids.generate_message_id();

        assert_ne!(first, second);
        assert_eq!(first.timestamp_ms(), at.timestamp_millis() as u64);
    }

    #[test]
    fn later_message_sorts_after_earlier_one() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let earlier = UlidGenerator::new(FixedClock::new(at)).generate_message_id();
        let later =
            UlidGenerator::new(FixedClock::new(at + Duration::milliseconds(1))).generate_message_id();

        assert!(earlier < later);
    }
}
