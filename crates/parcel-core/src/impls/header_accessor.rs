//! HeaderAccessor - 既定の HeaderStore 実装
//!
//! # 実装詳細
//! - BTreeMap で staged headers を保持（予約キー `id` / `timestamp` は保持しない）
//! - 実際に値が変わったときだけ modified を立てる
//! - modified は AtomicBool（別スレッドで build() しても正しく見える）
//! - materialize() で新しい `id` と `timestamp` を付与

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::domain::headers::{self, ID, TIMESTAMP};
use crate::domain::{HeaderValue, MessageHeaders};
use crate::ports::{Clock, HeaderStore, IdGenerator, SystemClock, UlidGenerator};

pub struct HeaderAccessor {
    headers: BTreeMap<String, HeaderValue>,
    modified: AtomicBool,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl HeaderAccessor {
    /// Stage a copy of `seed` (if any), stamping with the system clock.
    pub fn new(seed: Option<&MessageHeaders>) -> Self {
        Self::with_sources(
            seed,
            Arc::new(UlidGenerator::new(SystemClock)),
            Arc::new(SystemClock),
        )
    }

    /// Same as `new`, with explicit id and timestamp sources.
    ///
    /// # 使用例
    /// ```ignore
    /// let clock = FixedClock::new(at);
    /// let store = HeaderAccessor::with_sources(None, Arc::new(UlidGenerator::new(clock)), Arc::new(clock));
    /// ```
    pub fn with_sources(
        seed: Option<&MessageHeaders>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let headers = seed
            .map(|seed| {
                seed.iter()
                    .filter(|(name, _)| !headers::is_reserved(name))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            headers,
            modified: AtomicBool::new(false),
            ids,
            clock,
        }
    }

    fn mark_modified(&self) {
        self.modified.store(true, Ordering::Release);
    }

    fn guard_reserved(name: &str) -> bool {
        if headers::is_reserved(name) {
            debug!(header = name, "ignoring write to reserved header");
            return true;
        }
        false
    }
}

impl HeaderStore for HeaderAccessor {
    fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    fn set(&mut self, name: &str, value: HeaderValue) {
        if Self::guard_reserved(name) {
            return;
        }
        if value.is_null() {
            self.remove(name);
            return;
        }
        if self.headers.get(name) != Some(&value) {
            self.headers.insert(name.to_string(), value);
            self.mark_modified();
        }
    }

    fn set_if_absent(&mut self, name: &str, value: HeaderValue) {
        if Self::guard_reserved(name) || value.is_null() || self.headers.contains_key(name) {
            return;
        }
        self.headers.insert(name.to_string(), value);
        self.mark_modified();
    }

    fn remove(&mut self, name: &str) {
        if self.headers.remove(name).is_some() {
            self.mark_modified();
        }
    }

    fn remove_matching(&mut self, patterns: &[&str]) {
        let before = self.headers.len();
        self.headers
            .retain(|name, _| !patterns.iter().any(|pattern| simple_match(pattern, name)));
        if self.headers.len() != before {
            self.mark_modified();
        }
    }

    fn copy_from<I>(&mut self, headers: I, overwrite: bool)
    where
        I: IntoIterator<Item = (String, HeaderValue)>,
    {
        for (name, value) in headers {
            if overwrite {
                self.set(&name, value);
            } else {
                self.set_if_absent(&name, value);
            }
        }
    }

    fn is_modified(&self) -> bool {
        self.modified.load(Ordering::Acquire)
    }

    fn materialize(self) -> MessageHeaders {
        let mut map = self.headers;
        map.insert(ID.to_string(), HeaderValue::Id(self.ids.generate_message_id()));
        map.insert(
            TIMESTAMP.to_string(),
            HeaderValue::Int(self.clock.now().timestamp_millis()),
        );
        MessageHeaders::from_map(map)
    }
}

impl fmt::Debug for HeaderAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderAccessor")
            .field("headers", &self.headers)
            .field("modified", &self.is_modified())
            .finish_non_exhaustive()
    }
}

/// `*` matches any run of characters (including none); a pattern without `*`
/// must equal `name`.
pub fn simple_match(pattern: &str, name: &str) -> bool {
    let Some(first) = pattern.find('*') else {
        return pattern == name;
    };

    if first > 0 {
        let prefix = &pattern[..first];
        return name.starts_with(prefix) && simple_match(&pattern[first..], &name[first..]);
    }

    let rest = &pattern[1..];
    let Some(next) = rest.find('*') else {
        return name.ends_with(rest);
    };
    if next == 0 {
        return simple_match(rest, name);
    }

    let part = &rest[..next];
    let tail = &rest[next..];
    let step = part.chars().next().map_or(1, char::len_utf8);
    let mut start = 0;
    while let Some(offset) = name[start..].find(part) {
        let at = start + offset;
        if simple_match(tail, &name[at + part.len()..]) {
            return true;
        }
        start = at + step;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn seed(entries: &[(&str, HeaderValue)]) -> MessageHeaders {
        MessageHeaders::from_map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[rstest]
    #[case::prefix("foo*", "foo1", true)]
    #[case::prefix_miss("foo*", "xfoo", false)]
    #[case::suffix("*bar", "xbar", true)]
    #[case::suffix_miss("*bar", "barx", false)]
    #[case::substring("*mid*", "amidb", true)]
    #[case::substring_miss("*mid*", "mxd", false)]
    #[case::prefix_and_suffix("a*z", "abcz", true)]
    #[case::prefix_and_suffix_miss("a*z", "abcy", false)]
    #[case::exact("baz", "baz", true)]
    #[case::exact_miss("baz", "bazz", false)]
    #[case::everything("*", "anything", true)]
    #[case::double_star("**x", "ax", true)]
    #[case::overlap("*aa*b", "aaab", true)]
    #[case::multibyte("*é*", "café-au-lait", true)]
    fn wildcard_shapes(#[case] pattern: &str, #[case] name: &str, #[case] expected: bool) {
        assert_eq!(simple_match(pattern, name), expected);
    }

    #[test]
    fn seeding_drops_reserved_headers_and_is_unmodified() {
        let store = HeaderAccessor::new(Some(&seed(&[
            (ID, HeaderValue::Str("old".to_string())),
            (TIMESTAMP, HeaderValue::Int(1)),
            ("foo", HeaderValue::Int(1)),
        ])));

        assert!(store.get(ID).is_none());
        assert!(store.get(TIMESTAMP).is_none());
        assert_eq!(store.get("foo"), Some(&HeaderValue::Int(1)));
        assert!(!store.is_modified());
    }

    #[test]
    fn writing_an_equal_value_is_not_a_modification() {
        let mut store = HeaderAccessor::new(Some(&seed(&[("foo", HeaderValue::Int(1))])));

        store.set("foo", HeaderValue::Int(1));
        store.remove("missing");
        store.set_if_absent("foo", HeaderValue::Int(2));
        store.remove_matching(&["nothing*"]);
        assert!(!store.is_modified());

        store.set("foo", HeaderValue::Int(2));
        assert!(store.is_modified());
    }

    #[test]
    fn null_removes() {
        let mut store = HeaderAccessor::new(Some(&seed(&[("foo", HeaderValue::Int(1))])));

        store.set("foo", HeaderValue::Null);
        assert!(store.get("foo").is_none());
        assert!(store.is_modified());
    }

    #[test]
    fn reserved_headers_cannot_be_written() {
        let mut store = HeaderAccessor::new(None);

        store.set(ID, HeaderValue::Str("mine".to_string()));
        store.set_if_absent(TIMESTAMP, HeaderValue::Int(0));
        store.copy_from(vec![(ID.to_string(), HeaderValue::Int(7))], true);

        assert!(store.get(ID).is_none());
        assert!(store.get(TIMESTAMP).is_none());
        assert!(!store.is_modified());
    }

    #[test]
    fn copy_from_respects_overwrite_flag() {
        let mut store = HeaderAccessor::new(Some(&seed(&[("a", HeaderValue::Int(1))])));
        let incoming = || {
            vec![
                ("a".to_string(), HeaderValue::Int(10)),
                ("b".to_string(), HeaderValue::Int(20)),
            ]
        };

        store.copy_from(incoming(), false);
        assert_eq!(store.get("a"), Some(&HeaderValue::Int(1)));
        assert_eq!(store.get("b"), Some(&HeaderValue::Int(20)));

        store.copy_from(incoming(), true);
        assert_eq!(store.get("a"), Some(&HeaderValue::Int(10)));
    }

    #[test]
    fn materialize_stamps_id_and_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = FixedClock::new(at);
        let store = HeaderAccessor::with_sources(
            Some(&seed(&[("foo", HeaderValue::Int(1))])),
            Arc::new(UlidGenerator::new(clock)),
            Arc::new(clock),
        );

        let headers = store.materialize();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.timestamp(), Some(at.timestamp_millis()));
        assert_eq!(
            headers.id().map(|id| id.timestamp_ms()),
            Some(at.timestamp_millis() as u64)
        );
    }

    #[test]
    fn modified_flag_is_visible_from_another_thread() {
        let mut store = HeaderAccessor::new(None);
        store.set("foo", HeaderValue::Bool(true));

        let seen = std::thread::spawn(move || store.is_modified()).join().unwrap();
        assert!(seen);
    }
}
