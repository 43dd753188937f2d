//! Local tag-identity cache with push deduplication.
//!
//! Maps a local topic name to its remote tag identity plus the last
//! successfully pushed sample. The dedup check is an explicit two-step
//! compare-then-commit: [`TagCache::needs_push`] is a pure comparison and
//! [`TagCache::record_push`] commits, so a caller that ends up not
//! pushing (pause, disconnect) leaves the cache untouched.

use std::collections::HashMap;

use crate::model::{Sample, Tag};

#[derive(Debug)]
struct CacheEntry {
    tag: Tag,
    last_pushed: Option<Sample>,
}

/// Per-topic registry of remote tag identities and last-pushed samples.
///
/// Entries are created on first sight of a topic and never removed
/// during normal operation; removal happens only through the explicit
/// administrative path in the bridge.
#[derive(Debug, Default)]
pub struct TagCache {
    entries: HashMap<String, CacheEntry>,
}

impl TagCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the registered tag for a topic. O(1), no side effects.
    pub fn resolve(&self, topic: &str) -> Option<&Tag> {
        self.entries.get(topic).map(|entry| &entry.tag)
    }

    /// Insert a freshly registered tag, keyed by its topic.
    pub fn insert(&mut self, tag: Tag) {
        self.entries.insert(
            tag.topic.clone(),
            CacheEntry {
                tag,
                last_pushed: None,
            },
        );
    }

    /// Drop a topic's entry (administrative tag removal only).
    pub fn remove(&mut self, topic: &str) -> Option<Tag> {
        self.entries.remove(topic).map(|entry| entry.tag)
    }

    /// Whether this sample differs from the last pushed one.
    ///
    /// Returns `false` iff value, quality, and timestamp are all equal
    /// to the last recorded push for the topic. Unknown topics and
    /// never-pushed tags always need a push. Pure comparison -- call
    /// [`record_push`](Self::record_push) to commit after a successful send.
    pub fn needs_push(&self, topic: &str, sample: &Sample) -> bool {
        match self.entries.get(topic) {
            Some(CacheEntry {
                last_pushed: Some(last),
                ..
            }) => last != sample,
            _ => true,
        }
    }

    /// Record a successfully pushed sample for the topic.
    pub fn record_push(&mut self, topic: &str, sample: Sample) {
        if let Some(entry) = self.entries.get_mut(topic) {
            entry.last_pushed = Some(sample);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn tag(topic: &str) -> Tag {
        Tag {
            id: 42,
            server_id: 1,
            topic: topic.into(),
            asset_code: String::new(),
            data_type: String::new(),
        }
    }

    fn sample(value: f64, quality: &str, secs: i64) -> Sample {
        Sample::new(
            json!(value),
            quality,
            Utc.timestamp_opt(secs, 0).single().unwrap(),
        )
    }

    #[test]
    fn resolve_unknown_topic_is_none() {
        let cache = TagCache::new();
        assert!(cache.resolve("Line1.Temp").is_none());
    }

    #[test]
    fn insert_then_resolve() {
        let mut cache = TagCache::new();
        cache.insert(tag("Line1.Temp"));

        let resolved = cache.resolve("Line1.Temp").unwrap();
        assert_eq!(resolved.id, 42);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn unknown_topic_always_needs_push() {
        let cache = TagCache::new();
        assert!(cache.needs_push("Line1.Temp", &sample(72.5, "Good", 0)));
    }

    #[test]
    fn never_pushed_tag_needs_push() {
        let mut cache = TagCache::new();
        cache.insert(tag("Line1.Temp"));
        assert!(cache.needs_push("Line1.Temp", &sample(72.5, "Good", 0)));
    }

    #[test]
    fn identical_sample_is_suppressed() {
        let mut cache = TagCache::new();
        cache.insert(tag("Line1.Temp"));
        cache.record_push("Line1.Temp", sample(72.5, "Good", 0));

        assert!(!cache.needs_push("Line1.Temp", &sample(72.5, "Good", 0)));
    }

    #[test]
    fn any_field_change_needs_push() {
        let mut cache = TagCache::new();
        cache.insert(tag("Line1.Temp"));
        cache.record_push("Line1.Temp", sample(72.5, "Good", 0));

        assert!(cache.needs_push("Line1.Temp", &sample(72.6, "Good", 0)));
        assert!(cache.needs_push("Line1.Temp", &sample(72.5, "Bad", 0)));
        assert!(cache.needs_push("Line1.Temp", &sample(72.5, "Good", 1)));
    }

    #[test]
    fn needs_push_does_not_mutate() {
        let mut cache = TagCache::new();
        cache.insert(tag("Line1.Temp"));
        cache.record_push("Line1.Temp", sample(72.5, "Good", 0));

        // Comparing against a different sample must not commit it.
        assert!(cache.needs_push("Line1.Temp", &sample(73.0, "Good", 0)));
        assert!(!cache.needs_push("Line1.Temp", &sample(72.5, "Good", 0)));
    }

    #[test]
    fn remove_drops_the_entry() {
        let mut cache = TagCache::new();
        cache.insert(tag("Line1.Temp"));

        let removed = cache.remove("Line1.Temp").unwrap();
        assert_eq!(removed.id, 42);
        assert!(cache.resolve("Line1.Temp").is_none());
        assert!(cache.is_empty());
    }
}
