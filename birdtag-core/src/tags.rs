//! Species tag maps and the tag matching engine.
//!
//! A [`TagMap`] maps lowercase species labels to non-negative counts. A
//! [`TagQuery`] maps species to a minimum required count. An item matches a
//! query when every requested species is present with at least the requested
//! count, absent species counting as zero.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Canonical form of a species label: trimmed and lowercased.
///
/// Returns `None` for labels that are empty after trimming.
pub fn normalize_label(label: &str) -> Option<String> {
    let label = label.trim();
    if label.is_empty() {
        None
    } else {
        Some(label.to_lowercase())
    }
}

/// Species label to detected count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, u32>", into = "BTreeMap<String, u32>")]
pub struct TagMap(BTreeMap<String, u32>);

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for a species, zero when absent.
    pub fn get(&self, label: &str) -> u32 {
        normalize_label(label)
            .and_then(|l| self.0.get(&l).copied())
            .unwrap_or(0)
    }

    pub fn contains(&self, label: &str) -> bool {
        normalize_label(label).is_some_and(|l| self.0.contains_key(&l))
    }

    /// Overwrite the count for a species.
    pub fn set(&mut self, label: &str, count: u32) {
        if let Some(label) = normalize_label(label) {
            self.0.insert(label, count);
        }
    }

    /// Add `count` to the existing count (default 0).
    pub fn add(&mut self, label: &str, count: u32) {
        if let Some(label) = normalize_label(label) {
            let entry = self.0.entry(label).or_insert(0);
            *entry = entry.saturating_add(count);
        }
    }

    /// Delete the species entry regardless of its count.
    pub fn remove(&mut self, label: &str) -> Option<u32> {
        normalize_label(label).and_then(|l| self.0.remove(&l))
    }

    /// Keep the larger of the existing and given count.
    pub fn raise_to(&mut self, label: &str, count: u32) {
        if let Some(label) = normalize_label(label) {
            let entry = self.0.entry(label).or_insert(0);
            *entry = (*entry).max(count);
        }
    }

    pub fn labels(&self) -> BTreeSet<String> {
        self.0.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Labels present both here and in `subscribed`, in sorted order.
    pub fn intersecting<'a, I>(&self, subscribed: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let wanted: BTreeSet<&String> = subscribed.into_iter().collect();
        self.0
            .keys()
            .filter(|label| wanted.contains(label))
            .cloned()
            .collect()
    }

    pub fn as_map(&self) -> &BTreeMap<String, u32> {
        &self.0
    }
}

impl From<BTreeMap<String, u32>> for TagMap {
    fn from(map: BTreeMap<String, u32>) -> Self {
        map.into_iter().collect()
    }
}

impl From<TagMap> for BTreeMap<String, u32> {
    fn from(tags: TagMap) -> Self {
        tags.0
    }
}

impl<S: AsRef<str>> FromIterator<(S, u32)> for TagMap {
    fn from_iter<T: IntoIterator<Item = (S, u32)>>(iter: T) -> Self {
        let mut tags = TagMap::new();
        for (label, count) in iter {
            tags.set(label.as_ref(), count);
        }
        tags
    }
}

/// Species label to minimum required count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, u32>", into = "BTreeMap<String, u32>")]
pub struct TagQuery(BTreeMap<String, u32>);

impl TagQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require at least `min_count` of `label`.
    pub fn require(&mut self, label: &str, min_count: u32) {
        if let Some(label) = normalize_label(label) {
            self.0.insert(label, min_count);
        }
    }

    /// Required minimum for a label, if the query names it.
    pub fn get(&self, label: &str) -> Option<u32> {
        normalize_label(label).and_then(|l| self.0.get(&l).copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Superset-threshold match against an item's tags.
    pub fn matches(&self, tags: &TagMap) -> bool {
        self.0.iter().all(|(label, min)| tags.get(label) >= *min)
    }
}

impl From<BTreeMap<String, u32>> for TagQuery {
    fn from(map: BTreeMap<String, u32>) -> Self {
        map.into_iter().collect()
    }
}

impl From<TagQuery> for BTreeMap<String, u32> {
    fn from(query: TagQuery) -> Self {
        query.0
    }
}

impl From<&TagMap> for TagQuery {
    fn from(tags: &TagMap) -> Self {
        tags.iter().collect()
    }
}

impl<S: AsRef<str>> FromIterator<(S, u32)> for TagQuery {
    fn from_iter<T: IntoIterator<Item = (S, u32)>>(iter: T) -> Self {
        let mut query = TagQuery::new();
        for (label, min) in iter {
            query.require(label.as_ref(), min);
        }
        query
    }
}

/// Free-function form of [`TagQuery::matches`].
pub fn matches(tags: &TagMap, query: &TagQuery) -> bool {
    query.matches(tags)
}

/// Manual tag edit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagEdit {
    /// Delete each listed species, whatever its count.
    Remove,
    /// Add the listed counts to the existing ones.
    Add,
}

impl TagEdit {
    /// Apply the edit with the given labels/counts, returning the new tags.
    pub fn apply(&self, tags: &TagMap, edits: &TagMap) -> TagMap {
        let mut updated = tags.clone();
        for (label, count) in edits.iter() {
            match self {
                Self::Add => updated.add(label, count),
                Self::Remove => {
                    updated.remove(label);
                }
            }
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, u32)]) -> TagMap {
        pairs.iter().map(|(l, c)| (*l, *c)).collect()
    }

    #[test]
    fn test_labels_are_normalized() {
        let mut t = TagMap::new();
        t.set("  Crow ", 2);
        t.set("", 5);
        assert_eq!(t.get("crow"), 2);
        assert_eq!(t.get("CROW"), 2);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_match_superset_threshold() {
        let item = tags(&[("pelican", 3), ("duck", 1)]);

        let q: TagQuery = [("pelican", 2)].into_iter().collect();
        assert!(q.matches(&item));

        let q: TagQuery = [("pelican", 2), ("duck", 1)].into_iter().collect();
        assert!(q.matches(&item));

        let q: TagQuery = [("pelican", 4)].into_iter().collect();
        assert!(!q.matches(&item));

        let q: TagQuery = [("heron", 1)].into_iter().collect();
        assert!(!q.matches(&item));
    }

    #[test]
    fn test_absent_species_counts_as_zero() {
        let item = tags(&[("crow", 1)]);
        let q: TagQuery = [("heron", 0)].into_iter().collect();
        assert!(matches(&item, &q));
    }

    #[test]
    fn test_empty_query_matches_everything() {
        assert!(TagQuery::new().matches(&TagMap::new()));
    }

    #[test]
    fn test_add_accumulates() {
        let base = tags(&[("crow", 1)]);
        let once = TagEdit::Add.apply(&base, &tags(&[("crow", 2), ("owl", 1)]));
        assert_eq!(once.get("crow"), 3);
        assert_eq!(once.get("owl"), 1);
    }

    #[test]
    fn test_remove_is_unconditional() {
        let base = tags(&[("crow", 7), ("owl", 1)]);
        let out = TagEdit::Remove.apply(&base, &tags(&[("crow", 1), ("heron", 1)]));
        assert!(!out.contains("crow"));
        assert_eq!(out.get("owl"), 1);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_intersecting() {
        let t = tags(&[("heron", 1), ("crow", 2)]);
        let subs = vec!["heron".to_string(), "owl".to_string()];
        assert_eq!(t.intersecting(&subs), vec!["heron".to_string()]);
    }

    #[test]
    fn test_serde_normalizes_keys() {
        let t: TagMap = serde_json::from_str(r#"{"Crow": 2, "sparrow": 1}"#).unwrap();
        assert_eq!(t.get("crow"), 2);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, r#"{"crow":2,"sparrow":1}"#);
    }

    #[test]
    fn test_tag_edit_serde() {
        let e: TagEdit = serde_json::from_str("\"add\"").unwrap();
        assert_eq!(e, TagEdit::Add);
    }
}
