//! Boundary adapters for tag payloads.
//!
//! Clients send tags in several shapes:
//!
//! - `["crow,2", "sparrow"]` (a bare label counts as 1)
//! - `{"crow": 2, "sparrow": "1"}`
//! - `[{"label": "crow", "quantity": 2}]` (`min_count` and `count` are accepted
//!   for the count, `tag` and `species` for the label)
//!
//! All of them are converted into a [`TagMap`] here. Anything else is a
//! validation error. Query payloads go through [`parse_query`] instead, which
//! clamps every requested minimum into `1..=u32::MAX`.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{BirdtagError, Result};
use crate::tags::{normalize_label, TagMap, TagQuery};

/// A count given as a JSON integer or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CountValue {
    Int(i64),
    Text(String),
}

/// How out-of-range counts are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CountMode {
    /// Stored counts: negative or oversized is an error.
    Exact,
    /// Query minimums: clamped to at least one.
    Minimum,
}

impl CountValue {
    fn to_count(&self, label: &str, mode: CountMode) -> Result<u32> {
        let value = match self {
            Self::Int(n) => *n,
            Self::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                BirdtagError::validation(format!("count for '{label}' is not an integer: {s}"))
            })?,
        };
        parse_count(label, value, mode)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagEntry {
    #[serde(alias = "tag", alias = "species")]
    pub label: String,
    #[serde(default, alias = "min_count", alias = "count")]
    pub quantity: Option<CountValue>,
}

/// Tag payload in any of the accepted shapes.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagPayload {
    Pairs(Vec<String>),
    Map(BTreeMap<String, CountValue>),
    Entries(Vec<TagEntry>),
}

impl TagPayload {
    /// Recognize the shape of a JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|_| BirdtagError::validation("unrecognized tag payload shape"))
    }

    /// Convert into the canonical tag map. Later duplicates win.
    pub fn into_tags(self) -> Result<TagMap> {
        self.collect(CountMode::Exact)
    }

    /// Convert into a threshold query. Minimums of zero or below become 1.
    pub fn into_query(self) -> Result<TagQuery> {
        let tags = self.collect(CountMode::Minimum)?;
        Ok(tags.iter().collect())
    }

    fn collect(self, mode: CountMode) -> Result<TagMap> {
        let mut tags = TagMap::new();
        match self {
            Self::Pairs(pairs) => {
                for pair in pairs {
                    let (label, count) = pair_with_mode(&pair, mode)?;
                    tags.set(&label, count);
                }
            }
            Self::Map(map) => {
                for (label, count) in map {
                    let label = require_label(&label)?;
                    let count = count.to_count(&label, mode)?;
                    tags.set(&label, count);
                }
            }
            Self::Entries(entries) => {
                for entry in entries {
                    let label = require_label(&entry.label)?;
                    let count = match entry.quantity {
                        Some(q) => q.to_count(&label, mode)?,
                        None => 1,
                    };
                    tags.set(&label, count);
                }
            }
        }
        Ok(tags)
    }
}

/// Convert a JSON tag payload of any accepted shape into a tag map.
pub fn parse_tags(value: Value) -> Result<TagMap> {
    TagPayload::from_value(value)?.into_tags()
}

/// Convert a JSON tag payload of any accepted shape into a threshold query.
pub fn parse_query(value: Value) -> Result<TagQuery> {
    TagPayload::from_value(value)?.into_query()
}

/// Parse `"label,count"` or a bare `"label"`.
pub fn parse_pair(pair: &str) -> Result<(String, u32)> {
    pair_with_mode(pair, CountMode::Exact)
}

fn pair_with_mode(pair: &str, mode: CountMode) -> Result<(String, u32)> {
    let (label, count) = match pair.split_once(',') {
        Some((label, count)) => {
            let label = require_label(label)?;
            let value = count.trim().parse::<i64>().map_err(|_| {
                BirdtagError::validation(format!("invalid count in tag pair '{pair}'"))
            })?;
            let count = parse_count(&label, value, mode)?;
            (label, count)
        }
        None => (require_label(pair)?, 1),
    };
    Ok((label, count))
}

/// Lowercased, de-duplicated subscription labels. Blank entries are dropped.
pub fn subscription_labels<I, S>(labels: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .filter_map(|l| normalize_label(l.as_ref()))
        .collect()
}

fn require_label(label: &str) -> Result<String> {
    normalize_label(label).ok_or_else(|| BirdtagError::validation("tag label must not be empty"))
}

fn parse_count(label: &str, value: i64, mode: CountMode) -> Result<u32> {
    if mode == CountMode::Minimum {
        return Ok(value.clamp(1, i64::from(u32::MAX)) as u32);
    }
    if value < 0 {
        return Err(BirdtagError::validation(format!(
            "count for '{label}' must not be negative"
        )));
    }
    u32::try_from(value)
        .map_err(|_| BirdtagError::validation(format!("count for '{label}' is too large")))
}
