use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::derive::PathPlan;

/// Key-ordered association of original paths to fingerprinted paths.
///
/// Backed by a `BTreeMap`, so iteration and serialization are always in
/// ascending key order no matter in which order entries were inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mapping(BTreeMap<String, String>);

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Adds entries of a previously persisted mapping whose keys are not
    /// present yet. Entries already in `self` always win. Returns the number
    /// of entries taken over.
    pub fn merge_existing(&mut self, existing: Value) -> usize {
        let Value::Object(entries) = existing else {
            tracing::warn!("existing mapping is not a JSON object; ignoring it");
            return 0;
        };
        let mut added = 0;
        for (key, value) in entries {
            if self.0.contains_key(&key) {
                continue;
            }
            match value {
                Value::String(value) => {
                    self.0.insert(key, value);
                    added += 1;
                }
                other => {
                    tracing::warn!("skipping existing mapping entry {key:?}: not a string ({other})");
                }
            }
        }
        added
    }

    /// Pretty JSON with two-space indentation and sorted keys.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.0)
    }
}

impl FromIterator<(String, String)> for Mapping {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Mapping {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A successfully fingerprinted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub fingerprint: String,
    pub plan: PathPlan,
}

/// A file whose fingerprint or materialization failed.
#[derive(Debug)]
pub struct FileFailure {
    pub source: String,
    pub error: anyhow::Error,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("group finished with {resolved} of {expected} files resolved")]
pub struct Incomplete {
    pub resolved: usize,
    pub expected: usize,
}

/// Everything an [`Aggregator`] collected for a group.
#[derive(Debug, Default)]
pub struct Aggregate {
    /// `None` when the group writes no mapping.
    pub mapping: Option<Mapping>,
    /// Sorted by source path.
    pub records: Vec<FileRecord>,
    pub failures: Vec<FileFailure>,
}

/// Collects per-file outcomes of one group.
///
/// Completion is tracked with a per-file counter, independent of how many
/// distinct mapping keys exist: every file counts once whether it produced
/// an entry, collided with another entry or failed.
#[derive(Debug)]
pub struct Aggregator {
    expected: usize,
    resolved: usize,
    mapping: Option<Mapping>,
    records: Vec<FileRecord>,
    failures: Vec<FileFailure>,
}

impl Aggregator {
    pub fn new(expected: usize, with_mapping: bool) -> Self {
        Self {
            expected,
            resolved: 0,
            mapping: with_mapping.then(Mapping::new),
            records: Vec::with_capacity(expected),
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, record: FileRecord) {
        if let Some(mapping) = self.mapping.as_mut() {
            let PathPlan { key, value, .. } = &record.plan;
            if let Some(previous) = mapping.insert(key.clone(), value.clone())
                && previous != *value
            {
                tracing::warn!(
                    "mapping key {key:?} produced twice; {value:?} replaces {previous:?}"
                );
            }
        }
        self.resolved += 1;
        self.records.push(record);
    }

    pub fn record_failure(&mut self, failure: FileFailure) {
        tracing::error!("{}: {:#}", failure.source, failure.error);
        self.resolved += 1;
        self.failures.push(failure);
    }

    pub fn is_complete(&self) -> bool {
        self.resolved == self.expected
    }

    /// Consumes the aggregator once every expected file has been resolved.
    pub fn finish(self) -> Result<Aggregate, Incomplete> {
        if !self.is_complete() {
            return Err(Incomplete {
                resolved: self.resolved,
                expected: self.expected,
            });
        }
        let mut records = self.records;
        records.sort_by(|a, b| a.plan.source.cmp(&b.plan.source));
        Ok(Aggregate {
            mapping: self.mapping,
            records,
            failures: self.failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(source: &str, key: &str, value: &str) -> FileRecord {
        FileRecord {
            fingerprint: "ff".into(),
            plan: PathPlan {
                source: source.into(),
                resolved: source.into(),
                target: None,
                key: key.into(),
                value: value.into(),
            },
        }
    }

    #[test]
    fn test_json_keys_are_sorted_regardless_of_insertion_order() {
        let mut mapping = Mapping::new();
        for key in ["z.css", "a.css", "m/b.css", "B.css"] {
            mapping.insert(key, "x");
        }
        let keys: Vec<&str> = mapping.keys().collect();
        assert!(keys.windows(2).all(|w| w[0] < w[1]), "{keys:?}");
        assert_eq!(
            mapping.to_json().unwrap(),
            "{\n  \"B.css\": \"x\",\n  \"a.css\": \"x\",\n  \"m/b.css\": \"x\",\n  \"z.css\": \"x\"\n}"
        );
    }

    #[test]
    fn test_merge_adds_only_absent_keys() {
        let mut fresh: Mapping = [("b".to_owned(), "2".to_owned())].into_iter().collect();
        assert_eq!(fresh.merge_existing(json!({"a": "1"})), 1);
        assert_eq!(fresh.to_json().unwrap(), "{\n  \"a\": \"1\",\n  \"b\": \"2\"\n}");

        let mut fresh: Mapping = [("a".to_owned(), "9".to_owned()), ("b".to_owned(), "2".to_owned())]
            .into_iter()
            .collect();
        assert_eq!(fresh.merge_existing(json!({"a": "1"})), 0);
        assert_eq!(fresh.get("a"), Some("9"));
    }

    #[test]
    fn test_merge_ignores_non_objects_and_non_strings() {
        let mut mapping = Mapping::new();
        assert_eq!(mapping.merge_existing(json!(["a", "b"])), 0);
        assert_eq!(mapping.merge_existing(json!({"n": 1, "s": "ok"})), 1);
        assert_eq!(mapping.get("n"), None);
        assert_eq!(mapping.get("s"), Some("ok"));
    }

    #[test]
    fn test_completion_counts_files_not_keys() {
        let mut aggregator = Aggregator::new(3, true);
        aggregator.record(record("a.css", "same", "1"));
        aggregator.record(record("b.css", "same", "2"));
        assert!(!aggregator.is_complete());
        aggregator.record_failure(FileFailure {
            source: "c.css".into(),
            error: anyhow::anyhow!("stat failed"),
        });
        assert!(aggregator.is_complete());

        let aggregate = aggregator.finish().unwrap();
        let mapping = aggregate.mapping.unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get("same"), Some("2"));
        assert_eq!(aggregate.records.len(), 2);
        assert_eq!(aggregate.failures.len(), 1);
    }

    #[test]
    fn test_without_mapping() {
        let mut aggregator = Aggregator::new(1, false);
        aggregator.record(record("a.css", "a", "b"));
        let aggregate = aggregator.finish().unwrap();
        assert!(aggregate.mapping.is_none());
        assert_eq!(aggregate.records.len(), 1);
    }

    #[test]
    fn test_finish_before_completion_fails() {
        let aggregator = Aggregator::new(2, true);
        assert_eq!(
            aggregator.finish().unwrap_err(),
            Incomplete {
                resolved: 0,
                expected: 2
            }
        );
    }

    #[test]
    fn test_records_are_sorted_by_source() {
        let mut aggregator = Aggregator::new(3, false);
        for source in ["c.js", "a.js", "b.js"] {
            aggregator.record(record(source, source, source));
        }
        let sources: Vec<String> = aggregator
            .finish()
            .unwrap()
            .records
            .into_iter()
            .map(|r| r.plan.source)
            .collect();
        assert_eq!(sources, ["a.js", "b.js", "c.js"]);
    }
}
