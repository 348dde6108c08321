//! Snapshot-class version storage: per-path version records plus a blob table
//! keyed by `(path, version_id)`. Blobs are retained independently of the
//! current node at the path, so later writes never disturb history.

use std::collections::HashMap;

use crate::meta::{Metadata, VersionRecord};

#[derive(Debug, Clone)]
pub struct VersionBlob {
    pub content: Vec<u8>,
    pub metadata: Metadata,
}

#[derive(Debug, Default)]
pub struct VersionStore {
    /// Records per path, in creation order (ascending time).
    records: HashMap<String, Vec<VersionRecord>>,
    blobs: HashMap<(String, String), VersionBlob>,
}

impl VersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh record for `path` and retain the content + metadata
    /// snapshot under it.
    pub fn record(&mut self, path: &str, content: &[u8], metadata: Metadata) -> VersionRecord {
        let rec = VersionRecord::mint();
        self.records.entry(path.to_string()).or_default().push(rec.clone());
        self.blobs.insert(
            (path.to_string(), rec.version_id.clone()),
            VersionBlob { content: content.to_vec(), metadata },
        );
        rec
    }

    /// All records for `path`, oldest first. Empty when none exist.
    pub fn list(&self, path: &str) -> Vec<VersionRecord> {
        self.records.get(path).cloned().unwrap_or_default()
    }

    pub fn latest(&self, path: &str) -> Option<VersionRecord> {
        self.records.get(path).and_then(|v| v.last()).cloned()
    }

    pub fn get(&self, path: &str, version_id: &str) -> Option<&VersionBlob> {
        self.blobs.get(&(path.to_string(), version_id.to_string()))
    }

    /// Remove one record and its blob; other versions and the current node
    /// are untouched. Returns whether anything was removed.
    pub fn remove(&mut self, path: &str, version_id: &str) -> bool {
        let removed =
            self.blobs.remove(&(path.to_string(), version_id.to_string())).is_some();
        if let Some(recs) = self.records.get_mut(path) {
            recs.retain(|r| r.version_id != version_id);
            if recs.is_empty() {
                self.records.remove(path);
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.blobs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::Visibility;

    fn meta() -> Metadata {
        Metadata::now(Visibility::Private)
    }

    #[test]
    fn test_records_are_per_path_and_ordered() {
        let mut vs = VersionStore::new();
        let a1 = vs.record("a.txt", b"v1", meta());
        let a2 = vs.record("a.txt", b"v2", meta());
        let b1 = vs.record("b.txt", b"other", meta());

        let a_ids: Vec<String> =
            vs.list("a.txt").iter().map(|r| r.version_id.clone()).collect();
        assert_eq!(a_ids, vec![a1.version_id.clone(), a2.version_id.clone()]);
        assert_eq!(vs.list("b.txt").len(), 1);
        assert_eq!(vs.latest("a.txt").unwrap().version_id, a2.version_id);
        assert_eq!(vs.latest("b.txt").unwrap().version_id, b1.version_id);
        assert!(vs.list("missing").is_empty());
    }

    #[test]
    fn test_remove_touches_only_that_version() {
        let mut vs = VersionStore::new();
        let v1 = vs.record("a", b"v1", meta());
        let v2 = vs.record("a", b"v2", meta());
        assert!(vs.remove("a", &v1.version_id));
        assert!(!vs.remove("a", &v1.version_id));
        assert!(vs.get("a", &v1.version_id).is_none());
        assert_eq!(vs.get("a", &v2.version_id).unwrap().content, b"v2");
        assert_eq!(vs.list("a").len(), 1);
    }
}
