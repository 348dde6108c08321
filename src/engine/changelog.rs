//! Checkpoint-class history: an append-only, filesystem-wide log. Each
//! checkpoint carries the set of paths it touched and a full tree snapshot,
//! so a path's history is the subsequence of checkpoints that touched it and
//! rollback is a straight snapshot restore.

use std::collections::BTreeSet;

use chrono::Utc;

use crate::error::{FsError, FsResult};
use crate::meta::{Checkpoint, EntryKind};

use super::SnapshotEntry;

/// Mint an opaque 40-hex checkpoint identifier (20 random bytes). Random by
/// design: the in-process log has no content-address store to derive it from.
fn new_sha() -> FsResult<String> {
    let mut bytes = [0u8; 20];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| FsError::Unknown { message: format!("rng failure: {e}"), source: None })?;
    Ok(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

#[derive(Debug, Clone)]
struct LogEntry {
    checkpoint: Checkpoint,
    touched: BTreeSet<String>,
    snapshot: Vec<SnapshotEntry>,
}

#[derive(Debug)]
pub struct ChangeLog {
    entries: Vec<LogEntry>,
    pending: BTreeSet<String>,
    author_name: String,
    author_email: String,
}

impl ChangeLog {
    pub fn new(author_name: impl Into<String>, author_email: impl Into<String>) -> Self {
        ChangeLog {
            entries: Vec::new(),
            pending: BTreeSet::new(),
            author_name: author_name.into(),
            author_email: author_email.into(),
        }
    }

    /// Mark a path as mutated since the last checkpoint.
    pub fn note(&mut self, path: &str) {
        self.pending.insert(path.to_string());
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Finalize pending mutations into one checkpoint over the given tree
    /// snapshot. `Ok(None)` when nothing was pending (no-op success).
    pub fn commit(
        &mut self,
        message: Option<&str>,
        snapshot: Vec<SnapshotEntry>,
    ) -> FsResult<Option<Checkpoint>> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        let checkpoint = Checkpoint {
            sha: new_sha()?,
            message: message.unwrap_or("checkpoint").to_string(),
            author_name: self.author_name.clone(),
            author_email: self.author_email.clone(),
            timestamp: Utc::now().timestamp(),
        };
        let touched = std::mem::take(&mut self.pending);
        self.entries.push(LogEntry { checkpoint: checkpoint.clone(), touched, snapshot });
        Ok(Some(checkpoint))
    }

    /// Checkpoints affecting `path` (or the whole tree), newest first, capped
    /// at `limit`. `limit == 0` yields an empty list.
    pub fn revisions(&self, path: Option<&str>, limit: Option<usize>) -> Vec<Checkpoint> {
        let iter = self.entries.iter().rev().filter(|e| match path {
            Some(p) => e.touched.contains(p),
            None => true,
        });
        match limit {
            Some(n) => iter.take(n).map(|e| e.checkpoint.clone()).collect(),
            None => iter.map(|e| e.checkpoint.clone()).collect(),
        }
    }

    fn entry(&self, sha: &str) -> FsResult<&LogEntry> {
        self.entries
            .iter()
            .find(|e| e.checkpoint.sha == sha)
            .ok_or_else(|| FsError::file_not_found(format!("@{sha}")))
    }

    /// Historical file content at the given checkpoint.
    pub fn read_revision(&self, path: &str, sha: &str) -> FsResult<Vec<u8>> {
        let entry = self.entry(sha)?;
        entry
            .snapshot
            .iter()
            .find(|e| e.path == path && e.kind == EntryKind::File)
            .and_then(|e| e.content.clone())
            .ok_or_else(|| FsError::file_not_found(format!("{path}@{sha}")))
    }

    /// The full tree snapshot at the given checkpoint.
    pub fn snapshot_at(&self, sha: &str) -> FsResult<&[SnapshotEntry]> {
        Ok(&self.entry(sha)?.snapshot)
    }

    /// One path's snapshot entry at the given checkpoint; a path that did not
    /// exist at that checkpoint is an error, not a silent no-op.
    pub fn entry_at(&self, sha: &str, path: &str) -> FsResult<SnapshotEntry> {
        self.entry(sha)?
            .snapshot
            .iter()
            .find(|e| e.path == path)
            .cloned()
            .ok_or_else(|| FsError::file_not_found(format!("{path}@{sha}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{Metadata, Visibility};

    fn file_entry(path: &str, content: &[u8]) -> SnapshotEntry {
        SnapshotEntry {
            path: path.to_string(),
            kind: EntryKind::File,
            content: Some(content.to_vec()),
            metadata: Metadata::now(Visibility::Private),
        }
    }

    #[test]
    fn test_commit_without_pending_is_noop() {
        let mut log = ChangeLog::new("tester", "tester@localhost");
        assert!(log.commit(Some("empty"), Vec::new()).unwrap().is_none());
        assert!(log.revisions(None, None).is_empty());
    }

    #[test]
    fn test_commit_and_path_scoped_revisions() {
        let mut log = ChangeLog::new("tester", "tester@localhost");
        log.note("a.txt");
        let c1 = log
            .commit(Some("write a"), vec![file_entry("a.txt", b"v1")])
            .unwrap()
            .unwrap();
        log.note("b.txt");
        let c2 = log
            .commit(None, vec![file_entry("a.txt", b"v1"), file_entry("b.txt", b"x")])
            .unwrap()
            .unwrap();
        assert_eq!(c1.sha.len(), 40);
        assert_ne!(c1.sha, c2.sha);

        // Newest first; path scoping follows the touched set.
        let all = log.revisions(None, None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].sha, c2.sha);
        let only_a = log.revisions(Some("a.txt"), None);
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].sha, c1.sha);
        assert!(log.revisions(None, Some(0)).is_empty());
        assert_eq!(log.revisions(None, Some(1)).len(), 1);
    }

    #[test]
    fn test_read_revision_and_missing_path() {
        let mut log = ChangeLog::new("tester", "tester@localhost");
        log.note("a.txt");
        let c1 = log
            .commit(Some("write a"), vec![file_entry("a.txt", b"v1")])
            .unwrap()
            .unwrap();
        assert_eq!(log.read_revision("a.txt", &c1.sha).unwrap(), b"v1");
        assert!(log.read_revision("b.txt", &c1.sha).unwrap_err().is_not_found());
        assert!(log.read_revision("a.txt", "feedfacefeedfacefeedfacefeedfacefeedface").is_err());
    }
}
