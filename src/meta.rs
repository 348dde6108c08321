//! Core data contracts shared by every adapter (metadata, listings, version
//! and checkpoint records). Keep this module purely about types/serde and
//! light helpers.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Node visibility. The in-process and table-backed stores default to
/// `Private`; network-backed adapters may declare a different default on
/// their own config (a per-backend policy, not unified here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub visibility: Visibility,
    /// Seconds since epoch.
    pub mtime: i64,
}

impl Metadata {
    pub fn now(visibility: Visibility) -> Self {
        Metadata { visibility, mtime: Utc::now().timestamp() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

/// One row of `list_contents` / the result of `stat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    /// Child name (final segment).
    pub name: String,
    /// Full normalized path of the entry.
    pub path: String,
    pub kind: EntryKind,
    /// Content length for files; 0 for directories.
    pub size: u64,
    pub metadata: Metadata,
}

/// Snapshot-class version record, scoped to one path. The content blob lives
/// separately under `(path, version_id)` and outlives later writes to the
/// path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// 128-bit random value, 32 lowercase hex chars. Uniqueness is
    /// probabilistic by construction; no collision check is made.
    pub version_id: String,
    /// Seconds since epoch at creation.
    pub timestamp: i64,
}

impl VersionRecord {
    pub fn mint() -> Self {
        VersionRecord {
            version_id: uuid::Uuid::new_v4().simple().to_string(),
            timestamp: Utc::now().timestamp(),
        }
    }
}

/// Checkpoint-class commit record: one entry of the append-only, filesystem
/// wide history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Opaque 40-hex identifier.
    pub sha: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    /// Seconds since epoch.
    pub timestamp: i64,
}

/// Options accepted by `write` and the write-like operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Visibility for the written file; the adapter's default when absent.
    #[serde(default)]
    pub visibility: Option<Visibility>,
    /// Visibility for ancestor directories auto-materialized by this write;
    /// the adapter's default when absent.
    #[serde(default)]
    pub directory_visibility: Option<Visibility>,
}

impl WriteOptions {
    pub fn with_visibility(visibility: Visibility) -> Self {
        WriteOptions { visibility: Some(visibility), ..Default::default() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryDeleteOptions {
    /// Remove the whole subtree. Without it, a non-empty directory fails
    /// `DirectoryNotEmpty`.
    #[serde(default)]
    pub recursive: bool,
}

impl DirectoryDeleteOptions {
    pub fn recursive() -> Self {
        DirectoryDeleteOptions { recursive: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_id_shape() {
        let r = VersionRecord::mint();
        assert_eq!(r.version_id.len(), 32);
        assert!(r.version_id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_visibility_serde_snake_case() {
        assert_eq!(serde_json::to_string(&Visibility::Public).unwrap(), "\"public\"");
        assert_eq!(serde_json::from_str::<Visibility>("\"private\"").unwrap(), Visibility::Private);
    }

    #[test]
    fn test_default_visibility_is_private() {
        assert_eq!(Visibility::default(), Visibility::Private);
    }
}
