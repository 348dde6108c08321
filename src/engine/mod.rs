//! Hierarchical store engines: the reference semantics for path-indexed
//! storage, realized twice — a nested tree of maps (`tree`) and a flat
//! ordered table keyed by full path (`flat`). Both satisfy the same
//! observable contract; adapters pick a representation, never new semantics.

pub mod changelog;
pub mod flat;
pub mod tree;
pub mod versions;

use serde::{Deserialize, Serialize};

use crate::error::FsResult;
use crate::meta::{DirectoryDeleteOptions, EntryInfo, EntryKind, Metadata, Visibility, WriteOptions};
use crate::path::NormalizedPath;

/// One node of a full-tree export, used by checkpoint snapshots and bulk
/// restore. Paths are in joined normalized form; the root is implicit and
/// never exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub path: String,
    pub kind: EntryKind,
    /// File content; `None` for directories.
    #[serde(default)]
    pub content: Option<Vec<u8>>,
    pub metadata: Metadata,
}

/// Single-threaded store semantics. All paths arrive normalized; engines are
/// owned by one serializing actor, so no method needs internal locking.
///
/// Contract highlights (uniform across representations):
/// - `write` replaces wholesale and auto-materializes missing ancestors with
///   the directory visibility (default private);
/// - `delete` of an absent file succeeds;
/// - subtree operations match on segment boundaries only, so `foo` never
///   captures a sibling `foobar`;
/// - exactly one root directory always exists and is never created/deleted.
pub trait StoreEngine: Send + 'static {
    const NAME: &'static str;

    fn new(default_visibility: Visibility) -> Self
    where
        Self: Sized;

    fn write(&mut self, path: &NormalizedPath, contents: &[u8], opts: &WriteOptions)
        -> FsResult<()>;
    fn read(&self, path: &NormalizedPath) -> FsResult<Vec<u8>>;
    fn delete(&mut self, path: &NormalizedPath) -> FsResult<()>;
    fn rename(
        &mut self,
        src: &NormalizedPath,
        dst: &NormalizedPath,
        opts: &WriteOptions,
    ) -> FsResult<()>;
    fn copy(
        &mut self,
        src: &NormalizedPath,
        dst: &NormalizedPath,
        opts: &WriteOptions,
    ) -> FsResult<()>;
    fn file_exists(&self, path: &NormalizedPath) -> FsResult<bool>;
    fn list_contents(&self, path: &NormalizedPath) -> FsResult<Vec<EntryInfo>>;
    fn create_directory(&mut self, path: &NormalizedPath, opts: &WriteOptions) -> FsResult<()>;
    fn delete_directory(
        &mut self,
        path: &NormalizedPath,
        opts: &DirectoryDeleteOptions,
    ) -> FsResult<()>;
    fn clear(&mut self);
    fn set_visibility(&mut self, path: &NormalizedPath, visibility: Visibility) -> FsResult<()>;
    fn visibility(&self, path: &NormalizedPath) -> FsResult<Visibility>;
    fn stat(&self, path: &NormalizedPath) -> FsResult<EntryInfo>;
    fn access(&self, path: &NormalizedPath) -> FsResult<()>;
    fn append(&mut self, path: &NormalizedPath, contents: &[u8]) -> FsResult<()>;
    fn truncate(&mut self, path: &NormalizedPath, len: u64) -> FsResult<()>;
    fn utime(&mut self, path: &NormalizedPath, mtime: i64) -> FsResult<()>;

    /// Full-tree export for checkpoint snapshots (files and explicit
    /// directories, root excluded).
    fn export_entries(&self) -> Vec<SnapshotEntry>;
    /// Replace the whole store with a previously exported snapshot.
    fn import_entries(&mut self, entries: &[SnapshotEntry]) -> FsResult<()>;
}
