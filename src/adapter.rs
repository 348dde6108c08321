//! The adapter contract: the operation set every backend implements, the two
//! capability declarations, and the negotiation helpers the dispatch façade
//! uses to turn an unsupported call into a typed error before the adapter is
//! ever invoked.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};
use crate::meta::{
    Checkpoint, DirectoryDeleteOptions, EntryInfo, Visibility, VersionRecord, WriteOptions,
};
use crate::path::NormalizedPath;
use crate::stream::{ChunkMode, ReadStream, WriteStream};

/// Every dispatchable operation, by stable snake_case name. Closed set: the
/// façade and `unsupported_operations()` speak in these, never in strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Write,
    Read,
    Delete,
    Move,
    Copy,
    CopyBetween,
    FileExists,
    ListContents,
    CreateDirectory,
    DeleteDirectory,
    Clear,
    SetVisibility,
    Visibility,
    Stat,
    Access,
    Append,
    Truncate,
    Utime,
    ReadStream,
    WriteStream,
    WriteVersion,
    ListVersions,
    GetLatestVersion,
    ReadVersion,
    RestoreVersion,
    DeleteVersion,
    Commit,
    Revisions,
    ReadRevision,
    Rollback,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Write => "write",
            Operation::Read => "read",
            Operation::Delete => "delete",
            Operation::Move => "move",
            Operation::Copy => "copy",
            Operation::CopyBetween => "copy_between",
            Operation::FileExists => "file_exists",
            Operation::ListContents => "list_contents",
            Operation::CreateDirectory => "create_directory",
            Operation::DeleteDirectory => "delete_directory",
            Operation::Clear => "clear",
            Operation::SetVisibility => "set_visibility",
            Operation::Visibility => "visibility",
            Operation::Stat => "stat",
            Operation::Access => "access",
            Operation::Append => "append",
            Operation::Truncate => "truncate",
            Operation::Utime => "utime",
            Operation::ReadStream => "read_stream",
            Operation::WriteStream => "write_stream",
            Operation::WriteVersion => "write_version",
            Operation::ListVersions => "list_versions",
            Operation::GetLatestVersion => "get_latest_version",
            Operation::ReadVersion => "read_version",
            Operation::RestoreVersion => "restore_version",
            Operation::DeleteVersion => "delete_version",
            Operation::Commit => "commit",
            Operation::Revisions => "revisions",
            Operation::ReadRevision => "read_revision",
            Operation::Rollback => "rollback",
        }
    }

    /// The non-versioning operation set (versioning ops are granted by class,
    /// see [`supported_operations`]).
    pub const BASE: &'static [Operation] = &[
        Operation::Write,
        Operation::Read,
        Operation::Delete,
        Operation::Move,
        Operation::Copy,
        Operation::CopyBetween,
        Operation::FileExists,
        Operation::ListContents,
        Operation::CreateDirectory,
        Operation::DeleteDirectory,
        Operation::Clear,
        Operation::SetVisibility,
        Operation::Visibility,
        Operation::Stat,
        Operation::Access,
        Operation::Append,
        Operation::Truncate,
        Operation::Utime,
        Operation::ReadStream,
        Operation::WriteStream,
    ];

    pub const SNAPSHOT: &'static [Operation] = &[
        Operation::WriteVersion,
        Operation::ListVersions,
        Operation::GetLatestVersion,
        Operation::ReadVersion,
        Operation::RestoreVersion,
        Operation::DeleteVersion,
    ];

    pub const CHECKPOINT: &'static [Operation] = &[
        Operation::Commit,
        Operation::Revisions,
        Operation::ReadRevision,
        Operation::Rollback,
    ];

    pub fn is_versioning(&self) -> bool {
        Operation::SNAPSHOT.contains(self) || Operation::CHECKPOINT.contains(self)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which versioning operation set an adapter exposes, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersioningClass {
    /// Explicit per-path version records (`write_version` family).
    Snapshot,
    /// Filesystem-wide commit history (`commit` family).
    Checkpoint,
}

impl VersioningClass {
    pub fn operations(&self) -> &'static [Operation] {
        match self {
            VersioningClass::Snapshot => Operation::SNAPSHOT,
            VersioningClass::Checkpoint => Operation::CHECKPOINT,
        }
    }
}

/// A concrete storage backend. Paths arrive already normalized; the dispatch
/// boundary owns traversal defense, so implementations never re-validate.
///
/// Extended operations default to a typed `UnsupportedOperation`; a backend
/// that cannot perform them should also list them in
/// `unsupported_operations()` so the façade rejects without a call.
#[allow(unused_variables)]
pub trait Adapter: Send + Sync {
    /// Backend kind, e.g. `"memory"` or `"table"`.
    fn adapter_name(&self) -> &'static str;
    /// Configured instance (store) name.
    fn instance_name(&self) -> &str;

    // Core operation set ----------------------------------------------------
    fn write(&self, path: &NormalizedPath, contents: &[u8], opts: &WriteOptions) -> FsResult<()>;
    fn read(&self, path: &NormalizedPath) -> FsResult<Vec<u8>>;
    /// Idempotent: deleting an absent path succeeds.
    fn delete(&self, path: &NormalizedPath) -> FsResult<()>;
    /// The `move` operation (copy then remove source).
    fn rename(
        &self,
        src: &NormalizedPath,
        dst: &NormalizedPath,
        opts: &WriteOptions,
    ) -> FsResult<()>;
    fn copy(&self, src: &NormalizedPath, dst: &NormalizedPath, opts: &WriteOptions)
        -> FsResult<()>;
    fn file_exists(&self, path: &NormalizedPath) -> FsResult<bool>;
    /// Immediate children only, order irrelevant.
    fn list_contents(&self, path: &NormalizedPath) -> FsResult<Vec<EntryInfo>>;
    fn create_directory(&self, path: &NormalizedPath, opts: &WriteOptions) -> FsResult<()>;
    fn delete_directory(
        &self,
        path: &NormalizedPath,
        opts: &DirectoryDeleteOptions,
    ) -> FsResult<()>;
    /// Reset the whole store to an empty root directory.
    fn clear(&self) -> FsResult<()>;
    fn set_visibility(&self, path: &NormalizedPath, visibility: Visibility) -> FsResult<()>;
    fn visibility(&self, path: &NormalizedPath) -> FsResult<Visibility>;

    // Extended operation set ------------------------------------------------
    fn stat(&self, path: &NormalizedPath) -> FsResult<EntryInfo> {
        Err(FsError::unsupported(Operation::Stat, self.adapter_name()))
    }
    fn access(&self, path: &NormalizedPath) -> FsResult<()> {
        Err(FsError::unsupported(Operation::Access, self.adapter_name()))
    }
    fn append(&self, path: &NormalizedPath, contents: &[u8]) -> FsResult<()> {
        Err(FsError::unsupported(Operation::Append, self.adapter_name()))
    }
    fn truncate(&self, path: &NormalizedPath, len: u64) -> FsResult<()> {
        Err(FsError::unsupported(Operation::Truncate, self.adapter_name()))
    }
    fn utime(&self, path: &NormalizedPath, mtime: i64) -> FsResult<()> {
        Err(FsError::unsupported(Operation::Utime, self.adapter_name()))
    }

    // Streaming -------------------------------------------------------------
    /// Chunking used when the caller does not pick a mode; configurable per
    /// adapter instance.
    fn default_chunk_mode(&self) -> ChunkMode {
        ChunkMode::default()
    }
    fn read_stream(&self, path: &NormalizedPath, mode: ChunkMode) -> FsResult<ReadStream> {
        Err(FsError::unsupported(Operation::ReadStream, self.adapter_name()))
    }
    fn write_stream(&self, path: &NormalizedPath) -> FsResult<WriteStream> {
        Err(FsError::unsupported(Operation::WriteStream, self.adapter_name()))
    }

    // Capability declarations -----------------------------------------------
    /// Operations this backend cannot perform. The façade checks membership
    /// before delegating, so "not implemented" is uniform and typed.
    fn unsupported_operations(&self) -> HashSet<Operation> {
        HashSet::new()
    }
    fn versioning_module(&self) -> Option<VersioningClass> {
        None
    }
    /// Accessor used by the façade once `versioning_module()` declared
    /// `Snapshot`.
    fn snapshot_versioning(&self) -> Option<&dyn SnapshotVersioning> {
        None
    }
    /// Accessor used by the façade once `versioning_module()` declared
    /// `Checkpoint`.
    fn checkpoint_versioning(&self) -> Option<&dyn CheckpointVersioning> {
        None
    }
}

/// Snapshot-class versioning surface (explicit per-path version records).
pub trait SnapshotVersioning: Send + Sync {
    /// Write + snapshot in one call: overwrites the current node and records
    /// a fresh version. Plain `write` never creates a version.
    fn write_version(
        &self,
        path: &NormalizedPath,
        contents: &[u8],
        opts: &WriteOptions,
    ) -> FsResult<VersionRecord>;
    /// Ascending chronological order; empty (not an error) when none exist.
    fn list_versions(&self, path: &NormalizedPath) -> FsResult<Vec<VersionRecord>>;
    fn get_latest_version(&self, path: &NormalizedPath) -> FsResult<VersionRecord>;
    fn read_version(&self, path: &NormalizedPath, version_id: &str) -> FsResult<Vec<u8>>;
    /// Overwrites the current node with the snapshot; does not record a new
    /// version.
    fn restore_version(&self, path: &NormalizedPath, version_id: &str) -> FsResult<()>;
    /// Removes that record and blob only; current content is untouched.
    fn delete_version(&self, path: &NormalizedPath, version_id: &str) -> FsResult<()>;
}

/// Checkpoint-class versioning surface (append-only, filesystem-wide log).
pub trait CheckpointVersioning: Send + Sync {
    /// Finalize all pending mutations. `Ok(None)` when nothing was pending.
    fn commit(&self, message: Option<&str>) -> FsResult<Option<Checkpoint>>;
    /// Checkpoints affecting `path` (or the whole tree), newest first,
    /// capped at `limit`. `limit == 0` yields an empty list.
    fn revisions(
        &self,
        path: Option<&NormalizedPath>,
        limit: Option<usize>,
    ) -> FsResult<Vec<Checkpoint>>;
    fn read_revision(&self, path: &NormalizedPath, sha: &str) -> FsResult<Vec<u8>>;
    /// Reset the whole tree (or one path) to its state at `sha`. A path that
    /// did not exist at the checkpoint is an error, not a silent no-op.
    fn rollback(&self, sha: &str, path: Option<&NormalizedPath>) -> FsResult<()>;
}

/// Whether the adapter exposes any versioning class at all.
pub fn versioning_supported(adapter: &dyn Adapter) -> bool {
    adapter.versioning_module().is_some()
}

/// The full set of operations the adapter will accept, derived purely from
/// its two capability declarations.
pub fn supported_operations(adapter: &dyn Adapter) -> HashSet<Operation> {
    let unsupported = adapter.unsupported_operations();
    let mut out: HashSet<Operation> = Operation::BASE
        .iter()
        .copied()
        .filter(|op| !unsupported.contains(op))
        .collect();
    if let Some(class) = adapter.versioning_module() {
        out.extend(class.operations().iter().copied());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_names_are_snake_case() {
        assert_eq!(Operation::CopyBetween.name(), "copy_between");
        assert_eq!(Operation::GetLatestVersion.to_string(), "get_latest_version");
    }

    #[test]
    fn test_versioning_class_operation_sets_are_disjoint() {
        for op in Operation::SNAPSHOT {
            assert!(!Operation::CHECKPOINT.contains(op));
            assert!(op.is_versioning());
        }
        for op in Operation::BASE {
            assert!(!op.is_versioning());
        }
    }
}
