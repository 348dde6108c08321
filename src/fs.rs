//! The dispatch façade: the one public surface callers talk to. It owns the
//! two boundary duties — normalize-and-validate every raw path before any
//! adapter sees it, and refuse unsupported operations with a typed error
//! before delegation — then forwards to the configured adapter.

use std::sync::Arc;

use crate::adapter::{
    supported_operations, Adapter, CheckpointVersioning, Operation, SnapshotVersioning,
    VersioningClass,
};
use crate::error::{FsError, FsResult};
use crate::meta::{
    Checkpoint, DirectoryDeleteOptions, EntryInfo, Visibility, VersionRecord, WriteOptions,
};
use crate::path::{normalize, NormalizedPath};
use crate::store::{MemoryAdapter, StoreConfig, TableAdapter};
use crate::stream::{ChunkMode, ReadStream, WriteStream};

/// A virtual filesystem over one adapter. Cloning shares the adapter.
#[derive(Clone)]
pub struct Filesystem {
    adapter: Arc<dyn Adapter>,
}

impl Filesystem {
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        Filesystem { adapter }
    }

    /// Filesystem over a named in-memory (nested tree) store.
    pub fn memory(config: StoreConfig) -> FsResult<Self> {
        Ok(Filesystem { adapter: Arc::new(MemoryAdapter::open(config)?) })
    }

    /// Filesystem over a named table (flat path-keyed) store.
    pub fn table(config: StoreConfig) -> FsResult<Self> {
        Ok(Filesystem { adapter: Arc::new(TableAdapter::open(config)?) })
    }

    pub fn adapter(&self) -> &dyn Adapter {
        self.adapter.as_ref()
    }

    pub fn adapter_name(&self) -> &'static str {
        self.adapter.adapter_name()
    }

    pub fn instance_name(&self) -> &str {
        self.adapter.instance_name()
    }

    /// Whether the adapter will accept `op`, from its capability declarations
    /// alone. Versioning operations are granted by class, never individually.
    pub fn supports(&self, op: Operation) -> bool {
        supported_operations(self.adapter.as_ref()).contains(&op)
    }

    fn ensure(&self, op: Operation) -> FsResult<()> {
        let granted = if op.is_versioning() {
            self.adapter
                .versioning_module()
                .is_some_and(|class| class.operations().contains(&op))
        } else {
            !self.adapter.unsupported_operations().contains(&op)
        };
        if granted {
            Ok(())
        } else {
            Err(FsError::unsupported(op, self.adapter.adapter_name()))
        }
    }

    fn resolve(&self, raw: &str) -> FsResult<NormalizedPath> {
        normalize(raw)
    }

    fn snapshot_module(&self) -> FsResult<&dyn SnapshotVersioning> {
        self.adapter.snapshot_versioning().ok_or_else(|| {
            FsError::unsupported(Operation::WriteVersion, self.adapter.adapter_name())
        })
    }

    fn checkpoint_module(&self) -> FsResult<&dyn CheckpointVersioning> {
        self.adapter.checkpoint_versioning().ok_or_else(|| {
            FsError::unsupported(Operation::Commit, self.adapter.adapter_name())
        })
    }

    // Core operations --------------------------------------------------------

    pub fn write(&self, path: &str, contents: &[u8]) -> FsResult<()> {
        self.write_with(path, contents, &WriteOptions::default())
    }

    pub fn write_with(&self, path: &str, contents: &[u8], opts: &WriteOptions) -> FsResult<()> {
        let p = self.resolve(path)?;
        self.ensure(Operation::Write)?;
        tracing::debug!(path = %p, len = contents.len(), "write");
        self.adapter.write(&p, contents, opts)
    }

    pub fn read(&self, path: &str) -> FsResult<Vec<u8>> {
        let p = self.resolve(path)?;
        self.ensure(Operation::Read)?;
        self.adapter.read(&p)
    }

    pub fn delete(&self, path: &str) -> FsResult<()> {
        let p = self.resolve(path)?;
        self.ensure(Operation::Delete)?;
        tracing::debug!(path = %p, "delete");
        self.adapter.delete(&p)
    }

    /// Move `src` to `dst` (copy then remove source).
    pub fn rename(&self, src: &str, dst: &str) -> FsResult<()> {
        self.rename_with(src, dst, &WriteOptions::default())
    }

    pub fn rename_with(&self, src: &str, dst: &str, opts: &WriteOptions) -> FsResult<()> {
        let s = self.resolve(src)?;
        let d = self.resolve(dst)?;
        self.ensure(Operation::Move)?;
        tracing::debug!(src = %s, dst = %d, "move");
        self.adapter.rename(&s, &d, opts)
    }

    pub fn copy(&self, src: &str, dst: &str) -> FsResult<()> {
        self.copy_with(src, dst, &WriteOptions::default())
    }

    pub fn copy_with(&self, src: &str, dst: &str, opts: &WriteOptions) -> FsResult<()> {
        let s = self.resolve(src)?;
        let d = self.resolve(dst)?;
        self.ensure(Operation::Copy)?;
        tracing::debug!(src = %s, dst = %d, "copy");
        self.adapter.copy(&s, &d, opts)
    }

    /// Copy one file from this filesystem into another, possibly backed by a
    /// different adapter. Read-then-write; both sides must grant the
    /// operation.
    pub fn copy_between(&self, other: &Filesystem, src: &str, dst: &str) -> FsResult<()> {
        let s = self.resolve(src)?;
        let d = other.resolve(dst)?;
        self.ensure(Operation::CopyBetween)?;
        other.ensure(Operation::CopyBetween)?;
        tracing::debug!(src = %s, dst = %d, to = other.adapter_name(), "copy_between");
        let contents = self.adapter.read(&s)?;
        other.adapter.write(&d, &contents, &WriteOptions::default())
    }

    pub fn file_exists(&self, path: &str) -> FsResult<bool> {
        let p = self.resolve(path)?;
        self.ensure(Operation::FileExists)?;
        self.adapter.file_exists(&p)
    }

    pub fn list_contents(&self, path: &str) -> FsResult<Vec<EntryInfo>> {
        let p = self.resolve(path)?;
        self.ensure(Operation::ListContents)?;
        self.adapter.list_contents(&p)
    }

    pub fn create_directory(&self, path: &str) -> FsResult<()> {
        self.create_directory_with(path, &WriteOptions::default())
    }

    pub fn create_directory_with(&self, path: &str, opts: &WriteOptions) -> FsResult<()> {
        let p = self.resolve(path)?;
        self.ensure(Operation::CreateDirectory)?;
        self.adapter.create_directory(&p, opts)
    }

    /// Delete an empty directory; see [`Filesystem::delete_directory_with`]
    /// for recursive removal.
    pub fn delete_directory(&self, path: &str) -> FsResult<()> {
        self.delete_directory_with(path, &DirectoryDeleteOptions::default())
    }

    pub fn delete_directory_with(
        &self,
        path: &str,
        opts: &DirectoryDeleteOptions,
    ) -> FsResult<()> {
        let p = self.resolve(path)?;
        self.ensure(Operation::DeleteDirectory)?;
        tracing::debug!(path = %p, recursive = opts.recursive, "delete_directory");
        self.adapter.delete_directory(&p, opts)
    }

    /// Reset the store to an empty root.
    pub fn clear(&self) -> FsResult<()> {
        self.ensure(Operation::Clear)?;
        tracing::debug!(instance = self.instance_name(), "clear");
        self.adapter.clear()
    }

    pub fn set_visibility(&self, path: &str, visibility: Visibility) -> FsResult<()> {
        let p = self.resolve(path)?;
        self.ensure(Operation::SetVisibility)?;
        self.adapter.set_visibility(&p, visibility)
    }

    pub fn visibility(&self, path: &str) -> FsResult<Visibility> {
        let p = self.resolve(path)?;
        self.ensure(Operation::Visibility)?;
        self.adapter.visibility(&p)
    }

    // Extended operations ----------------------------------------------------

    pub fn stat(&self, path: &str) -> FsResult<EntryInfo> {
        let p = self.resolve(path)?;
        self.ensure(Operation::Stat)?;
        self.adapter.stat(&p)
    }

    pub fn access(&self, path: &str) -> FsResult<()> {
        let p = self.resolve(path)?;
        self.ensure(Operation::Access)?;
        self.adapter.access(&p)
    }

    pub fn append(&self, path: &str, contents: &[u8]) -> FsResult<()> {
        let p = self.resolve(path)?;
        self.ensure(Operation::Append)?;
        self.adapter.append(&p, contents)
    }

    pub fn truncate(&self, path: &str, len: u64) -> FsResult<()> {
        let p = self.resolve(path)?;
        self.ensure(Operation::Truncate)?;
        self.adapter.truncate(&p, len)
    }

    pub fn utime(&self, path: &str, mtime: i64) -> FsResult<()> {
        let p = self.resolve(path)?;
        self.ensure(Operation::Utime)?;
        self.adapter.utime(&p, mtime)
    }

    // Streaming --------------------------------------------------------------

    /// Chunked read with the adapter's configured default chunking.
    pub fn read_stream(&self, path: &str) -> FsResult<ReadStream> {
        self.read_stream_with(path, self.adapter.default_chunk_mode())
    }

    pub fn read_stream_with(&self, path: &str, mode: ChunkMode) -> FsResult<ReadStream> {
        let p = self.resolve(path)?;
        self.ensure(Operation::ReadStream)?;
        self.adapter.read_stream(&p, mode)
    }

    /// Buffered write sink; nothing becomes visible until its `commit`.
    pub fn write_stream(&self, path: &str) -> FsResult<WriteStream> {
        let p = self.resolve(path)?;
        self.ensure(Operation::WriteStream)?;
        self.adapter.write_stream(&p)
    }

    // Snapshot-class versioning ----------------------------------------------

    pub fn write_version(&self, path: &str, contents: &[u8]) -> FsResult<VersionRecord> {
        self.write_version_with(path, contents, &WriteOptions::default())
    }

    pub fn write_version_with(
        &self,
        path: &str,
        contents: &[u8],
        opts: &WriteOptions,
    ) -> FsResult<VersionRecord> {
        let p = self.resolve(path)?;
        self.ensure(Operation::WriteVersion)?;
        self.snapshot_module()?.write_version(&p, contents, opts)
    }

    pub fn list_versions(&self, path: &str) -> FsResult<Vec<VersionRecord>> {
        let p = self.resolve(path)?;
        self.ensure(Operation::ListVersions)?;
        self.snapshot_module()?.list_versions(&p)
    }

    pub fn get_latest_version(&self, path: &str) -> FsResult<VersionRecord> {
        let p = self.resolve(path)?;
        self.ensure(Operation::GetLatestVersion)?;
        self.snapshot_module()?.get_latest_version(&p)
    }

    pub fn read_version(&self, path: &str, version_id: &str) -> FsResult<Vec<u8>> {
        let p = self.resolve(path)?;
        self.ensure(Operation::ReadVersion)?;
        self.snapshot_module()?.read_version(&p, version_id)
    }

    pub fn restore_version(&self, path: &str, version_id: &str) -> FsResult<()> {
        let p = self.resolve(path)?;
        self.ensure(Operation::RestoreVersion)?;
        self.snapshot_module()?.restore_version(&p, version_id)
    }

    pub fn delete_version(&self, path: &str, version_id: &str) -> FsResult<()> {
        let p = self.resolve(path)?;
        self.ensure(Operation::DeleteVersion)?;
        self.snapshot_module()?.delete_version(&p, version_id)
    }

    // Checkpoint-class versioning --------------------------------------------

    pub fn commit(&self, message: Option<&str>) -> FsResult<Option<Checkpoint>> {
        self.ensure(Operation::Commit)?;
        tracing::debug!(instance = self.instance_name(), "commit");
        self.checkpoint_module()?.commit(message)
    }

    pub fn revisions(
        &self,
        path: Option<&str>,
        limit: Option<usize>,
    ) -> FsResult<Vec<Checkpoint>> {
        self.ensure(Operation::Revisions)?;
        let p = path.map(|raw| self.resolve(raw)).transpose()?;
        self.checkpoint_module()?.revisions(p.as_ref(), limit)
    }

    pub fn read_revision(&self, path: &str, sha: &str) -> FsResult<Vec<u8>> {
        let p = self.resolve(path)?;
        self.ensure(Operation::ReadRevision)?;
        self.checkpoint_module()?.read_revision(&p, sha)
    }

    pub fn rollback(&self, sha: &str, path: Option<&str>) -> FsResult<()> {
        self.ensure(Operation::Rollback)?;
        let p = path.map(|raw| self.resolve(raw)).transpose()?;
        tracing::debug!(instance = self.instance_name(), sha, "rollback");
        self.checkpoint_module()?.rollback(sha, p.as_ref())
    }

    /// The versioning class this filesystem's adapter exposes, if any.
    pub fn versioning_class(&self) -> Option<VersioningClass> {
        self.adapter.versioning_module()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use crate::store::MemoryAdapter;

    fn fs(name: &str) -> Filesystem {
        Filesystem::memory(StoreConfig::named(name)).unwrap()
    }

    #[test]
    fn test_traversal_is_rejected_before_dispatch() {
        let fs = fs("fs-traversal");
        let err = fs.read("../outside.txt").unwrap_err();
        assert_eq!(err.class(), ErrorClass::Invalid);
        let err = fs.write("/etc/passwd", b"x").unwrap_err();
        assert!(matches!(err, FsError::AbsolutePath { .. }));
        MemoryAdapter::drop_instance("fs-traversal");
    }

    #[test]
    fn test_versioning_class_gates_the_other_family() {
        let fs = fs("fs-gate");
        // Snapshot class by default, so checkpoint operations must refuse
        // without reaching the adapter.
        let err = fs.commit(Some("nope")).unwrap_err();
        assert!(matches!(
            err,
            FsError::UnsupportedOperation { operation: Operation::Commit, .. }
        ));
        assert!(fs.supports(Operation::WriteVersion));
        assert!(!fs.supports(Operation::Rollback));
        MemoryAdapter::drop_instance("fs-gate");
    }

    #[test]
    fn test_equivalent_spellings_hit_one_entry() {
        let fs = fs("fs-spellings");
        fs.write("a/b/./c.txt", b"data").unwrap();
        assert_eq!(fs.read("a//b/c.txt").unwrap(), b"data");
        assert!(fs.file_exists("a/b/x/../c.txt").unwrap());
        MemoryAdapter::drop_instance("fs-spellings");
    }
}
