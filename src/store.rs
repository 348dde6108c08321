//! The two in-process adapters: `memory` (nested tree engine) and `table`
//! (flat ordered table engine). Both wrap an engine plus versioning state in
//! a registry-backed store actor, so handles opened under the same instance
//! name observe one serialized store.

use std::collections::BTreeSet;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::actor::ActorHandle;
use crate::adapter::{
    Adapter, CheckpointVersioning, Operation, SnapshotVersioning, VersioningClass,
};
use crate::engine::changelog::ChangeLog;
use crate::engine::flat::FlatEngine;
use crate::engine::tree::TreeEngine;
use crate::engine::versions::VersionStore;
use crate::engine::{SnapshotEntry, StoreEngine};
use crate::error::{FsError, FsResult};
use crate::meta::{
    Checkpoint, DirectoryDeleteOptions, EntryInfo, EntryKind, Visibility, VersionRecord,
    WriteOptions,
};
use crate::path::{normalize, NormalizedPath};
use crate::registry::Registry;
use crate::stream::{ChunkMode, MissingStreamBehavior, ReadStream, WriteStream, DEFAULT_CHUNK_SIZE};

fn default_versioning() -> Option<VersioningClass> {
    Some(VersioningClass::Snapshot)
}

fn default_author_name() -> String {
    "polyfs".to_string()
}

fn default_author_email() -> String {
    "polyfs@localhost".to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// Per-instance configuration. Only `name` is required; everything else has
/// a serde default so configs stay terse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Instance name, the registry key. Handles opened under the same name
    /// share one store.
    pub name: String,
    #[serde(default)]
    pub default_visibility: Visibility,
    /// Which versioning class this instance exposes, if any.
    #[serde(default = "default_versioning")]
    pub versioning: Option<VersioningClass>,
    /// Checkpoint class only: mint a checkpoint after every mutation instead
    /// of waiting for explicit `commit` calls.
    #[serde(default)]
    pub auto_commit: bool,
    #[serde(default = "default_author_name")]
    pub author_name: String,
    #[serde(default = "default_author_email")]
    pub author_email: String,
    /// `read_stream` policy for a nonexistent file.
    #[serde(default)]
    pub missing_read_stream: MissingStreamBehavior,
    /// Byte-mode chunk size used when a caller does not pick one.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl StoreConfig {
    pub fn named(name: impl Into<String>) -> Self {
        StoreConfig {
            name: name.into(),
            default_visibility: Visibility::default(),
            versioning: default_versioning(),
            auto_commit: false,
            author_name: default_author_name(),
            author_email: default_author_email(),
            missing_read_stream: MissingStreamBehavior::default(),
            chunk_size: default_chunk_size(),
        }
    }

    pub fn with_versioning(mut self, versioning: Option<VersioningClass>) -> Self {
        self.versioning = versioning;
        self
    }

    /// Parse a config from its JSON form; only `name` is required.
    pub fn from_json(raw: &str) -> FsResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| FsError::unknown("invalid store configuration", e))
    }
}

/// Everything the store actor owns: the engine plus versioning state. The
/// snapshot version store and the checkpoint log live here rather than in the
/// engines, so both engine representations version identically.
pub struct StoreState<E> {
    engine: E,
    versions: VersionStore,
    changelog: Option<ChangeLog>,
    /// The first opener's config; authoritative for every later handle.
    config: StoreConfig,
}

impl<E: StoreEngine> StoreState<E> {
    fn new(config: &StoreConfig) -> Self {
        let changelog = match config.versioning {
            Some(VersioningClass::Checkpoint) => {
                Some(ChangeLog::new(config.author_name.clone(), config.author_email.clone()))
            }
            _ => None,
        };
        StoreState {
            engine: E::new(config.default_visibility),
            versions: VersionStore::new(),
            changelog,
            config: config.clone(),
        }
    }

    /// Record a mutation in the checkpoint log (no-op without one) and, under
    /// auto-commit, finalize it immediately.
    fn log_mutation(&mut self, op: Operation, paths: &[&str]) -> FsResult<()> {
        let Some(log) = self.changelog.as_mut() else {
            return Ok(());
        };
        for p in paths {
            log.note(p);
        }
        if self.config.auto_commit && log.has_pending() {
            let message = match paths.first() {
                Some(p) => format!("{op} {p}"),
                None => op.to_string(),
            };
            let snapshot = self.engine.export_entries();
            log.commit(Some(&message), snapshot)?;
        }
        Ok(())
    }
}

static MEMORY_REGISTRY: Lazy<Registry<StoreState<TreeEngine>>> = Lazy::new(Registry::new);
static TABLE_REGISTRY: Lazy<Registry<StoreState<FlatEngine>>> = Lazy::new(Registry::new);

fn registry<E: StoreEngine>() -> &'static Registry<StoreState<E>>
where
    E: RegistryBacked,
{
    E::registry()
}

/// Ties each engine to its process-wide instance registry.
pub trait RegistryBacked: StoreEngine {
    fn registry() -> &'static Registry<StoreState<Self>>
    where
        Self: Sized;
}

impl RegistryBacked for TreeEngine {
    fn registry() -> &'static Registry<StoreState<TreeEngine>> {
        &MEMORY_REGISTRY
    }
}

impl RegistryBacked for FlatEngine {
    fn registry() -> &'static Registry<StoreState<FlatEngine>> {
        &TABLE_REGISTRY
    }
}

/// Adapter over one registered store instance. Cheap to clone-by-reopen; all
/// state lives behind the actor.
pub struct StoreAdapter<E: StoreEngine> {
    config: StoreConfig,
    handle: ActorHandle<StoreState<E>>,
}

/// Nested-tree in-memory store.
pub type MemoryAdapter = StoreAdapter<TreeEngine>;
/// Flat path-keyed table store.
pub type TableAdapter = StoreAdapter<FlatEngine>;

impl<E: RegistryBacked> StoreAdapter<E> {
    /// Open (or attach to) the named instance. The configuration of the
    /// first opener wins: later openers adopt the store's effective config,
    /// so capability answers always agree with the shared state.
    pub fn open(config: StoreConfig) -> FsResult<Self> {
        let init = config.clone();
        let handle = registry::<E>().get_or_spawn(&config.name, move || StoreState::new(&init))?;
        let effective = handle.call(|st| st.config.clone())?;
        if effective.versioning != config.versioning {
            tracing::warn!(
                instance = %config.name,
                "store already open; keeping its original versioning class"
            );
        }
        Ok(StoreAdapter { config: effective, handle })
    }

    /// Remove the named instance from the registry. Its actor exits once
    /// outstanding handles are dropped; reopening the name starts empty.
    pub fn drop_instance(name: &str) -> bool {
        registry::<E>().deregister(name)
    }

    pub fn instance_names() -> Vec<String> {
        registry::<E>().instance_names()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl<E: StoreEngine> Adapter for StoreAdapter<E> {
    fn adapter_name(&self) -> &'static str {
        E::NAME
    }

    fn instance_name(&self) -> &str {
        &self.config.name
    }

    fn write(&self, path: &NormalizedPath, contents: &[u8], opts: &WriteOptions) -> FsResult<()> {
        let p = path.clone();
        let contents = contents.to_vec();
        let opts = opts.clone();
        self.handle.call(move |st| -> FsResult<()> {
            st.engine.write(&p, &contents, &opts)?;
            st.log_mutation(Operation::Write, &[p.as_str()])
        })?
    }

    fn read(&self, path: &NormalizedPath) -> FsResult<Vec<u8>> {
        let p = path.clone();
        self.handle.call(move |st| st.engine.read(&p))?
    }

    fn delete(&self, path: &NormalizedPath) -> FsResult<()> {
        let p = path.clone();
        self.handle.call(move |st| -> FsResult<()> {
            st.engine.delete(&p)?;
            st.log_mutation(Operation::Delete, &[p.as_str()])
        })?
    }

    fn rename(
        &self,
        src: &NormalizedPath,
        dst: &NormalizedPath,
        opts: &WriteOptions,
    ) -> FsResult<()> {
        let (s, d, opts) = (src.clone(), dst.clone(), opts.clone());
        self.handle.call(move |st| -> FsResult<()> {
            st.engine.rename(&s, &d, &opts)?;
            st.log_mutation(Operation::Move, &[s.as_str(), d.as_str()])
        })?
    }

    fn copy(
        &self,
        src: &NormalizedPath,
        dst: &NormalizedPath,
        opts: &WriteOptions,
    ) -> FsResult<()> {
        let (s, d, opts) = (src.clone(), dst.clone(), opts.clone());
        self.handle.call(move |st| -> FsResult<()> {
            st.engine.copy(&s, &d, &opts)?;
            st.log_mutation(Operation::Copy, &[d.as_str()])
        })?
    }

    fn file_exists(&self, path: &NormalizedPath) -> FsResult<bool> {
        let p = path.clone();
        self.handle.call(move |st| st.engine.file_exists(&p))?
    }

    fn list_contents(&self, path: &NormalizedPath) -> FsResult<Vec<EntryInfo>> {
        let p = path.clone();
        self.handle.call(move |st| st.engine.list_contents(&p))?
    }

    fn create_directory(&self, path: &NormalizedPath, opts: &WriteOptions) -> FsResult<()> {
        let (p, opts) = (path.clone(), opts.clone());
        self.handle.call(move |st| -> FsResult<()> {
            st.engine.create_directory(&p, &opts)?;
            st.log_mutation(Operation::CreateDirectory, &[p.as_str()])
        })?
    }

    fn delete_directory(
        &self,
        path: &NormalizedPath,
        opts: &DirectoryDeleteOptions,
    ) -> FsResult<()> {
        let (p, opts) = (path.clone(), *opts);
        self.handle.call(move |st| -> FsResult<()> {
            st.engine.delete_directory(&p, &opts)?;
            st.log_mutation(Operation::DeleteDirectory, &[p.as_str()])
        })?
    }

    fn clear(&self) -> FsResult<()> {
        self.handle.call(move |st| -> FsResult<()> {
            let touched: Vec<String> =
                st.engine.export_entries().into_iter().map(|e| e.path).collect();
            st.engine.clear();
            st.versions.clear();
            let refs: Vec<&str> = touched.iter().map(String::as_str).collect();
            st.log_mutation(Operation::Clear, &refs)
        })?
    }

    fn set_visibility(&self, path: &NormalizedPath, visibility: Visibility) -> FsResult<()> {
        let p = path.clone();
        self.handle.call(move |st| -> FsResult<()> {
            st.engine.set_visibility(&p, visibility)?;
            st.log_mutation(Operation::SetVisibility, &[p.as_str()])
        })?
    }

    fn visibility(&self, path: &NormalizedPath) -> FsResult<Visibility> {
        let p = path.clone();
        self.handle.call(move |st| st.engine.visibility(&p))?
    }

    fn stat(&self, path: &NormalizedPath) -> FsResult<EntryInfo> {
        let p = path.clone();
        self.handle.call(move |st| st.engine.stat(&p))?
    }

    fn access(&self, path: &NormalizedPath) -> FsResult<()> {
        let p = path.clone();
        self.handle.call(move |st| st.engine.access(&p))?
    }

    fn append(&self, path: &NormalizedPath, contents: &[u8]) -> FsResult<()> {
        let p = path.clone();
        let contents = contents.to_vec();
        self.handle.call(move |st| -> FsResult<()> {
            st.engine.append(&p, &contents)?;
            st.log_mutation(Operation::Append, &[p.as_str()])
        })?
    }

    fn truncate(&self, path: &NormalizedPath, len: u64) -> FsResult<()> {
        let p = path.clone();
        self.handle.call(move |st| -> FsResult<()> {
            st.engine.truncate(&p, len)?;
            st.log_mutation(Operation::Truncate, &[p.as_str()])
        })?
    }

    fn utime(&self, path: &NormalizedPath, mtime: i64) -> FsResult<()> {
        let p = path.clone();
        self.handle.call(move |st| -> FsResult<()> {
            st.engine.utime(&p, mtime)?;
            st.log_mutation(Operation::Utime, &[p.as_str()])
        })?
    }

    fn default_chunk_mode(&self) -> ChunkMode {
        ChunkMode::Bytes(self.config.chunk_size)
    }

    fn read_stream(&self, path: &NormalizedPath, mode: ChunkMode) -> FsResult<ReadStream> {
        let p = path.clone();
        let missing = self.config.missing_read_stream;
        self.handle.call(move |st| -> FsResult<ReadStream> {
            match st.engine.read(&p) {
                Ok(bytes) => Ok(ReadStream::new(Arc::from(bytes), mode)),
                Err(e)
                    if e.is_not_found() && missing == MissingStreamBehavior::EmptyStream =>
                {
                    Ok(ReadStream::empty(mode))
                }
                Err(e) => Err(e),
            }
        })?
    }

    fn write_stream(&self, path: &NormalizedPath) -> FsResult<WriteStream> {
        let handle = self.handle.clone();
        let p = path.clone();
        let target = p.to_string();
        Ok(WriteStream::new(
            target,
            Box::new(move |buf| {
                handle.call(move |st| -> FsResult<()> {
                    st.engine.write(&p, &buf, &WriteOptions::default())?;
                    st.log_mutation(Operation::WriteStream, &[p.as_str()])
                })?
            }),
        ))
    }

    fn versioning_module(&self) -> Option<VersioningClass> {
        self.config.versioning
    }

    fn snapshot_versioning(&self) -> Option<&dyn SnapshotVersioning> {
        match self.config.versioning {
            Some(VersioningClass::Snapshot) => Some(self),
            _ => None,
        }
    }

    fn checkpoint_versioning(&self) -> Option<&dyn CheckpointVersioning> {
        match self.config.versioning {
            Some(VersioningClass::Checkpoint) => Some(self),
            _ => None,
        }
    }
}

impl<E: StoreEngine> SnapshotVersioning for StoreAdapter<E> {
    fn write_version(
        &self,
        path: &NormalizedPath,
        contents: &[u8],
        opts: &WriteOptions,
    ) -> FsResult<VersionRecord> {
        let (p, contents, opts) = (path.clone(), contents.to_vec(), opts.clone());
        self.handle.call(move |st| -> FsResult<VersionRecord> {
            st.engine.write(&p, &contents, &opts)?;
            let info = st.engine.stat(&p)?;
            Ok(st.versions.record(p.as_str(), &contents, info.metadata))
        })?
    }

    fn list_versions(&self, path: &NormalizedPath) -> FsResult<Vec<VersionRecord>> {
        let p = path.clone();
        self.handle.call(move |st| st.versions.list(p.as_str()))
    }

    fn get_latest_version(&self, path: &NormalizedPath) -> FsResult<VersionRecord> {
        let p = path.clone();
        self.handle.call(move |st| -> FsResult<VersionRecord> {
            st.versions
                .latest(p.as_str())
                .ok_or_else(|| FsError::file_not_found(p.as_str()))
        })?
    }

    fn read_version(&self, path: &NormalizedPath, version_id: &str) -> FsResult<Vec<u8>> {
        let (p, id) = (path.clone(), version_id.to_string());
        self.handle.call(move |st| -> FsResult<Vec<u8>> {
            st.versions
                .get(p.as_str(), &id)
                .map(|b| b.content.clone())
                .ok_or_else(|| FsError::file_not_found(format!("{p}@{id}")))
        })?
    }

    fn restore_version(&self, path: &NormalizedPath, version_id: &str) -> FsResult<()> {
        let (p, id) = (path.clone(), version_id.to_string());
        self.handle.call(move |st| -> FsResult<()> {
            let blob = st
                .versions
                .get(p.as_str(), &id)
                .cloned()
                .ok_or_else(|| FsError::file_not_found(format!("{p}@{id}")))?;
            let opts = WriteOptions::with_visibility(blob.metadata.visibility);
            st.engine.write(&p, &blob.content, &opts)?;
            st.engine.utime(&p, blob.metadata.mtime)
        })?
    }

    fn delete_version(&self, path: &NormalizedPath, version_id: &str) -> FsResult<()> {
        let (p, id) = (path.clone(), version_id.to_string());
        self.handle.call(move |st| -> FsResult<()> {
            if st.versions.remove(p.as_str(), &id) {
                Ok(())
            } else {
                Err(FsError::file_not_found(format!("{p}@{id}")))
            }
        })?
    }
}

impl<E: StoreEngine> CheckpointVersioning for StoreAdapter<E> {
    fn commit(&self, message: Option<&str>) -> FsResult<Option<Checkpoint>> {
        let adapter = self.adapter_name();
        let message = message.map(str::to_string);
        self.handle.call(move |st| -> FsResult<Option<Checkpoint>> {
            let snapshot = st.engine.export_entries();
            let log = st
                .changelog
                .as_mut()
                .ok_or_else(|| FsError::unsupported(Operation::Commit, adapter))?;
            log.commit(message.as_deref(), snapshot)
        })?
    }

    fn revisions(
        &self,
        path: Option<&NormalizedPath>,
        limit: Option<usize>,
    ) -> FsResult<Vec<Checkpoint>> {
        let adapter = self.adapter_name();
        let path = path.map(|p| p.to_string());
        self.handle.call(move |st| -> FsResult<Vec<Checkpoint>> {
            let log = st
                .changelog
                .as_ref()
                .ok_or_else(|| FsError::unsupported(Operation::Revisions, adapter))?;
            Ok(log.revisions(path.as_deref(), limit))
        })?
    }

    fn read_revision(&self, path: &NormalizedPath, sha: &str) -> FsResult<Vec<u8>> {
        let adapter = self.adapter_name();
        let (p, sha) = (path.clone(), sha.to_string());
        self.handle.call(move |st| -> FsResult<Vec<u8>> {
            let log = st
                .changelog
                .as_ref()
                .ok_or_else(|| FsError::unsupported(Operation::ReadRevision, adapter))?;
            log.read_revision(p.as_str(), &sha)
        })?
    }

    fn rollback(&self, sha: &str, path: Option<&NormalizedPath>) -> FsResult<()> {
        let adapter = self.adapter_name();
        let sha = sha.to_string();
        let path = path.cloned();
        self.handle.call(move |st| -> FsResult<()> {
            let touched = match &path {
                None => {
                    let snapshot = st
                        .changelog
                        .as_ref()
                        .ok_or_else(|| FsError::unsupported(Operation::Rollback, adapter))?
                        .snapshot_at(&sha)?
                        .to_vec();
                    let mut touched: BTreeSet<String> =
                        st.engine.export_entries().into_iter().map(|e| e.path).collect();
                    touched.extend(snapshot.iter().map(|e| e.path.clone()));
                    st.engine.import_entries(&snapshot)?;
                    touched
                }
                Some(p) => {
                    let prefix = format!("{}/", p.as_str());
                    let (entry, descendants) = {
                        let log = st
                            .changelog
                            .as_ref()
                            .ok_or_else(|| FsError::unsupported(Operation::Rollback, adapter))?;
                        let entry = log.entry_at(&sha, p.as_str())?;
                        // The checkpoint snapshot lists parents before their
                        // children, so replaying in order re-materializes the
                        // subtree as it was.
                        let descendants: Vec<SnapshotEntry> = log
                            .snapshot_at(&sha)?
                            .iter()
                            .filter(|e| e.path.starts_with(&prefix))
                            .cloned()
                            .collect();
                        (entry, descendants)
                    };
                    let mut touched: BTreeSet<String> = st
                        .engine
                        .export_entries()
                        .into_iter()
                        .map(|e| e.path)
                        .filter(|k| k.as_str() == p.as_str() || k.starts_with(&prefix))
                        .collect();
                    touched.insert(p.to_string());
                    touched.extend(descendants.iter().map(|e| e.path.clone()));

                    // Drop whatever occupies the path now, subtree included,
                    // so entries added since the checkpoint do not survive.
                    match st.engine.stat(p) {
                        Ok(info) if info.kind == EntryKind::Directory => {
                            st.engine.delete_directory(p, &DirectoryDeleteOptions::recursive())?
                        }
                        Ok(_) => st.engine.delete(p)?,
                        Err(e) if e.is_not_found() => {}
                        Err(e) => return Err(e),
                    }
                    apply_snapshot_entry(&mut st.engine, &entry)?;
                    for e in &descendants {
                        apply_snapshot_entry(&mut st.engine, e)?;
                    }
                    touched
                }
            };
            // Restored paths go into the pending set so an explicit commit
            // afterwards can checkpoint the rolled-back state. No checkpoint
            // is minted here outside auto-commit.
            let refs: Vec<&str> = touched.iter().map(String::as_str).collect();
            st.log_mutation(Operation::Rollback, &refs)
        })?
    }
}

/// Materialize one checkpoint snapshot entry into the engine, metadata
/// included.
fn apply_snapshot_entry<E: StoreEngine>(engine: &mut E, entry: &SnapshotEntry) -> FsResult<()> {
    let p = normalize(&entry.path)?;
    match entry.kind {
        EntryKind::File => {
            let content = entry.content.clone().unwrap_or_default();
            let opts = WriteOptions::with_visibility(entry.metadata.visibility);
            engine.write(&p, &content, &opts)?;
        }
        EntryKind::Directory => {
            let opts = WriteOptions {
                visibility: Some(entry.metadata.visibility),
                ..WriteOptions::default()
            };
            engine.create_directory(&p, &opts)?;
        }
    }
    engine.utime(&p, entry.metadata.mtime)
}
