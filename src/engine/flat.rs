//! Flat-table realization of the store engine: one ordered map keyed by the
//! joined path string, with explicit directory records so listings and
//! ancestor checks never guess. Subtree scans always bound-match on
//! `path + "/"`, never on a raw string prefix, so `foo` can never capture a
//! sibling `foobar`.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::error::{FsError, FsResult};
use crate::meta::{
    DirectoryDeleteOptions, EntryInfo, EntryKind, Metadata, Visibility, WriteOptions,
};
use crate::path::NormalizedPath;

use super::{SnapshotEntry, StoreEngine};

#[derive(Debug, Clone)]
enum FlatRecord {
    File { content: Vec<u8>, meta: Metadata },
    Dir { meta: Metadata },
}

impl FlatRecord {
    fn meta(&self) -> Metadata {
        match self {
            FlatRecord::File { meta, .. } | FlatRecord::Dir { meta } => *meta,
        }
    }

    fn kind(&self) -> EntryKind {
        match self {
            FlatRecord::File { .. } => EntryKind::File,
            FlatRecord::Dir { .. } => EntryKind::Directory,
        }
    }

    fn size(&self) -> u64 {
        match self {
            FlatRecord::File { content, .. } => content.len() as u64,
            FlatRecord::Dir { .. } => 0,
        }
    }
}

pub struct FlatEngine {
    records: BTreeMap<String, FlatRecord>,
    root_meta: Metadata,
    default_visibility: Visibility,
}

impl FlatEngine {
    /// Prefix under which immediate and transitive children live. Empty for
    /// the root (whose record is implicit and never stored).
    fn child_prefix(path: &NormalizedPath) -> String {
        if path.is_root() {
            String::new()
        } else {
            format!("{}/", path.as_str())
        }
    }

    /// Keys of the exact subtree rooted at `key` (the key itself excluded).
    fn subtree_keys(&self, key: &str) -> Vec<String> {
        let prefix = format!("{key}/");
        self.records
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn has_children(&self, key: &str) -> bool {
        let prefix = format!("{key}/");
        self.records
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&prefix))
    }

    fn remove_subtree(&mut self, key: &str) {
        for k in self.subtree_keys(key) {
            self.records.remove(&k);
        }
        self.records.remove(key);
    }

    /// Create any missing ancestor directory records; a file record on the
    /// way fails `NotDirectory`.
    fn ensure_ancestors(&mut self, path: &NormalizedPath, dir_visibility: Visibility) -> FsResult<()> {
        for anc in path.ancestors().into_iter().rev() {
            match self.records.get(anc.as_str()) {
                Some(FlatRecord::Dir { .. }) => {}
                Some(FlatRecord::File { .. }) => {
                    return Err(FsError::NotDirectory { path: anc.to_string() })
                }
                None => {
                    self.records
                        .insert(anc.to_string(), FlatRecord::Dir { meta: Metadata::now(dir_visibility) });
                }
            }
        }
        Ok(())
    }

    fn directory_conflict(path: &NormalizedPath) -> FsError {
        FsError::InvalidPath {
            path: path.to_string(),
            reason: "a directory occupies this path".to_string(),
        }
    }

    fn entry_info(key: &str, rec: &FlatRecord) -> EntryInfo {
        EntryInfo {
            name: key.rsplit('/').next().unwrap_or(key).to_string(),
            path: key.to_string(),
            kind: rec.kind(),
            size: rec.size(),
            metadata: rec.meta(),
        }
    }
}

impl StoreEngine for FlatEngine {
    const NAME: &'static str = "table";

    fn new(default_visibility: Visibility) -> Self {
        FlatEngine {
            records: BTreeMap::new(),
            root_meta: Metadata::now(default_visibility),
            default_visibility,
        }
    }

    fn write(
        &mut self,
        path: &NormalizedPath,
        contents: &[u8],
        opts: &WriteOptions,
    ) -> FsResult<()> {
        if path.is_root() {
            return Err(Self::directory_conflict(path));
        }
        let key = path.to_string();
        if let Some(FlatRecord::Dir { .. }) = self.records.get(&key) {
            return Err(Self::directory_conflict(path));
        }
        let dir_vis = opts.directory_visibility.unwrap_or(self.default_visibility);
        self.ensure_ancestors(path, dir_vis)?;
        let vis = opts.visibility.unwrap_or(self.default_visibility);
        self.records.insert(
            key,
            FlatRecord::File { content: contents.to_vec(), meta: Metadata::now(vis) },
        );
        Ok(())
    }

    fn read(&self, path: &NormalizedPath) -> FsResult<Vec<u8>> {
        match self.records.get(path.as_str()) {
            Some(FlatRecord::File { content, .. }) => Ok(content.clone()),
            _ => Err(FsError::file_not_found(path.as_str())),
        }
    }

    fn delete(&mut self, path: &NormalizedPath) -> FsResult<()> {
        if path.is_root() {
            return Err(Self::directory_conflict(path));
        }
        let key = path.to_string();
        match self.records.get(&key) {
            None => Ok(()), // idempotent
            Some(FlatRecord::File { .. }) => {
                self.records.remove(&key);
                Ok(())
            }
            Some(FlatRecord::Dir { .. }) => Err(Self::directory_conflict(path)),
        }
    }

    fn rename(
        &mut self,
        src: &NormalizedPath,
        dst: &NormalizedPath,
        opts: &WriteOptions,
    ) -> FsResult<()> {
        if src == dst {
            if self.records.contains_key(src.as_str()) {
                return Ok(());
            }
            return Err(FsError::file_not_found(src.as_str()));
        }
        self.copy(src, dst, opts)?;
        self.remove_subtree(src.as_str());
        Ok(())
    }

    fn copy(
        &mut self,
        src: &NormalizedPath,
        dst: &NormalizedPath,
        opts: &WriteOptions,
    ) -> FsResult<()> {
        if src.is_root() || dst.is_root() {
            return Err(Self::directory_conflict(if src.is_root() { src } else { dst }));
        }
        // a copy landing inside its own source would clobber part of the
        // source subtree before re-inserting it
        if dst.segments().starts_with(src.segments()) && dst.segments().len() > src.segments().len()
        {
            return Err(FsError::InvalidPath {
                path: dst.to_string(),
                reason: "destination is inside the source".to_string(),
            });
        }
        let src_key = src.to_string();
        let dst_key = dst.to_string();
        let Some(top) = self.records.get(&src_key).cloned() else {
            return Err(FsError::file_not_found(src_key.clone()));
        };
        if src == dst {
            return Ok(());
        }
        // Capture the whole source subtree before touching the map.
        let descendants: Vec<(String, FlatRecord)> = self
            .subtree_keys(&src_key)
            .into_iter()
            .filter_map(|k| self.records.get(&k).cloned().map(|r| (k, r)))
            .collect();

        self.remove_subtree(&dst_key);
        let dir_vis = opts.directory_visibility.unwrap_or(self.default_visibility);
        self.ensure_ancestors(dst, dir_vis)?;

        let mut top = top;
        match &mut top {
            FlatRecord::File { meta, .. } | FlatRecord::Dir { meta } => {
                if let Some(v) = opts.visibility {
                    meta.visibility = v;
                }
                meta.mtime = Utc::now().timestamp();
            }
        }
        self.records.insert(dst_key.clone(), top);
        for (k, rec) in descendants {
            let rebased = format!("{}{}", dst_key, &k[src_key.len()..]);
            self.records.insert(rebased, rec);
        }
        Ok(())
    }

    fn file_exists(&self, path: &NormalizedPath) -> FsResult<bool> {
        if path.is_root() {
            return Ok(true);
        }
        Ok(self.records.contains_key(path.as_str()))
    }

    fn list_contents(&self, path: &NormalizedPath) -> FsResult<Vec<EntryInfo>> {
        if !path.is_root() {
            match self.records.get(path.as_str()) {
                Some(FlatRecord::Dir { .. }) => {}
                Some(FlatRecord::File { .. }) => {
                    return Err(FsError::NotDirectory { path: path.to_string() })
                }
                None => return Err(FsError::directory_not_found(path.as_str())),
            }
        }
        let prefix = Self::child_prefix(path);
        let mut out = Vec::new();
        for (k, rec) in self.records.range(prefix.clone()..) {
            if !k.starts_with(&prefix) {
                break;
            }
            let rest = &k[prefix.len()..];
            if rest.contains('/') {
                continue; // deeper descendant; its parent has its own record
            }
            out.push(Self::entry_info(k, rec));
        }
        Ok(out)
    }

    fn create_directory(&mut self, path: &NormalizedPath, opts: &WriteOptions) -> FsResult<()> {
        if path.is_root() {
            return Ok(());
        }
        let key = path.to_string();
        let vis = opts
            .visibility
            .or(opts.directory_visibility)
            .unwrap_or(self.default_visibility);
        match self.records.get(&key) {
            Some(FlatRecord::File { .. }) => {
                return Err(FsError::InvalidPath {
                    path: key,
                    reason: "a file occupies this path".to_string(),
                })
            }
            Some(FlatRecord::Dir { .. }) => return Ok(()), // idempotent
            None => {}
        }
        self.ensure_ancestors(path, opts.directory_visibility.unwrap_or(vis))?;
        self.records.insert(key, FlatRecord::Dir { meta: Metadata::now(vis) });
        Ok(())
    }

    fn delete_directory(
        &mut self,
        path: &NormalizedPath,
        opts: &DirectoryDeleteOptions,
    ) -> FsResult<()> {
        if path.is_root() {
            return Err(FsError::InvalidPath {
                path: path.to_string(),
                reason: "the root directory cannot be deleted".to_string(),
            });
        }
        let key = path.to_string();
        match self.records.get(&key) {
            None => return Err(FsError::directory_not_found(key.clone())),
            Some(FlatRecord::File { .. }) => {
                return Err(FsError::NotDirectory { path: key })
            }
            Some(FlatRecord::Dir { .. }) => {}
        }
        if self.has_children(&key) && !opts.recursive {
            return Err(FsError::DirectoryNotEmpty { dir_path: key });
        }
        self.remove_subtree(&key);
        Ok(())
    }

    fn clear(&mut self) {
        self.records.clear();
        self.root_meta = Metadata::now(self.default_visibility);
    }

    fn set_visibility(&mut self, path: &NormalizedPath, visibility: Visibility) -> FsResult<()> {
        if path.is_root() {
            self.root_meta.visibility = visibility;
            return Ok(());
        }
        match self.records.get_mut(path.as_str()) {
            Some(FlatRecord::File { meta, .. }) | Some(FlatRecord::Dir { meta }) => {
                meta.visibility = visibility;
                Ok(())
            }
            None => Err(FsError::file_not_found(path.as_str())),
        }
    }

    fn visibility(&self, path: &NormalizedPath) -> FsResult<Visibility> {
        if path.is_root() {
            return Ok(self.root_meta.visibility);
        }
        match self.records.get(path.as_str()) {
            Some(rec) => Ok(rec.meta().visibility),
            None => Err(FsError::file_not_found(path.as_str())),
        }
    }

    fn stat(&self, path: &NormalizedPath) -> FsResult<EntryInfo> {
        if path.is_root() {
            return Ok(EntryInfo {
                name: ".".to_string(),
                path: ".".to_string(),
                kind: EntryKind::Directory,
                size: 0,
                metadata: self.root_meta,
            });
        }
        match self.records.get(path.as_str()) {
            Some(rec) => Ok(Self::entry_info(path.as_str(), rec)),
            None => Err(FsError::file_not_found(path.as_str())),
        }
    }

    fn access(&self, path: &NormalizedPath) -> FsResult<()> {
        if self.file_exists(path)? {
            Ok(())
        } else {
            Err(FsError::file_not_found(path.as_str()))
        }
    }

    fn append(&mut self, path: &NormalizedPath, contents: &[u8]) -> FsResult<()> {
        match self.records.get_mut(path.as_str()) {
            Some(FlatRecord::File { content, meta }) => {
                content.extend_from_slice(contents);
                meta.mtime = Utc::now().timestamp();
                Ok(())
            }
            Some(FlatRecord::Dir { .. }) => Err(Self::directory_conflict(path)),
            None => self.write(path, contents, &WriteOptions::default()),
        }
    }

    fn truncate(&mut self, path: &NormalizedPath, len: u64) -> FsResult<()> {
        match self.records.get_mut(path.as_str()) {
            Some(FlatRecord::File { content, meta }) => {
                content.resize(len as usize, 0);
                meta.mtime = Utc::now().timestamp();
                Ok(())
            }
            _ => Err(FsError::file_not_found(path.as_str())),
        }
    }

    fn utime(&mut self, path: &NormalizedPath, mtime: i64) -> FsResult<()> {
        if path.is_root() {
            self.root_meta.mtime = mtime;
            return Ok(());
        }
        match self.records.get_mut(path.as_str()) {
            Some(FlatRecord::File { meta, .. }) | Some(FlatRecord::Dir { meta }) => {
                meta.mtime = mtime;
                Ok(())
            }
            None => Err(FsError::file_not_found(path.as_str())),
        }
    }

    fn export_entries(&self) -> Vec<SnapshotEntry> {
        self.records
            .iter()
            .map(|(k, rec)| SnapshotEntry {
                path: k.clone(),
                kind: rec.kind(),
                content: match rec {
                    FlatRecord::File { content, .. } => Some(content.clone()),
                    FlatRecord::Dir { .. } => None,
                },
                metadata: rec.meta(),
            })
            .collect()
    }

    fn import_entries(&mut self, entries: &[SnapshotEntry]) -> FsResult<()> {
        self.clear();
        for e in entries {
            let rec = match e.kind {
                EntryKind::File => FlatRecord::File {
                    content: e.content.clone().unwrap_or_default(),
                    meta: e.metadata,
                },
                EntryKind::Directory => FlatRecord::Dir { meta: e.metadata },
            };
            self.records.insert(e.path.clone(), rec);
        }
        Ok(())
    }
}
