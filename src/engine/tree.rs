//! Nested-map realization of the store engine: a true tree of directory
//! nodes, each holding its children by name.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::error::{FsError, FsResult};
use crate::meta::{
    DirectoryDeleteOptions, EntryInfo, EntryKind, Metadata, Visibility, WriteOptions,
};
use crate::path::{normalize, NormalizedPath};

use super::{SnapshotEntry, StoreEngine};

#[derive(Debug, Clone)]
enum Node {
    File { content: Vec<u8>, meta: Metadata },
    Dir { children: BTreeMap<String, Node>, meta: Metadata },
}

impl Node {
    fn dir(meta: Metadata) -> Node {
        Node::Dir { children: BTreeMap::new(), meta }
    }

    fn meta(&self) -> Metadata {
        match self {
            Node::File { meta, .. } | Node::Dir { meta, .. } => *meta,
        }
    }

    fn meta_mut(&mut self) -> &mut Metadata {
        match self {
            Node::File { meta, .. } | Node::Dir { meta, .. } => meta,
        }
    }

    fn kind(&self) -> EntryKind {
        match self {
            Node::File { .. } => EntryKind::File,
            Node::Dir { .. } => EntryKind::Directory,
        }
    }

    fn size(&self) -> u64 {
        match self {
            Node::File { content, .. } => content.len() as u64,
            Node::Dir { .. } => 0,
        }
    }
}

pub struct TreeEngine {
    root: BTreeMap<String, Node>,
    root_meta: Metadata,
    default_visibility: Visibility,
}

impl TreeEngine {
    fn node(&self, segments: &[String]) -> Option<&Node> {
        let (first, rest) = segments.split_first()?;
        let mut node = self.root.get(first)?;
        for seg in rest {
            match node {
                Node::Dir { children, .. } => node = children.get(seg)?,
                Node::File { .. } => return None,
            }
        }
        Some(node)
    }

    fn node_mut(&mut self, segments: &[String]) -> Option<&mut Node> {
        let (first, rest) = segments.split_first()?;
        let mut node = self.root.get_mut(first)?;
        for seg in rest {
            match node {
                Node::Dir { children, .. } => node = children.get_mut(seg)?,
                Node::File { .. } => return None,
            }
        }
        Some(node)
    }

    /// Children of the directory at `segments` (the root for an empty slice).
    fn children_at(&self, segments: &[String]) -> Option<&BTreeMap<String, Node>> {
        if segments.is_empty() {
            return Some(&self.root);
        }
        match self.node(segments)? {
            Node::Dir { children, .. } => Some(children),
            Node::File { .. } => None,
        }
    }

    fn children_at_mut(&mut self, segments: &[String]) -> Option<&mut BTreeMap<String, Node>> {
        if segments.is_empty() {
            return Some(&mut self.root);
        }
        match self.node_mut(segments)? {
            Node::Dir { children, .. } => Some(children),
            Node::File { .. } => None,
        }
    }

    /// Walk to the parent of `path`, creating missing directories along the
    /// way (write-through auto-materialization). A file occupying an
    /// intermediate segment fails `NotDirectory`.
    fn materialize_parent(
        &mut self,
        path: &NormalizedPath,
        dir_visibility: Visibility,
    ) -> FsResult<&mut BTreeMap<String, Node>> {
        let segments = path.segments();
        let parent = &segments[..segments.len().saturating_sub(1)];
        let mut cur = &mut self.root;
        let mut walked: Vec<&str> = Vec::with_capacity(parent.len());
        for seg in parent {
            walked.push(seg);
            let entry = cur
                .entry(seg.clone())
                .or_insert_with(|| Node::dir(Metadata::now(dir_visibility)));
            match entry {
                Node::Dir { children, .. } => cur = children,
                Node::File { .. } => {
                    return Err(FsError::NotDirectory { path: walked.join("/") })
                }
            }
        }
        Ok(cur)
    }

    fn file_name_of(path: &NormalizedPath) -> FsResult<String> {
        path.file_name().map(|s| s.to_string()).ok_or_else(|| FsError::InvalidPath {
            path: path.to_string(),
            reason: "the root directory is not a valid target here".to_string(),
        })
    }

    fn directory_conflict(path: &NormalizedPath) -> FsError {
        FsError::InvalidPath {
            path: path.to_string(),
            reason: "a directory occupies this path".to_string(),
        }
    }
}

impl StoreEngine for TreeEngine {
    const NAME: &'static str = "memory";

    fn new(default_visibility: Visibility) -> Self {
        TreeEngine {
            root: BTreeMap::new(),
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
        let name = Self::file_name_of(path)?;
        let vis = opts.visibility.unwrap_or(self.default_visibility);
        let dir_vis = opts.directory_visibility.unwrap_or(self.default_visibility);
        let parent = self.materialize_parent(path, dir_vis)?;
        if let Some(Node::Dir { .. }) = parent.get(&name) {
            return Err(Self::directory_conflict(path));
        }
        parent.insert(name, Node::File { content: contents.to_vec(), meta: Metadata::now(vis) });
        Ok(())
    }

    fn read(&self, path: &NormalizedPath) -> FsResult<Vec<u8>> {
        match self.node(path.segments()) {
            Some(Node::File { content, .. }) => Ok(content.clone()),
            _ => Err(FsError::file_not_found(path.as_str())),
        }
    }

    fn delete(&mut self, path: &NormalizedPath) -> FsResult<()> {
        if path.is_root() {
            return Err(Self::directory_conflict(path));
        }
        let name = Self::file_name_of(path)?;
        let segments = path.segments();
        let Some(children) = self.children_at_mut(&segments[..segments.len() - 1]) else {
            return Ok(()); // parent absent, so the file is absent: idempotent success
        };
        match children.get(&name) {
            None => Ok(()),
            Some(Node::File { .. }) => {
                children.remove(&name);
                Ok(())
            }
            Some(Node::Dir { .. }) => Err(Self::directory_conflict(path)),
        }
    }

    fn rename(
        &mut self,
        src: &NormalizedPath,
        dst: &NormalizedPath,
        opts: &WriteOptions,
    ) -> FsResult<()> {
        if src == dst {
            // still require the source to exist
            return self.node(src.segments()).map(|_| ()).map_or_else(
                || Err(FsError::file_not_found(src.as_str())),
                Ok,
            );
        }
        self.copy(src, dst, opts)?;
        let name = Self::file_name_of(src)?;
        let segments = src.segments();
        if let Some(children) = self.children_at_mut(&segments[..segments.len() - 1]) {
            children.remove(&name);
        }
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
        // a copy landing inside its own source would clone the subtree into
        // itself and mutate the source on the way
        if dst.segments().starts_with(src.segments()) && dst.segments().len() > src.segments().len()
        {
            return Err(FsError::InvalidPath {
                path: dst.to_string(),
                reason: "destination is inside the source".to_string(),
            });
        }
        let mut node = self
            .node(src.segments())
            .cloned()
            .ok_or_else(|| FsError::file_not_found(src.as_str()))?;
        if src == dst {
            return Ok(());
        }
        if let Some(v) = opts.visibility {
            node.meta_mut().visibility = v;
        }
        node.meta_mut().mtime = Utc::now().timestamp();
        let dir_vis = opts.directory_visibility.unwrap_or(self.default_visibility);
        let name = Self::file_name_of(dst)?;
        let parent = self.materialize_parent(dst, dir_vis)?;
        parent.insert(name, node);
        Ok(())
    }

    fn file_exists(&self, path: &NormalizedPath) -> FsResult<bool> {
        if path.is_root() {
            return Ok(true);
        }
        Ok(self.node(path.segments()).is_some())
    }

    fn list_contents(&self, path: &NormalizedPath) -> FsResult<Vec<EntryInfo>> {
        let children = if path.is_root() {
            &self.root
        } else {
            match self.node(path.segments()) {
                Some(Node::Dir { children, .. }) => children,
                Some(Node::File { .. }) => {
                    return Err(FsError::NotDirectory { path: path.to_string() })
                }
                None => return Err(FsError::directory_not_found(path.as_str())),
            }
        };
        Ok(children
            .iter()
            .map(|(name, node)| EntryInfo {
                name: name.clone(),
                path: path.join(name).to_string(),
                kind: node.kind(),
                size: node.size(),
                metadata: node.meta(),
            })
            .collect())
    }

    fn create_directory(&mut self, path: &NormalizedPath, opts: &WriteOptions) -> FsResult<()> {
        if path.is_root() {
            return Ok(()); // the root always exists
        }
        let vis = opts
            .visibility
            .or(opts.directory_visibility)
            .unwrap_or(self.default_visibility);
        let dir_vis = opts.directory_visibility.unwrap_or(vis);
        let name = Self::file_name_of(path)?;
        let parent = self.materialize_parent(path, dir_vis)?;
        match parent.get(&name) {
            Some(Node::File { .. }) => Err(FsError::InvalidPath {
                path: path.to_string(),
                reason: "a file occupies this path".to_string(),
            }),
            Some(Node::Dir { .. }) => Ok(()), // idempotent
            None => {
                parent.insert(name, Node::dir(Metadata::now(vis)));
                Ok(())
            }
        }
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
        match self.node(path.segments()) {
            None => return Err(FsError::directory_not_found(path.as_str())),
            Some(Node::File { .. }) => return Err(FsError::NotDirectory { path: path.to_string() }),
            Some(Node::Dir { children, .. }) => {
                if !children.is_empty() && !opts.recursive {
                    return Err(FsError::DirectoryNotEmpty { dir_path: path.to_string() });
                }
            }
        }
        let name = Self::file_name_of(path)?;
        let segments = path.segments();
        if let Some(children) = self.children_at_mut(&segments[..segments.len() - 1]) {
            children.remove(&name);
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.root.clear();
        self.root_meta = Metadata::now(self.default_visibility);
    }

    fn set_visibility(&mut self, path: &NormalizedPath, visibility: Visibility) -> FsResult<()> {
        if path.is_root() {
            self.root_meta.visibility = visibility;
            return Ok(());
        }
        match self.node_mut(path.segments()) {
            Some(node) => {
                node.meta_mut().visibility = visibility;
                Ok(())
            }
            None => Err(FsError::file_not_found(path.as_str())),
        }
    }

    fn visibility(&self, path: &NormalizedPath) -> FsResult<Visibility> {
        if path.is_root() {
            return Ok(self.root_meta.visibility);
        }
        match self.node(path.segments()) {
            Some(node) => Ok(node.meta().visibility),
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
        match self.node(path.segments()) {
            Some(node) => Ok(EntryInfo {
                name: path.file_name().unwrap_or_default().to_string(),
                path: path.to_string(),
                kind: node.kind(),
                size: node.size(),
                metadata: node.meta(),
            }),
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
        match self.node_mut(path.segments()) {
            Some(Node::File { content, meta }) => {
                content.extend_from_slice(contents);
                meta.mtime = Utc::now().timestamp();
                Ok(())
            }
            Some(Node::Dir { .. }) => Err(Self::directory_conflict(path)),
            None => self.write(path, contents, &WriteOptions::default()),
        }
    }

    fn truncate(&mut self, path: &NormalizedPath, len: u64) -> FsResult<()> {
        match self.node_mut(path.segments()) {
            Some(Node::File { content, meta }) => {
                content.resize(len as usize, 0); // zero-pads when growing
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
        match self.node_mut(path.segments()) {
            Some(node) => {
                node.meta_mut().mtime = mtime;
                Ok(())
            }
            None => Err(FsError::file_not_found(path.as_str())),
        }
    }

    fn export_entries(&self) -> Vec<SnapshotEntry> {
        fn walk(prefix: &str, children: &BTreeMap<String, Node>, out: &mut Vec<SnapshotEntry>) {
            for (name, node) in children {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}/{name}")
                };
                match node {
                    Node::File { content, meta } => out.push(SnapshotEntry {
                        path,
                        kind: EntryKind::File,
                        content: Some(content.clone()),
                        metadata: *meta,
                    }),
                    Node::Dir { children, meta } => {
                        out.push(SnapshotEntry {
                            path: path.clone(),
                            kind: EntryKind::Directory,
                            content: None,
                            metadata: *meta,
                        });
                        walk(&path, children, out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        walk("", &self.root, &mut out);
        out
    }

    fn import_entries(&mut self, entries: &[SnapshotEntry]) -> FsResult<()> {
        self.clear();
        for e in entries {
            let p = normalize(&e.path)?;
            let name = Self::file_name_of(&p)?;
            let default_vis = self.default_visibility;
            let parent = self.materialize_parent(&p, default_vis)?;
            let node = match e.kind {
                EntryKind::File => Node::File {
                    content: e.content.clone().unwrap_or_default(),
                    meta: e.metadata,
                },
                EntryKind::Directory => Node::Dir { children: BTreeMap::new(), meta: e.metadata },
            };
            parent.insert(name, node);
        }
        Ok(())
    }
}
