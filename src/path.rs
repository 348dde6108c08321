//! Logical path normalization and traversal defense.
//! Runs once at the dispatch boundary so every adapter inherits the same rules
//! and never needs to re-validate.

use std::fmt;

use crate::error::{FsError, FsResult};

/// A validated, normalized relative path. Root is the empty segment list and
/// renders as `.`. Never contains `.`/`..` segments, empty segments or a
/// leading `/`.
#[derive(Debug, Clone)]
pub struct NormalizedPath {
    segments: Vec<String>,
    /// Joined `a/b/c` form (`.` for the root), kept alongside the segments
    /// so `as_str` is free.
    joined: String,
    /// A trailing `/` on the raw input marks directory intent; it does not
    /// change identity, so it is excluded from Eq/Hash/Ord below.
    dir_intent: bool,
}

impl PartialEq for NormalizedPath {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for NormalizedPath {}

impl std::hash::Hash for NormalizedPath {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

impl PartialOrd for NormalizedPath {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NormalizedPath {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.segments.cmp(&other.segments)
    }
}

impl NormalizedPath {
    fn from_segments(segments: Vec<String>, dir_intent: bool) -> Self {
        let joined = if segments.is_empty() { ".".to_string() } else { segments.join("/") };
        NormalizedPath { segments, joined, dir_intent }
    }

    pub fn root() -> Self {
        Self::from_segments(Vec::new(), true)
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn dir_intent(&self) -> bool {
        self.dir_intent
    }

    /// Joined `a/b/c` form; `.` for the root.
    pub fn as_str(&self) -> &str {
        &self.joined
    }

    /// Final segment, if any (root has none).
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_str())
    }

    /// Parent path; the root's parent is the root itself.
    pub fn parent(&self) -> NormalizedPath {
        let mut segments = self.segments.clone();
        segments.pop();
        Self::from_segments(segments, true)
    }

    /// Append one already-validated segment (used by the engines when walking
    /// listings; never fed raw caller input).
    pub fn join(&self, segment: &str) -> NormalizedPath {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self::from_segments(segments, false)
    }

    /// Proper ancestors, nearest first, excluding the root.
    pub fn ancestors(&self) -> Vec<NormalizedPath> {
        let mut out = Vec::new();
        let mut cur = self.parent();
        while !cur.is_root() {
            out.push(cur.clone());
            cur = cur.parent();
        }
        out
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a caller-supplied path. Pure; no adapter is consulted.
/// - redundant slashes and `.` segments are dropped
/// - `..` resolves against the already-resolved prefix
/// - `..` crossing above the root fails `PathTraversal`
/// - a leading `/` fails `AbsolutePath` (never silently rooted)
/// - NUL bytes fail `InvalidPath`
pub fn normalize(raw: &str) -> FsResult<NormalizedPath> {
    if raw.contains('\u{0000}') {
        return Err(FsError::InvalidPath {
            path: raw.to_string(),
            reason: "NUL character in path".to_string(),
        });
    }
    if raw.starts_with('/') {
        return Err(FsError::AbsolutePath { absolute_path: raw.to_string() });
    }
    let dir_intent = raw.is_empty() || raw.ends_with('/') || raw == "." || raw.ends_with("/.");

    let mut segments: Vec<String> = Vec::new();
    for seg in raw.split('/') {
        match seg {
            "" | "." => continue,
            ".." => {
                if segments.pop().is_none() {
                    return Err(FsError::PathTraversal { attempted_path: raw.to_string() });
                }
            }
            s => segments.push(s.to_string()),
        }
    }
    Ok(NormalizedPath::from_segments(segments, dir_intent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    #[test]
    fn test_plain_and_redundant_slashes() {
        assert_eq!(normalize("a/b/c.txt").unwrap().as_str(), "a/b/c.txt");
        assert_eq!(normalize("a//b///c").unwrap().as_str(), "a/b/c");
        assert_eq!(normalize("./a/./b").unwrap().as_str(), "a/b");
    }

    #[test]
    fn test_root_forms() {
        for raw in ["", ".", "./"] {
            let p = normalize(raw).unwrap();
            assert!(p.is_root());
            assert_eq!(p.as_str(), ".");
        }
    }

    #[test]
    fn test_dotdot_resolution() {
        assert_eq!(normalize("a/b/../c").unwrap().as_str(), "a/c");
        assert_eq!(normalize("a/b/../../d").unwrap().as_str(), "d");
        assert_eq!(normalize("a/..").unwrap().as_str(), ".");
    }

    #[test]
    fn test_traversal_rejected() {
        for raw in ["..", "../evil.txt", "a/../../b", "a/../.."] {
            match normalize(raw) {
                Err(FsError::PathTraversal { attempted_path }) => assert_eq!(attempted_path, raw),
                other => panic!("expected PathTraversal for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_absolute_rejected() {
        match normalize("/etc/passwd") {
            Err(FsError::AbsolutePath { absolute_path }) => {
                assert_eq!(absolute_path, "/etc/passwd")
            }
            other => panic!("expected AbsolutePath, got {other:?}"),
        }
    }

    #[test]
    fn test_nul_rejected() {
        let with_nul = "a\u{0000}b";
        assert_eq!(normalize(with_nul).unwrap_err().class(), ErrorClass::Invalid);
    }

    #[test]
    fn test_trailing_slash_is_intent_not_identity() {
        let a = normalize("folder").unwrap();
        let b = normalize("folder/").unwrap();
        assert_eq!(a, b);
        assert!(!a.dir_intent());
        assert!(b.dir_intent());
    }

    #[test]
    fn test_parent_and_ancestors() {
        let p = normalize("a/b/c.txt").unwrap();
        assert_eq!(p.parent().as_str(), "a/b");
        assert_eq!(p.file_name(), Some("c.txt"));
        let anc: Vec<String> = p.ancestors().iter().map(|a| a.as_str().to_string()).collect();
        assert_eq!(anc, vec!["a/b".to_string(), "a".to_string()]);
        assert!(NormalizedPath::root().parent().is_root());
    }
}
