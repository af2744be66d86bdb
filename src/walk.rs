//! Sandboxed, exclude-filtered directory walks.
//!
//! Every traversal of a filesystem data source (listing, search, metadata
//! scan, suggestions) goes through a [`Walker`]. Walks are synchronous
//! (`walkdir`) and are run by callers inside `spawn_blocking`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::{DirEntry, WalkDir};

use crate::exclude::ExcludeMatcher;

#[derive(Debug, Clone)]
pub(crate) struct Walker {
    root: PathBuf,
    canonical_root: PathBuf,
    follow_links: bool,
    strict_root: bool,
    excludes: Arc<ExcludeMatcher>,
}

impl Walker {
    pub fn new(
        root: PathBuf,
        canonical_root: PathBuf,
        follow_links: bool,
        strict_root: bool,
        excludes: Arc<ExcludeMatcher>,
    ) -> Self {
        Self {
            root,
            canonical_root,
            follow_links,
            strict_root,
            excludes,
        }
    }

    pub fn with_follow_links(&self, follow_links: bool) -> Self {
        Self {
            follow_links,
            ..self.clone()
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root-relative path with `/` separators.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.to_string_lossy().replace('\\', "/")
    }

    /// Walk `start` (inclusive of descendants only) in file-name order.
    ///
    /// Excluded entries are pruned together with their subtrees. Under a
    /// strict root, symlinks resolving outside the root are pruned as well.
    pub fn walk<'a>(
        &'a self,
        start: &Path,
        max_depth: Option<usize>,
    ) -> impl Iterator<Item = walkdir::Result<DirEntry>> + 'a {
        let mut walker = WalkDir::new(start)
            .min_depth(1)
            .follow_links(self.follow_links)
            .sort_by_file_name();
        if let Some(depth) = max_depth {
            walker = walker.max_depth(depth);
        }
        walker.into_iter().filter_entry(move |entry| self.admits(entry))
    }

    fn admits(&self, entry: &DirEntry) -> bool {
        let rel = self.relative(entry.path());
        if self.excludes.is_excluded(&rel, entry.file_type().is_dir()) {
            return false;
        }
        if self.strict_root && entry.path_is_symlink() {
            return match std::fs::canonicalize(entry.path()) {
                Ok(real) => real.starts_with(&self.canonical_root),
                Err(_) => false,
            };
        }
        true
    }
}
