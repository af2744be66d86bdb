//! Aggregate statistics for a filesystem data source.
//!
//! [`scan_blocking`] walks the whole tree once (exclude-filtered, unlimited
//! depth). Entries that cannot be read or stat'ed are counted as restricted
//! areas and the scan carries on.

use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

use crate::mime::{detect_mime, is_binary_mime};
use crate::models::DataSourceMetadata;
use crate::walk::Walker;

/// Prefix of the sentinel file used by the write probe.
pub const WRITE_PROBE_PREFIX: &str = ".rh-write-probe-";

pub(crate) fn scan_blocking(walker: &Walker) -> DataSourceMetadata {
    let mut stats = DataSourceMetadata::default();

    for entry in walker.walk(walker.root(), None) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "restricted entry during scan");
                stats.has_restricted_areas = true;
                continue;
            }
        };
        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "cannot stat entry");
                stats.has_restricted_areas = true;
                continue;
            }
        };

        if meta.is_dir() {
            stats.total_directories += 1;
            continue;
        }
        if !meta.is_file() {
            continue;
        }

        stats.total_files += 1;
        let ext = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        *stats.extension_counts.entry(ext).or_insert(0) += 1;

        let size = meta.len();
        stats.largest_file_size = stats.largest_file_size.max(size);
        if size == 0 {
            stats.empty_files += 1;
        }
        if is_binary_mime(detect_mime(entry.path())) {
            stats.binary_files += 1;
        } else {
            stats.text_files += 1;
        }

        if let Ok(modified) = meta.modified() {
            let modified = DateTime::<Utc>::from(modified);
            if stats.oldest_modified.map_or(true, |o| modified < o) {
                stats.oldest_modified = Some(modified);
            }
            if stats.newest_modified.map_or(true, |n| modified > n) {
                stats.newest_modified = Some(modified);
            }
        }
    }

    stats.last_scanned = Some(Utc::now());
    stats
}

/// Create and delete a sentinel file under `root`.
pub(crate) async fn probe_write(root: &Path) -> bool {
    let sentinel = root.join(format!("{}{}", WRITE_PROBE_PREFIX, Uuid::new_v4()));
    if let Err(e) = tokio::fs::write(&sentinel, b"").await {
        debug!(root = %root.display(), error = %e, "write probe failed");
        return false;
    }
    if let Err(e) = tokio::fs::remove_file(&sentinel).await {
        debug!(path = %sentinel.display(), error = %e, "write probe sentinel not removed");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclude::ExcludeMatcher;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn walker(root: &Path) -> Walker {
        let excludes = ExcludeMatcher::new([".git/"]).unwrap();
        Walker::new(
            root.to_path_buf(),
            root.canonicalize().unwrap(),
            true,
            true,
            Arc::new(excludes),
        )
    }

    #[test]
    fn tallies_files_and_extensions() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "ref").unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join("README.md"), "").unwrap();
        std::fs::write(dir.path().join("logo.png"), [1u8, 2, 3]).unwrap();

        let stats = scan_blocking(&walker(dir.path()));
        assert_eq!(stats.total_directories, 1);
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.extension_counts.get("rs"), Some(&1));
        assert_eq!(stats.extension_counts.get("md"), Some(&1));
        assert_eq!(stats.empty_files, 1);
        assert_eq!(stats.binary_files, 1);
        assert_eq!(stats.text_files, 2);
        assert_eq!(stats.largest_file_size, 12);
        assert!(stats.oldest_modified.is_some());
        assert!(!stats.has_restricted_areas);
    }

    #[tokio::test]
    async fn write_probe_leaves_no_sentinel() {
        let dir = TempDir::new().unwrap();
        assert!(probe_write(dir.path()).await);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(!probe_write(&dir.path().join("missing")).await);
    }
}
