//! Ignore-file style exclusion.
//!
//! Patterns follow `.gitignore` conventions:
//!
//! | Pattern | Matches |
//! |---------|---------|
//! | `*.log` | any `.log` file at any depth |
//! | `dist/` | a directory named `dist` at any depth, and everything under it |
//! | `/build` | `build` at the root only |
//! | `docs/*.tmp` | anchored to the root because it contains `/` |
//!
//! Negations (`!pattern`) are not supported and are ignored. All patterns
//! are compiled once into [`GlobSet`]s and reused for every walk.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::debug;

use crate::data_source::FilesystemConfig;

/// Patterns every filesystem accessor excludes.
pub const DEFAULT_EXCLUDES: &[&str] = &[".git/", "node_modules/", "target/", ".DS_Store"];

#[derive(Debug, Clone)]
pub struct ExcludeMatcher {
    /// Matches files and directories alike.
    any: GlobSet,
    /// Matches directories only (patterns written with a trailing `/`).
    dirs: GlobSet,
}

impl ExcludeMatcher {
    pub fn new<I, S>(patterns: I) -> Result<Self, globset::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut any = GlobSetBuilder::new();
        let mut dirs = GlobSetBuilder::new();

        for raw in patterns {
            let line = raw.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('!') {
                debug!(pattern = line, "negated exclude patterns are not supported");
                continue;
            }

            let dir_only = line.ends_with('/');
            let body = line.trim_end_matches('/');
            let anchored = body.starts_with('/') || body.contains('/');
            let body = body.trim_start_matches('/');
            if body.is_empty() {
                continue;
            }

            let base = if anchored {
                body.to_string()
            } else {
                format!("**/{}", body)
            };

            if dir_only {
                dirs.add(glob(&base)?);
            } else {
                any.add(glob(&base)?);
            }
            any.add(glob(&format!("{}/**", base))?);
        }

        Ok(Self {
            any: any.build()?,
            dirs: dirs.build()?,
        })
    }

    /// Build the matcher for a filesystem data source: defaults, configured
    /// patterns, then the lines of the configured exclude file if present.
    pub fn for_config(root: &Path, cfg: &FilesystemConfig) -> Result<Self, globset::Error> {
        let mut patterns: Vec<String> = DEFAULT_EXCLUDES.iter().map(|p| p.to_string()).collect();
        patterns.extend(cfg.exclude_patterns.iter().cloned());

        if let Some(file) = &cfg.exclude_file {
            let path = root.join(file);
            match std::fs::read_to_string(&path) {
                Ok(content) => patterns.extend(content.lines().map(str::to_string)),
                Err(e) => debug!(path = %path.display(), error = %e, "exclude file not readable"),
            }
        }

        Self::new(patterns)
    }

    /// Whether a root-relative path (using `/` separators) is excluded.
    pub fn is_excluded(&self, rel_path: &str, is_dir: bool) -> bool {
        if rel_path.is_empty() {
            return false;
        }
        self.any.is_match(rel_path) || (is_dir && self.dirs.is_match(rel_path))
    }
}

fn glob(pattern: &str) -> Result<globset::Glob, globset::Error> {
    GlobBuilder::new(pattern).literal_separator(true).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(patterns: &[&str]) -> ExcludeMatcher {
        ExcludeMatcher::new(patterns.iter().copied()).unwrap()
    }

    #[test]
    fn unanchored_matches_at_any_depth() {
        let m = matcher(&["*.log"]);
        assert!(m.is_excluded("app.log", false));
        assert!(m.is_excluded("a/b/app.log", false));
        assert!(!m.is_excluded("app.txt", false));
    }

    #[test]
    fn directory_pattern_covers_contents() {
        let m = matcher(&["dist/"]);
        assert!(m.is_excluded("dist", true));
        assert!(!m.is_excluded("dist", false));
        assert!(m.is_excluded("pkg/dist/bundle.js", false));
    }

    #[test]
    fn slash_anchors_to_root() {
        let m = matcher(&["/build", "docs/*.tmp"]);
        assert!(m.is_excluded("build", true));
        assert!(m.is_excluded("build/out.o", false));
        assert!(!m.is_excluded("src/build", true));
        assert!(m.is_excluded("docs/a.tmp", false));
        assert!(!m.is_excluded("other/docs/a.tmp", false));
    }

    #[test]
    fn comments_and_negations_are_skipped() {
        let m = matcher(&["# comment", "!keep.log", ""]);
        assert!(!m.is_excluded("keep.log", false));
    }

    #[test]
    fn defaults_exclude_vcs_and_deps() {
        let m = ExcludeMatcher::for_config(Path::new("/nonexistent"), &FilesystemConfig::new("/x")).unwrap();
        assert!(m.is_excluded(".git", true));
        assert!(m.is_excluded(".git/HEAD", false));
        assert!(m.is_excluded("web/node_modules/left-pad/index.js", false));
        assert!(m.is_excluded("sub/.DS_Store", false));
        assert!(!m.is_excluded("src/lib.rs", false));
    }
}
