//! Path autocompletion for filesystem data sources.
//!
//! A partial path is turned into one or more case-insensitive globs:
//!
//! | Partial | Globs |
//! |---------|-------|
//! | `` (empty) | `*` |
//! | `src/` | `src/**` |
//! | `*.rs`, `{a,b}.md` | `**/*.rs`, `**/{a,b}.md` |
//! | `docs/*.md` | `docs/*.md` |
//! | `read` | `**/read*`, `**/read*/**` |
//! | `src/ma` | `src/ma*`, `src/ma*/**` |
//!
//! The globs are matched against root-relative paths from a sandboxed walk.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::accessor_fs::normalize_relative;
use crate::data_source::DataSourceConnection;
use crate::error::{Operation, ResourceError, ResourceResult};
use crate::models::{SuggestOptions, SuggestResult, Suggestion};
use crate::walk::Walker;

const WILDCARDS: &[char] = &['*', '?', '[', '{'];

/// Glob patterns for a partial path.
pub fn patterns_for(partial: &str) -> Vec<String> {
    let p = partial.trim();
    let p = p.strip_prefix("./").unwrap_or(p).trim_start_matches('/');

    if p.is_empty() {
        return vec!["*".to_string()];
    }
    if let Some(dir) = p.strip_suffix('/') {
        return vec![format!("{}/**", dir.trim_end_matches('/'))];
    }
    if p.contains(WILDCARDS) {
        return if p.contains('/') {
            vec![p.to_string()]
        } else {
            vec![format!("**/{}", p)]
        };
    }
    if p.contains('/') {
        vec![format!("{}*", p), format!("{}*/**", p)]
    } else {
        vec![format!("**/{}*", p), format!("**/{}*/**", p)]
    }
}

fn compile(patterns: &[String], partial: &str) -> ResourceResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .case_insensitive(true)
            .build()
            .map_err(|e| ResourceError::invalid_pattern(partial, Operation::Suggest, pattern.as_str(), e))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ResourceError::invalid_pattern(partial, Operation::Suggest, partial, e))
}

pub(crate) fn suggest_blocking(
    walker: &Walker,
    connection: &DataSourceConnection,
    partial: &str,
    options: &SuggestOptions,
) -> ResourceResult<SuggestResult> {
    // Wildcards are not path components, so the lexical check only needs
    // to see `..` segments.
    if normalize_relative(partial.trim()).is_none() {
        return Err(ResourceError::sandbox(partial, Operation::Suggest));
    }

    let patterns = patterns_for(partial);
    let set = compile(&patterns, partial)?;

    let mut suggestions = Vec::new();
    let mut has_more = false;

    for entry in walker.walk(walker.root(), None).filter_map(Result::ok) {
        let is_dir = entry.file_type().is_dir();
        if (is_dir && !options.include_directories) || (!is_dir && !options.include_files) {
            continue;
        }
        let rel = walker.relative(entry.path());
        if !set.is_match(&rel) {
            continue;
        }
        if suggestions.len() >= options.limit {
            has_more = true;
            break;
        }
        suggestions.push(Suggestion {
            uri: connection.uri_for(&rel),
            path: rel,
            is_directory: is_dir,
        });
    }

    Ok(SuggestResult {
        suggestions,
        has_more,
    })
}
