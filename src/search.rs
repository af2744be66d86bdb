//! Content and metadata search over a filesystem data source.
//!
//! One walk serves both kinds of search. A resource is a match when it
//! passes every filter that was supplied:
//!
//! | Filter | Applies to |
//! |--------|-----------|
//! | `resourcePattern` | glob on the root-relative path |
//! | `contentPattern` | literal text, or a regex with `regexPattern` |
//! | `dateAfter` / `dateBefore` | last-modified time |
//! | `sizeMin` / `sizeMax` | file size in bytes |
//!
//! The result level decides how much is returned per match: `resource`
//! returns metadata only, `fragment` adds matching lines, `detailed` adds
//! surrounding context lines.

use chrono::{DateTime, Utc};
use globset::{GlobBuilder, GlobMatcher};
use regex::{Regex, RegexBuilder};
use std::path::Path;
use tracing::debug;

use crate::accessor_fs::build_metadata;
use crate::data_source::DataSourceConnection;
use crate::error::{Operation, ResourceError, ResourceResult};
use crate::mime::{detect_mime, is_binary_mime};
use crate::models::{
    Capability, ContentMatch, FindOptions, FindResult, Pagination, ResourceMatch, ResultLevel,
};
use crate::walk::Walker;

/// Page size when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 50;
/// Files larger than this are never read for content search.
pub const MAX_CONTENT_FILE_SIZE: u64 = 4 * 1024 * 1024;
/// Line matches kept per file when no limit is given.
pub const DEFAULT_MAX_MATCHES_PER_FILE: usize = 100;

pub(crate) fn find_blocking(
    walker: &Walker,
    connection: &DataSourceConnection,
    capabilities: &[Capability],
    start: &Path,
    options: &FindOptions,
    offset: usize,
) -> ResourceResult<FindResult> {
    let search = &options.options;
    let root_uri = connection.uri_for("");

    let content_re = options
        .content_pattern
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(|p| compile_content(p, options.regex_pattern, search.case_sensitive, &root_uri))
        .transpose()?;
    let resource_glob = options
        .resource_pattern
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(|p| compile_resource(p, search.case_sensitive, &root_uri))
        .transpose()?;

    let page_size = search.page_size.filter(|&n| n > 0).unwrap_or(DEFAULT_PAGE_SIZE);
    let max_per_file = search
        .max_matches_per_file
        .unwrap_or(DEFAULT_MAX_MATCHES_PER_FILE);
    let context = if search.result_level == ResultLevel::Detailed {
        search.context_lines
    } else {
        0
    };

    let mut visited = 0usize;
    let mut matches = Vec::new();

    for entry in walker.walk(start, None) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(_) => continue,
        };
        let is_dir = meta.is_dir();
        if is_dir && content_re.is_some() {
            continue;
        }
        if !is_dir && !meta.is_file() {
            continue;
        }

        let rel = walker.relative(entry.path());
        if let Some(glob) = &resource_glob {
            if !glob.is_match(&rel) {
                continue;
            }
        }

        let modified = meta.modified().ok().map(DateTime::<Utc>::from);
        if !within_dates(modified, search.date_after, search.date_before) {
            continue;
        }
        if !is_dir && !within_sizes(meta.len(), search.size_min, search.size_max) {
            continue;
        }

        let content_matches = match &content_re {
            Some(re) => {
                if meta.len() > MAX_CONTENT_FILE_SIZE || is_binary_mime(detect_mime(entry.path())) {
                    continue;
                }
                let text = match std::fs::read_to_string(entry.path()) {
                    Ok(text) => text,
                    Err(_) => continue,
                };
                let found = match_lines(&text, re, max_per_file, context);
                if found.is_empty() {
                    continue;
                }
                found
            }
            None => Vec::new(),
        };

        visited += 1;
        if visited <= offset {
            continue;
        }

        let metadata = build_metadata(connection, capabilities, &rel, entry.path(), &meta);
        matches.push(ResourceMatch {
            resource_uri: metadata.uri.clone(),
            resource_path: rel,
            metadata,
            content_matches: if search.result_level == ResultLevel::Resource {
                Vec::new()
            } else {
                content_matches
            },
        });
        if matches.len() >= page_size {
            break;
        }
    }

    let next_page_token = (matches.len() == page_size).then(|| (offset + page_size).to_string());
    Ok(FindResult {
        page_matches: matches.len(),
        result_level: search.result_level,
        matches,
        pagination: Pagination {
            page_size,
            next_page_token,
        },
    })
}

fn compile_content(pattern: &str, is_regex: bool, case_sensitive: bool, uri: &str) -> ResourceResult<Regex> {
    let source = if is_regex {
        pattern.to_string()
    } else {
        regex::escape(pattern)
    };
    RegexBuilder::new(&source)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| ResourceError::invalid_pattern(uri, Operation::Find, pattern, e))
}

fn compile_resource(pattern: &str, case_sensitive: bool, uri: &str) -> ResourceResult<GlobMatcher> {
    let pattern_str = pattern.trim_start_matches("./").trim_start_matches('/');
    let full = if pattern_str.contains('/') {
        pattern_str.to_string()
    } else {
        format!("**/{}", pattern_str)
    };
    GlobBuilder::new(&full)
        .literal_separator(true)
        .case_insensitive(!case_sensitive)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| ResourceError::invalid_pattern(uri, Operation::Find, pattern, e))
}

fn within_dates(
    modified: Option<DateTime<Utc>>,
    after: Option<DateTime<Utc>>,
    before: Option<DateTime<Utc>>,
) -> bool {
    if after.is_none() && before.is_none() {
        return true;
    }
    let Some(modified) = modified else {
        return false;
    };
    after.map_or(true, |a| modified >= a) && before.map_or(true, |b| modified <= b)
}

fn within_sizes(size: u64, min: Option<u64>, max: Option<u64>) -> bool {
    min.map_or(true, |m| size >= m) && max.map_or(true, |m| size <= m)
}

/// Matching lines of `text`, at most `limit`, with `context` lines around each.
fn match_lines(text: &str, re: &Regex, limit: usize, context: usize) -> Vec<ContentMatch> {
    let lines: Vec<&str> = text.lines().collect();
    let mut out = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        if out.len() >= limit {
            break;
        }
        let Some(m) = re.find(line) else {
            continue;
        };
        let (context_before, context_after) = if context > 0 {
            let start = idx.saturating_sub(context);
            let end = (idx + context + 1).min(lines.len());
            (
                lines[start..idx].iter().map(|s| s.to_string()).collect(),
                lines[idx + 1..end].iter().map(|s| s.to_string()).collect(),
            )
        } else {
            (Vec::new(), Vec::new())
        };
        out.push(ContentMatch {
            line_number: idx + 1,
            content: line.to_string(),
            match_start: m.start(),
            match_end: m.end(),
            context_before,
            context_after,
        });
    }
    out
}
