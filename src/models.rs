//! Core data models shared by every resource accessor.
//!
//! These types are the normalized request and response shapes of the
//! accessor contract. They serialize to camelCase JSON so that results can
//! be handed to an agent or a tool transport unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ═══════════════════════════════════════════════════════════════════════
// Capabilities
// ═══════════════════════════════════════════════════════════════════════

/// A named operation class a provider declares support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Read,
    Write,
    List,
    Search,
    Move,
    Delete,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Read,
        Capability::Write,
        Capability::List,
        Capability::Search,
        Capability::Move,
        Capability::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Read => "read",
            Capability::Write => "write",
            Capability::List => "list",
            Capability::Search => "search",
            Capability::Move => "move",
            Capability::Delete => "delete",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown capability: {}", s))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Resource metadata and content
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    File,
    Directory,
    Other,
}

/// How the content of a resource should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
    Binary,
}

/// Optional fields callers use to make processing decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceExtra {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<Capability>,
    /// Whether the content can be shown to the model as text.
    pub content_visible: bool,
    /// Whether byte-range reads are honored for this resource.
    pub supports_range: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_read_bytes: Option<u64>,
}

/// Metadata describing one resource. Produced fresh on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    pub uri: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub mime_type: String,
    pub content_type: ContentKind,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<ResourceExtra>,
}

/// Resource body: text for textual mime types, raw bytes otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum ResourceContent {
    Text(String),
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
}

impl ResourceContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ResourceContent::Text(s) => s.as_bytes(),
            ResourceContent::Bytes(b) => b,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResourceContent::Text(s) => Some(s),
            ResourceContent::Bytes(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for ResourceContent {
    fn from(s: String) -> Self {
        ResourceContent::Text(s)
    }
}

impl From<&str> for ResourceContent {
    fn from(s: &str) -> Self {
        ResourceContent::Text(s.to_string())
    }
}

impl From<Vec<u8>> for ResourceContent {
    fn from(b: Vec<u8>) -> Self {
        ResourceContent::Bytes(b)
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Operation options and results
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistsOptions {
    /// When set, also require the resource to be a file (`true`) or a
    /// directory (`false`).
    #[serde(default)]
    pub is_file: Option<bool>,
}

/// Half-open byte range `[start, end)`; `end = None` reads to the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    #[serde(default)]
    pub end: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadOptions {
    #[serde(default)]
    pub range: Option<ByteRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResult {
    pub content: ResourceContent,
    pub metadata: ResourceMetadata,
    pub is_partial: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOptions {
    /// Directory to list, relative to the data source root.
    #[serde(default)]
    pub path: Option<String>,
    /// Levels to descend; `None` means one level.
    #[serde(default)]
    pub depth: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub page_token: Option<String>,
}

/// Continuation state for a paged listing or search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page_size: usize,
    /// Opaque token for the next page; `None` on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult {
    pub resources: Vec<ResourceMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

/// Verbosity of search results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultLevel {
    /// Matching resources only.
    Resource,
    /// Matching lines with match offsets.
    #[default]
    Fragment,
    /// Matching lines plus surrounding context lines.
    Detailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindSearchOptions {
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub result_level: ResultLevel,
    #[serde(default)]
    pub max_matches_per_file: Option<usize>,
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub page_token: Option<String>,
    /// Restrict the search to this directory, relative to the root.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub date_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub size_min: Option<u64>,
    #[serde(default)]
    pub size_max: Option<u64>,
}

fn default_context_lines() -> usize {
    2
}

impl Default for FindSearchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            result_level: ResultLevel::default(),
            max_matches_per_file: None,
            context_lines: default_context_lines(),
            page_size: None,
            page_token: None,
            path: None,
            date_after: None,
            date_before: None,
            size_min: None,
            size_max: None,
        }
    }
}

/// Unified content and metadata search request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindOptions {
    /// Text (or regex, see `regex_pattern`) searched within resource content.
    #[serde(default)]
    pub content_pattern: Option<String>,
    /// Glob matched against the resource path.
    #[serde(default)]
    pub resource_pattern: Option<String>,
    /// Backend-native query for structured providers (databases, APIs).
    #[serde(default)]
    pub structured_query: Option<serde_json::Value>,
    /// Treat `content_pattern` as a regular expression.
    #[serde(default)]
    pub regex_pattern: bool,
    #[serde(default)]
    pub options: FindSearchOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMatch {
    /// 1-based line number.
    pub line_number: usize,
    pub content: String,
    /// Byte offsets of the first match within `content`.
    pub match_start: usize,
    pub match_end: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_before: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_after: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMatch {
    pub resource_uri: String,
    pub resource_path: String,
    pub metadata: ResourceMetadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_matches: Vec<ContentMatch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindResult {
    pub matches: Vec<ResourceMatch>,
    /// Number of matching resources on this page.
    pub page_matches: usize,
    pub result_level: ResultLevel,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOptions {
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub create_missing_directories: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub success: bool,
    pub metadata: ResourceMetadata,
    pub bytes_written: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOptions {
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub create_missing_directories: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveResult {
    pub success: bool,
    pub source_uri: String,
    pub destination_uri: String,
    pub metadata: ResourceMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOptions {
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub success: bool,
    pub uri: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
}

/// Aggregate statistics for a whole data source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataSourceMetadata {
    pub total_directories: u64,
    pub total_files: u64,
    /// File counts keyed by lowercase extension (`""` for none).
    pub extension_counts: BTreeMap<String, u64>,
    pub oldest_modified: Option<DateTime<Utc>>,
    pub newest_modified: Option<DateTime<Utc>>,
    pub largest_file_size: u64,
    pub empty_files: u64,
    pub binary_files: u64,
    pub text_files: u64,
    /// Result of the write probe; `None` when the probe was not attempted.
    pub can_write: Option<bool>,
    pub has_restricted_areas: bool,
    pub capabilities: Vec<Capability>,
    pub last_scanned: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestOptions {
    #[serde(default = "default_suggest_limit")]
    pub limit: usize,
    #[serde(default = "default_true")]
    pub include_files: bool,
    #[serde(default = "default_true")]
    pub include_directories: bool,
    /// Overrides the data source's symlink policy for this walk.
    #[serde(default)]
    pub follow_symlinks: Option<bool>,
}

fn default_suggest_limit() -> usize {
    50
}

fn default_true() -> bool {
    true
}

impl Default for SuggestOptions {
    fn default() -> Self {
        Self {
            limit: default_suggest_limit(),
            include_files: true,
            include_directories: true,
            follow_symlinks: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub uri: String,
    pub path: String,
    pub is_directory: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestResult {
    pub suggestions: Vec<Suggestion>,
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_parses_lowercase_names() {
        assert_eq!("search".parse::<Capability>().unwrap(), Capability::Search);
        assert!("teleport".parse::<Capability>().is_err());
    }

    #[test]
    fn bytes_content_serializes_as_base64() {
        let content = ResourceContent::Bytes(vec![0, 159, 255]);
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["kind"], "bytes");
        assert_eq!(json["data"], "AJ//");

        let back: ResourceContent = serde_json::from_value(json).unwrap();
        assert_eq!(back, content);
    }

    #[test]
    fn find_options_default_from_empty_json() {
        let opts: FindOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.options.result_level, ResultLevel::Fragment);
        assert_eq!(opts.options.context_lines, 2);
        assert!(!opts.regex_pattern);
    }
}
