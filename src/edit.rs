//! Batched structured edits.
//!
//! An edit request is a list of [`EditOperation`]s of mixed kinds. The
//! [`EditBatcher`] groups them into maximal runs of the same kind, keeping
//! input order, and dispatches each run to the [`EditHandler`] registered
//! for that kind:
//!
//! ```text
//!  ops:     [SR, SR, Range, SR]
//!  groups:  [SR, SR] → [Range] → [SR]
//!  results: [r0, r1, r2, r3]        (always input length, input order)
//! ```
//!
//! A kind without a handler marks each of its operations `skipped`; the
//! other groups still run. All handlers work on one in-memory copy of the
//! content so the caller writes the result back at most once.

use regex::{NoExpand, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;

use crate::models::ResourceMetadata;

// ═══════════════════════════════════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════════════════════════════════

/// One requested edit, tagged by `editType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "editType", rename_all = "camelCase")]
pub enum EditOperation {
    SearchReplace(SearchReplaceEdit),
    Range(RangeEdit),
    Blocks(BlockEdit),
    StructuredData(StructuredDataEdit),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReplaceEdit {
    pub search: String,
    #[serde(default)]
    pub replace: String,
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
    /// Treat `search` as a regular expression; `replace` may then use `$1`.
    #[serde(default)]
    pub regex_pattern: bool,
    #[serde(default)]
    pub replace_all: bool,
}

fn default_true() -> bool {
    true
}

impl SearchReplaceEdit {
    pub fn literal(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: replace.into(),
            case_sensitive: true,
            regex_pattern: false,
            replace_all: false,
        }
    }
}

/// Range edits for rich-text backends. Carried opaquely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeEdit {
    #[serde(default)]
    pub range_edits: Vec<Value>,
}

/// Block edits for block-structured documents. Carried opaquely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEdit {
    #[serde(default)]
    pub block_edits: Vec<Value>,
}

/// Edits addressed to structured records (rows, fields). Carried opaquely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredDataEdit {
    #[serde(default)]
    pub structured_data_edits: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditKind {
    SearchReplace,
    Range,
    Blocks,
    StructuredData,
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EditKind::SearchReplace => "searchReplace",
            EditKind::Range => "range",
            EditKind::Blocks => "blocks",
            EditKind::StructuredData => "structuredData",
        };
        f.write_str(s)
    }
}

impl EditOperation {
    pub fn kind(&self) -> EditKind {
        match self {
            EditOperation::SearchReplace(_) => EditKind::SearchReplace,
            EditOperation::Range(_) => EditKind::Range,
            EditOperation::Blocks(_) => EditKind::Blocks,
            EditOperation::StructuredData(_) => EditKind::StructuredData,
        }
    }

    pub fn search_replace(search: impl Into<String>, replace: impl Into<String>) -> Self {
        EditOperation::SearchReplace(SearchReplaceEdit::literal(search, replace))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Results
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    /// Position of the operation in the original request.
    pub operation_index: usize,
    pub edit_type: EditKind,
    pub status: OperationStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl OperationResult {
    pub fn success(index: usize, kind: EditKind, message: impl Into<String>) -> Self {
        Self::new(index, kind, OperationStatus::Success, message)
    }

    pub fn failed(index: usize, kind: EditKind, message: impl Into<String>) -> Self {
        Self::new(index, kind, OperationStatus::Failed, message)
    }

    pub fn skipped(index: usize, kind: EditKind, message: impl Into<String>) -> Self {
        Self::new(index, kind, OperationStatus::Skipped, message)
    }

    fn new(index: usize, kind: EditKind, status: OperationStatus, message: impl Into<String>) -> Self {
        Self {
            operation_index: index,
            edit_type: kind,
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOptions {
    /// Start from empty content when the resource does not exist.
    #[serde(default)]
    pub create_if_missing: bool,
}

/// Outcome of an `edit_resource` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditResult {
    pub operation_results: Vec<OperationResult>,
    pub successful_operations: Vec<OperationResult>,
    pub skipped_operations: Vec<OperationResult>,
    pub failed_operations: Vec<OperationResult>,
    pub all_operations_succeeded: bool,
    /// True when no operation succeeded.
    pub all_operations_failed: bool,
    pub metadata: ResourceMetadata,
    pub is_new_resource: bool,
    pub bytes_written: u64,
}

impl EditResult {
    pub fn new(
        operation_results: Vec<OperationResult>,
        metadata: ResourceMetadata,
        is_new_resource: bool,
        bytes_written: u64,
    ) -> Self {
        let by_status = |status| {
            operation_results
                .iter()
                .filter(|r| r.status == status)
                .cloned()
                .collect::<Vec<_>>()
        };
        let successful_operations = by_status(OperationStatus::Success);
        let skipped_operations = by_status(OperationStatus::Skipped);
        let failed_operations = by_status(OperationStatus::Failed);

        Self {
            all_operations_succeeded: successful_operations.len() == operation_results.len(),
            all_operations_failed: successful_operations.is_empty(),
            successful_operations,
            skipped_operations,
            failed_operations,
            operation_results,
            metadata,
            is_new_resource,
            bytes_written,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Grouping and dispatch
// ═══════════════════════════════════════════════════════════════════════

/// A maximal run of same-kind operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationGroup {
    pub kind: EditKind,
    /// Indices into the original operation list.
    pub indices: Vec<usize>,
}

/// Split operations into maximal same-kind runs, preserving order.
pub fn group_operations(ops: &[EditOperation]) -> Vec<OperationGroup> {
    let mut groups: Vec<OperationGroup> = Vec::new();
    for (i, op) in ops.iter().enumerate() {
        match groups.last_mut() {
            Some(g) if g.kind == op.kind() => g.indices.push(i),
            _ => groups.push(OperationGroup {
                kind: op.kind(),
                indices: vec![i],
            }),
        }
    }
    groups
}

/// Applies one kind of edit to in-memory content.
pub trait EditHandler: Send + Sync {
    fn kind(&self) -> EditKind;

    /// Apply a group in order. Must return one result per input, carrying
    /// the operation's original index.
    fn apply(
        &self,
        content: &mut String,
        ops: &[(usize, &EditOperation)],
        is_new: bool,
    ) -> Vec<OperationResult>;
}

/// Plain-text search and replace.
#[derive(Debug, Default, Clone, Copy)]
pub struct SearchReplaceHandler;

impl SearchReplaceHandler {
    fn apply_one(&self, content: &mut String, index: usize, op: &SearchReplaceEdit, is_new: bool) -> OperationResult {
        let kind = EditKind::SearchReplace;

        if op.search.is_empty() {
            if is_new && content.is_empty() {
                *content = op.replace.clone();
                return OperationResult::success(index, kind, "Initialized new content")
                    .with_details(json!({ "matchCount": 0 }));
            }
            return OperationResult::failed(index, kind, "Search string must not be empty");
        }

        let pattern = if op.regex_pattern {
            op.search.clone()
        } else {
            regex::escape(&op.search)
        };
        let re = match RegexBuilder::new(&pattern)
            .case_insensitive(!op.case_sensitive)
            .build()
        {
            Ok(re) => re,
            Err(e) => {
                return OperationResult::failed(index, kind, format!("Invalid pattern '{}': {}", op.search, e))
            }
        };

        let match_count = if op.replace_all {
            re.find_iter(content.as_str()).count()
        } else {
            usize::from(re.is_match(content.as_str()))
        };
        if match_count == 0 {
            return OperationResult::failed(index, kind, format!("No matches found for '{}'", op.search));
        }

        let limit = if op.replace_all { 0 } else { 1 };
        let updated = if op.regex_pattern {
            re.replacen(content.as_str(), limit, op.replace.as_str()).into_owned()
        } else {
            re.replacen(content.as_str(), limit, NoExpand(&op.replace)).into_owned()
        };
        *content = updated;

        OperationResult::success(index, kind, format!("Replaced {} occurrence(s)", match_count))
            .with_details(json!({ "matchCount": match_count }))
    }
}

impl EditHandler for SearchReplaceHandler {
    fn kind(&self) -> EditKind {
        EditKind::SearchReplace
    }

    fn apply(
        &self,
        content: &mut String,
        ops: &[(usize, &EditOperation)],
        is_new: bool,
    ) -> Vec<OperationResult> {
        ops.iter()
            .map(|(index, op)| match op {
                EditOperation::SearchReplace(sr) => self.apply_one(content, *index, sr, is_new),
                other => OperationResult::skipped(
                    *index,
                    other.kind(),
                    format!("{} edit routed to search-replace handler", other.kind()),
                ),
            })
            .collect()
    }
}

/// Outcome of running a batch against in-memory content.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub content: String,
    pub results: Vec<OperationResult>,
    /// Whether the final content differs from the input content.
    pub changed: bool,
}

/// Groups operations by kind and dispatches them to registered handlers.
pub struct EditBatcher {
    handlers: HashMap<EditKind, Box<dyn EditHandler>>,
}

impl EditBatcher {
    /// A batcher with no handlers; every operation is skipped.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// A batcher for plain-text backends: search-replace only.
    pub fn text_only() -> Self {
        let mut batcher = Self::new();
        batcher.register(Box::new(SearchReplaceHandler));
        batcher
    }

    pub fn register(&mut self, handler: Box<dyn EditHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn supports(&self, kind: EditKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn run(&self, original: &str, ops: &[EditOperation], is_new: bool) -> BatchOutcome {
        let mut content = original.to_string();
        let mut slots: Vec<Option<OperationResult>> = vec![None; ops.len()];

        for group in group_operations(ops) {
            let results = match self.handlers.get(&group.kind) {
                Some(handler) => {
                    let members: Vec<(usize, &EditOperation)> =
                        group.indices.iter().map(|&i| (i, &ops[i])).collect();
                    handler.apply(&mut content, &members, is_new)
                }
                None => group
                    .indices
                    .iter()
                    .map(|&i| {
                        OperationResult::skipped(
                            i,
                            group.kind,
                            format!("{} edits are not supported by this data source", group.kind),
                        )
                    })
                    .collect(),
            };
            for result in results {
                if let Some(slot) = slots.get_mut(result.operation_index) {
                    *slot = Some(result);
                }
            }
        }

        let results = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.unwrap_or_else(|| {
                    OperationResult::failed(i, ops[i].kind(), "Handler produced no result")
                })
            })
            .collect();

        BatchOutcome {
            changed: content != original,
            content,
            results,
        }
    }
}

impl Default for EditBatcher {
    fn default() -> Self {
        Self::text_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> EditOperation {
        EditOperation::Range(RangeEdit::default())
    }

    #[test]
    fn groups_maximal_runs_in_order() {
        let ops = vec![
            EditOperation::search_replace("a", "b"),
            EditOperation::search_replace("c", "d"),
            range(),
            EditOperation::search_replace("e", "f"),
        ];
        let groups = group_operations(&ops);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].indices, vec![0, 1]);
        assert_eq!(groups[1].kind, EditKind::Range);
        assert_eq!(groups[1].indices, vec![2]);
        assert_eq!(groups[2].indices, vec![3]);
    }

    #[test]
    fn results_keep_input_positions() {
        let ops = vec![
            EditOperation::search_replace("one", "1"),
            EditOperation::search_replace("two", "2"),
            range(),
            EditOperation::search_replace("missing", "x"),
        ];
        let out = EditBatcher::text_only().run("one two three", &ops, false);

        assert_eq!(out.content, "1 2 three");
        assert!(out.changed);
        let statuses: Vec<_> = out.results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                OperationStatus::Success,
                OperationStatus::Success,
                OperationStatus::Skipped,
                OperationStatus::Failed
            ]
        );
        for (i, r) in out.results.iter().enumerate() {
            assert_eq!(r.operation_index, i);
        }
    }

    #[test]
    fn literal_replace_does_not_expand_captures() {
        let ops = vec![EditOperation::search_replace("x", "$1")];
        let out = EditBatcher::text_only().run("x", &ops, false);
        assert_eq!(out.content, "$1");
    }

    #[test]
    fn regex_and_case_insensitive_replace_all() {
        let ops = vec![EditOperation::SearchReplace(SearchReplaceEdit {
            search: r"fo(o+)".to_string(),
            replace: "ba$1".to_string(),
            case_sensitive: false,
            regex_pattern: true,
            replace_all: true,
        })];
        let out = EditBatcher::text_only().run("FOO foo fooo", &ops, false);
        assert_eq!(out.content, "baO bao baoo");
        assert_eq!(out.results[0].details, Some(json!({ "matchCount": 3 })));
    }

    #[test]
    fn invalid_regex_fails_only_that_operation() {
        let ops = vec![
            EditOperation::SearchReplace(SearchReplaceEdit {
                search: "(".to_string(),
                replace: String::new(),
                case_sensitive: true,
                regex_pattern: true,
                replace_all: false,
            }),
            EditOperation::search_replace("a", "b"),
        ];
        let out = EditBatcher::text_only().run("a", &ops, false);
        assert_eq!(out.results[0].status, OperationStatus::Failed);
        assert_eq!(out.results[1].status, OperationStatus::Success);
        assert_eq!(out.content, "b");
    }

    #[test]
    fn empty_search_initializes_new_content() {
        let ops = vec![EditOperation::search_replace("", "hello")];
        let out = EditBatcher::text_only().run("", &ops, true);
        assert_eq!(out.content, "hello");

        let out = EditBatcher::text_only().run("existing", &ops, false);
        assert_eq!(out.results[0].status, OperationStatus::Failed);
        assert!(!out.changed);
    }

    #[test]
    fn deserializes_tagged_operations() {
        let ops: Vec<EditOperation> = serde_json::from_value(json!([
            { "editType": "searchReplace", "search": "a", "replace": "b" },
            { "editType": "blocks", "blockEdits": [] }
        ]))
        .unwrap();
        match &ops[0] {
            EditOperation::SearchReplace(sr) => {
                assert!(sr.case_sensitive);
                assert!(!sr.replace_all);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(ops[1].kind(), EditKind::Blocks);
    }
}
