//! Text splicer.
//!
//! Renders the edited schema in one pass over the parsed document: every
//! original line is emitted unchanged except that planned field lines are
//! placed immediately before their model's closing `}` and applied identity
//! rewrites stamp `"Name", ` just past a source field's `@relation(`.
//!
//! Only blocks whose `}` sits alone on its line can take new fields. An
//! insertion aimed at any other block is skipped and reported, and the
//! identity rewrite paired with it is dropped as well, so the source field
//! never names a relation that has no reciprocal.

use std::collections::{BTreeMap, BTreeSet};

use reciprocity_dsl::schema::{BlockClose, ModelBlock, Name, SchemaDocument};
use serde::{Deserialize, Serialize};

use crate::resolver::{IdentityRewrite, Insertion, FIELD_INDENT};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No model block with the target name.
    ModelNotFound,
    /// The closing `}` shares its line with other content.
    InlineBlock,
    /// The block never closes.
    UnterminatedBlock,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            SkipReason::ModelNotFound => "model not found",
            SkipReason::InlineBlock => "closing brace is not on its own line",
            SkipReason::UnterminatedBlock => "model block is not terminated",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedInsertion {
    pub target_model: Name,
    pub field_name: Name,
    pub relation_identity: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpliceOutcome {
    pub text: String,
    /// Insertions that landed, in the order they were given.
    pub applied: Vec<Insertion>,
    pub rewrites_applied: Vec<IdentityRewrite>,
    pub skipped: Vec<SkippedInsertion>,
}

/// Splice insertions into `text` with no identity rewrites.
pub fn splice(text: &str, insertions: &[Insertion]) -> SpliceOutcome {
    render(&SchemaDocument::parse(text), &[], insertions)
}

/// Render `document` with `insertions` and `rewrites` applied.
pub fn render(
    document: &SchemaDocument,
    rewrites: &[IdentityRewrite],
    insertions: &[Insertion],
) -> SpliceOutcome {
    let mut outcome = SpliceOutcome::default();
    // close line -> (header line, field lines in arrival order)
    let mut pending: BTreeMap<usize, (usize, Vec<String>)> = BTreeMap::new();

    for insertion in insertions {
        match splice_point(document, &insertion.target_model) {
            Ok(block) => {
                if let BlockClose::Line(close) = block.close {
                    let indent = block_indent(document, block.header_line, close);
                    let mut landed = insertion.clone();
                    landed.line = format!("{indent}{}", insertion.line.trim_start());
                    pending
                        .entry(close)
                        .or_insert_with(|| (block.header_line, Vec::new()))
                        .1
                        .push(landed.line.clone());
                    outcome.applied.push(landed);
                }
            }
            Err(reason) => {
                tracing::warn!(
                    target_model = %insertion.target_model,
                    field = %insertion.field_name,
                    reason = %reason,
                    "skipping insertion"
                );
                outcome.skipped.push(SkippedInsertion {
                    target_model: insertion.target_model.clone(),
                    field_name: insertion.field_name.clone(),
                    relation_identity: insertion.relation_identity.clone(),
                    reason,
                });
            }
        }
    }

    let landed: BTreeSet<&str> = outcome
        .applied
        .iter()
        .map(|i| i.relation_identity.as_str())
        .collect();
    let mut rewrites_by_line: BTreeMap<usize, Vec<&IdentityRewrite>> = BTreeMap::new();
    for rewrite in rewrites {
        if landed.contains(rewrite.relation_identity.as_str()) {
            rewrites_by_line.entry(rewrite.line).or_default().push(rewrite);
        } else {
            tracing::debug!(
                model = %rewrite.model,
                field = %rewrite.field,
                "dropping identity rewrite without a landed insertion"
            );
        }
    }

    let mut text = String::with_capacity(document_len(document) + insertions_len(insertions));
    for (idx, line) in document.lines.iter().enumerate() {
        if let Some((header_line, fields)) = pending.get(&idx) {
            let ending = document.line_ending_near(idx).as_str();
            if needs_separator(document, *header_line, idx) {
                text.push_str(ending);
            }
            for field_line in fields {
                text.push_str(field_line);
                text.push_str(ending);
            }
        }
        match rewrites_by_line.get(&idx) {
            Some(line_rewrites) => {
                let (content, applied) = apply_rewrites(&line.content, line_rewrites);
                text.push_str(&content);
                outcome.rewrites_applied.extend(applied.into_iter().cloned());
            }
            None => text.push_str(&line.content),
        }
        text.push_str(line.ending.as_str());
    }

    outcome.text = text;
    outcome
}

fn splice_point<'a>(document: &'a SchemaDocument, model: &str) -> Result<&'a ModelBlock, SkipReason> {
    let block = document.model(model).ok_or(SkipReason::ModelNotFound)?;
    match block.close {
        BlockClose::Line(_) => Ok(block),
        BlockClose::Inline(_) => Err(SkipReason::InlineBlock),
        BlockClose::Unterminated => Err(SkipReason::UnterminatedBlock),
    }
}

/// Indentation of the last member line of the block (`@@` attributes
/// included), or two spaces for an empty block.
fn block_indent(document: &SchemaDocument, header_line: usize, close_line: usize) -> &str {
    document.lines[header_line + 1..close_line]
        .iter()
        .rev()
        .map(|line| line.content.as_str())
        .find(|content| {
            let code = content.trim_start();
            !code.is_empty() && !code.starts_with("//")
        })
        .map(|content| &content[..content.len() - content.trim_start().len()])
        .filter(|indent| !indent.is_empty())
        .unwrap_or(FIELD_INDENT)
}

/// One blank line before the first new field, unless the block is empty or
/// already ends in a blank line.
fn needs_separator(document: &SchemaDocument, header_line: usize, close_line: usize) -> bool {
    let Some(previous) = close_line.checked_sub(1) else {
        return false;
    };
    previous != header_line && !document.lines[previous].content.trim().is_empty()
}

/// Apply rewrites right to left so earlier columns stay valid.
fn apply_rewrites<'a>(
    content: &str,
    rewrites: &[&'a IdentityRewrite],
) -> (String, Vec<&'a IdentityRewrite>) {
    let mut ordered = rewrites.to_vec();
    ordered.sort_by(|a, b| b.column.cmp(&a.column));
    ordered.dedup_by_key(|r| r.column);

    let mut out = content.to_string();
    let mut applied = Vec::with_capacity(ordered.len());
    for rewrite in ordered {
        if rewrite.column > out.len() || !out.is_char_boundary(rewrite.column) {
            tracing::warn!(
                model = %rewrite.model,
                field = %rewrite.field,
                column = rewrite.column,
                "identity rewrite column out of range"
            );
            continue;
        }
        out.insert_str(rewrite.column, &rewrite.inserted_text());
        applied.push(rewrite);
    }
    applied.reverse();
    (out, applied)
}

fn document_len(document: &SchemaDocument) -> usize {
    document
        .lines
        .iter()
        .map(|l| l.content.len() + l.ending.as_str().len())
        .sum()
}

fn insertions_len(insertions: &[Insertion]) -> usize {
    insertions.iter().map(|i| i.line.len() + 2).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = "model User {\n  id String @id\n}\n\nmodel Post {\n  author User @relation(fields: [authorId], references: [id])\n}\n";

    #[test]
    fn inserts_before_closing_brace_with_separator() {
        let outcome = splice(SCHEMA, &[Insertion::new("User", "posts", "Post", "PostUserRelation")]);
        assert_eq!(
            outcome.text,
            "model User {\n  id String @id\n\n  posts Post[] @relation(\"PostUserRelation\")\n}\n\nmodel Post {\n  author User @relation(fields: [authorId], references: [id])\n}\n"
        );
        assert_eq!(outcome.applied.len(), 1);
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn several_insertions_share_one_separator_in_order() {
        let outcome = splice(
            SCHEMA,
            &[
                Insertion::new("User", "posts", "Post", "A"),
                Insertion::new("User", "posts1", "Post", "B"),
            ],
        );
        assert!(outcome.text.starts_with(
            "model User {\n  id String @id\n\n  posts Post[] @relation(\"A\")\n  posts1 Post[] @relation(\"B\")\n}\n"
        ));
    }

    #[test]
    fn no_separator_after_blank_line_or_header() {
        let text = "model A {\n}\nmodel B {\n  id Int\n\n}\n";
        let outcome = splice(
            text,
            &[
                Insertion::new("A", "bs", "B", "X"),
                Insertion::new("B", "as", "A", "Y"),
            ],
        );
        assert_eq!(
            outcome.text,
            "model A {\n  bs B[] @relation(\"X\")\n}\nmodel B {\n  id Int\n\n  as A[] @relation(\"Y\")\n}\n"
        );
    }

    #[test]
    fn crlf_documents_get_crlf_lines() {
        let text = SCHEMA.replace('\n', "\r\n");
        let outcome = splice(&text, &[Insertion::new("User", "posts", "Post", "R")]);
        assert!(outcome
            .text
            .contains("  id String @id\r\n\r\n  posts Post[] @relation(\"R\")\r\n}\r\n"));
        assert!(!outcome.text.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn unlocatable_targets_are_skipped_and_reported() {
        let text = "model A { id Int }\nmodel B {\n  id Int\n";
        let outcome = splice(
            text,
            &[
                Insertion::new("A", "bs", "B", "X"),
                Insertion::new("B", "as", "A", "Y"),
                Insertion::new("Missing", "as", "A", "Z"),
            ],
        );
        assert_eq!(outcome.text, text);
        let reasons: Vec<SkipReason> = outcome.skipped.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![
                SkipReason::InlineBlock,
                SkipReason::UnterminatedBlock,
                SkipReason::ModelNotFound
            ]
        );
    }

    #[test]
    fn rewrites_follow_their_insertion() {
        let document = SchemaDocument::parse(SCHEMA);
        let decl = document.model("Post").and_then(|m| m.field("author")).unwrap();
        let rewrite = IdentityRewrite {
            model: "Post".to_string(),
            field: "author".to_string(),
            line: decl.line,
            column: decl.relation_args_column().unwrap(),
            relation_identity: "PostUserRelation".to_string(),
        };

        let applied = render(
            &document,
            std::slice::from_ref(&rewrite),
            &[Insertion::new("User", "posts", "Post", "PostUserRelation")],
        );
        assert!(applied.text.contains(
            "author User @relation(\"PostUserRelation\", fields: [authorId], references: [id])"
        ));
        assert_eq!(applied.rewrites_applied, vec![rewrite.clone()]);

        let dropped = render(
            &document,
            &[rewrite],
            &[Insertion::new("Ghost", "posts", "Post", "PostUserRelation")],
        );
        assert_eq!(dropped.text, SCHEMA);
        assert!(dropped.rewrites_applied.is_empty());
    }

    #[test]
    fn inserted_lines_reuse_the_block_indentation() {
        let text = "model A {\n\tid Int\n\t@@index([id])\n\t// trailing note\n}\nmodel B {\n}\n";
        let outcome = splice(
            text,
            &[
                Insertion::new("A", "bs", "B", "X"),
                Insertion::new("B", "as", "A", "Y"),
            ],
        );
        assert_eq!(
            outcome.text,
            "model A {\n\tid Int\n\t@@index([id])\n\t// trailing note\n\n\tbs B[] @relation(\"X\")\n}\nmodel B {\n  as A[] @relation(\"Y\")\n}\n"
        );
        assert_eq!(outcome.applied[0].line, "\tbs B[] @relation(\"X\")");
    }

    #[test]
    fn empty_insertion_list_is_identity() {
        let outcome = splice(SCHEMA, &[]);
        assert_eq!(outcome.text, SCHEMA);
    }
}
