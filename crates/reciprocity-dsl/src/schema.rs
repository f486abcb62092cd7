//! Line-oriented schema tokenizer.
//!
//! The schema language is not parsed with a full grammar. Instead the text is
//! split into lines (line endings preserved) and grouped into top-level
//! brace-delimited blocks:
//!
//! ```text
//! model Post {                                             <- header line
//!   id       String @id
//!   author   User   @relation(fields: [authorId], references: [id])
//! }                                                        <- closing line
//! ```
//!
//! Every body line of a `model` block that looks like `name Type [attrs]` is
//! recorded as a `FieldDecl`. Lines that do not match (block attributes,
//! doc comments, unusual formatting) are parse gaps and are skipped.
//!
//! The resulting `SchemaDocument` is immutable: edits are planned against it
//! and rendered once by the reconcile crate.

use std::collections::{BTreeMap, BTreeSet};

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char as pchar, multispace0, multispace1},
    combinator::opt,
    sequence::{preceded, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::attribute::{parse_relation_attribute, RelationAttribute};
use crate::lex::{outside_strings, parse_ident, strip_line_comment};

pub type Name = String;

/// Model name -> raw body text (last declaration wins).
pub type ModelMap = BTreeMap<Name, String>;

const MODEL_KEYWORD: &str = "model";

// ============================================================================
// Parse tree
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LineEnding {
    Lf,
    CrLf,
    /// Last line of a text without a trailing newline.
    None,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::None => "",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceLine {
    pub content: String,
    pub ending: LineEnding,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TypeModifier {
    Required,
    Optional,
    List,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeRef {
    /// Type name with `[]` / `?` stripped.
    pub name: Name,
    pub modifier: TypeModifier,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldDecl {
    /// Index into `SchemaDocument::lines`.
    pub line: usize,
    pub name: Name,
    pub ty: TypeRef,
    /// Attribute text after the type token (comment stripped, trimmed).
    pub attributes: String,
    /// Byte column of `attributes` within the line content.
    pub attributes_column: usize,
    pub relation: Option<RelationAttribute>,
}

impl FieldDecl {
    pub fn relation_name(&self) -> Option<&str> {
        self.relation.as_ref().and_then(RelationAttribute::name)
    }

    pub fn has_key_mapping(&self) -> bool {
        self.relation
            .as_ref()
            .is_some_and(RelationAttribute::has_key_mapping)
    }

    /// Byte column (within the line content) just past `@relation(`.
    pub fn relation_args_column(&self) -> Option<usize> {
        self.relation
            .as_ref()
            .map(|rel| self.attributes_column + rel.args_start)
    }
}

/// Where a block's closing `}` sits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "tag", content = "line", rename_all = "snake_case")]
pub enum BlockClose {
    /// `}` alone on its line: new fields can be spliced in before it.
    Line(usize),
    /// `}` shares its line with other content (`model A {}`, `  id Int }`).
    Inline(usize),
    /// End of text reached before the block closed.
    Unterminated,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelBlock {
    pub name: Name,
    pub header_line: usize,
    pub close: BlockClose,
    pub fields: Vec<FieldDecl>,
    /// Leading identifier of every body line, including lines that did not
    /// parse as a `FieldDecl` (`geom Unsupported("x")`).
    pub member_names: BTreeSet<Name>,
}

impl ModelBlock {
    pub fn field_names(&self) -> BTreeSet<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// True when a declared field or any unparsed body line claims `name`.
    pub fn declares(&self, name: &str) -> bool {
        self.member_names.contains(name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaDocument {
    pub lines: Vec<SourceLine>,
    /// Model blocks in declaration order (duplicates included).
    pub models: Vec<ModelBlock>,
}

impl SchemaDocument {
    pub fn parse(text: &str) -> Self {
        parse_schema_document(text)
    }

    /// The effective block for `name` (last declaration wins).
    pub fn model(&self, name: &str) -> Option<&ModelBlock> {
        self.models.iter().rev().find(|m| m.name == name)
    }

    /// Effective model blocks in declaration order (shadowed duplicates
    /// dropped).
    pub fn effective_models(&self) -> impl Iterator<Item = &ModelBlock> + '_ {
        self.models.iter().filter(move |m| {
            self.model(&m.name)
                .is_some_and(|eff| eff.header_line == m.header_line)
        })
    }

    pub fn model_names(&self) -> BTreeSet<&str> {
        self.models.iter().map(|m| m.name.as_str()).collect()
    }

    /// Every explicit relation identity declared anywhere in the schema.
    pub fn relation_identities(&self) -> BTreeSet<String> {
        self.models
            .iter()
            .flat_map(|m| m.fields.iter())
            .filter_map(|f| f.relation_name().map(str::to_string))
            .collect()
    }

    /// Raw body text of a block: everything between `{` and `}`.
    pub fn body_text(&self, block: &ModelBlock) -> String {
        let header = &self.lines[block.header_line].content;
        let after_open = block_open_offset(header).map_or("", |idx| &header[idx + 1..]);

        match block.close {
            BlockClose::Inline(line) if line == block.header_line => {
                let end = last_close_offset(after_open).unwrap_or(after_open.len());
                after_open[..end].to_string()
            }
            close => {
                let end_line = match close {
                    BlockClose::Line(line) | BlockClose::Inline(line) => line,
                    BlockClose::Unterminated => self.lines.len(),
                };
                let mut body = String::new();
                body.push_str(after_open);
                body.push_str(self.lines[block.header_line].ending.as_str());
                for line in &self.lines[block.header_line + 1..end_line] {
                    body.push_str(&line.content);
                    body.push_str(line.ending.as_str());
                }
                if let BlockClose::Inline(line) = close {
                    let content = &self.lines[line].content;
                    let end = last_close_offset(content).unwrap_or(content.len());
                    body.push_str(&content[..end]);
                }
                body
            }
        }
    }

    /// Line ending used for lines spliced in before `before_line`.
    pub fn line_ending_near(&self, before_line: usize) -> LineEnding {
        let preceding = before_line
            .checked_sub(1)
            .and_then(|idx| self.lines.get(idx))
            .map(|l| l.ending);
        match preceding {
            Some(LineEnding::CrLf) => LineEnding::CrLf,
            Some(LineEnding::Lf) => LineEnding::Lf,
            _ => self
                .lines
                .iter()
                .map(|l| l.ending)
                .find(|e| *e != LineEnding::None)
                .unwrap_or(LineEnding::Lf),
        }
    }

    /// Reassemble the original text byte-for-byte.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.content);
            out.push_str(line.ending.as_str());
        }
        out
    }
}

// ============================================================================
// Model extractor
// ============================================================================

/// `model name -> body text` for every model in `text` (last wins).
pub fn extract_models(text: &str) -> ModelMap {
    let document = parse_schema_document(text);
    document
        .models
        .iter()
        .map(|m| (m.name.clone(), document.body_text(m)))
        .collect()
}

// ============================================================================
// Tokenizer
// ============================================================================

#[derive(Debug)]
struct OpenBlock {
    is_model: bool,
    name: Name,
    header_line: usize,
    depth: i32,
    fields: Vec<FieldDecl>,
    member_names: BTreeSet<Name>,
}

pub fn parse_schema_document(text: &str) -> SchemaDocument {
    let lines = split_lines(text);
    let mut models = Vec::new();
    let mut open: Option<OpenBlock> = None;

    for (idx, line) in lines.iter().enumerate() {
        let code = strip_line_comment(&line.content);

        if open.is_none() {
            open = open_block(idx, code, &mut models);
            continue;
        }
        let Some(block) = open.as_mut() else {
            continue;
        };

        block.depth += brace_delta(code);
        if block.depth <= 0 {
            let close = if code.trim() == "}" {
                BlockClose::Line(idx)
            } else {
                BlockClose::Inline(idx)
            };
            if let Some(block) = open.take() {
                if block.is_model {
                    models.push(ModelBlock {
                        name: block.name,
                        header_line: block.header_line,
                        close,
                        fields: block.fields,
                        member_names: block.member_names,
                    });
                }
            }
            continue;
        }

        if block.is_model && block.depth == 1 {
            if let Ok((_, member)) = parse_ident(code.trim_start()) {
                block.member_names.insert(member.to_string());
            }
            if let Some(field) = parse_field_line(idx, &line.content) {
                block.fields.push(field);
            }
        }
    }

    if let Some(block) = open {
        if block.is_model {
            tracing::debug!(model = %block.name, "model block never closes");
            models.push(ModelBlock {
                name: block.name,
                header_line: block.header_line,
                close: BlockClose::Unterminated,
                fields: block.fields,
                member_names: block.member_names,
            });
        }
    }

    SchemaDocument { lines, models }
}

fn open_block(idx: usize, code: &str, models: &mut Vec<ModelBlock>) -> Option<OpenBlock> {
    let (keyword, name) = parse_block_header(code.trim())?;
    let open_at = block_open_offset(code)?;
    let depth = brace_delta(&code[open_at..]);
    let is_model = keyword == MODEL_KEYWORD;
    if depth <= 0 {
        if is_model {
            models.push(ModelBlock {
                name: name.to_string(),
                header_line: idx,
                close: BlockClose::Inline(idx),
                fields: Vec::new(),
                member_names: BTreeSet::new(),
            });
        }
        return None;
    }
    Some(OpenBlock {
        is_model,
        name: name.to_string(),
        header_line: idx,
        depth,
        fields: Vec::new(),
        member_names: BTreeSet::new(),
    })
}

fn split_lines(text: &str) -> Vec<SourceLine> {
    text.split_inclusive('\n')
        .map(|raw| {
            if let Some(content) = raw.strip_suffix("\r\n") {
                SourceLine {
                    content: content.to_string(),
                    ending: LineEnding::CrLf,
                }
            } else if let Some(content) = raw.strip_suffix('\n') {
                SourceLine {
                    content: content.to_string(),
                    ending: LineEnding::Lf,
                }
            } else {
                SourceLine {
                    content: raw.to_string(),
                    ending: LineEnding::None,
                }
            }
        })
        .collect()
}

/// `<keyword> <Name> {` at the start of a (trimmed, comment-free) line.
fn parse_block_header(line: &str) -> Option<(&str, &str)> {
    fn parser(input: &str) -> IResult<&str, (&str, &str)> {
        let (input, (keyword, _, name, _, _)) =
            tuple((parse_ident, multispace1, parse_ident, multispace0, pchar('{')))(input)?;
        Ok((input, (keyword, name)))
    }

    parser(line).ok().map(|(_, header)| header)
}

fn block_open_offset(code: &str) -> Option<usize> {
    outside_strings(code)
        .find(|&(_, c)| c == '{')
        .map(|(idx, _)| idx)
}

fn last_close_offset(code: &str) -> Option<usize> {
    outside_strings(code)
        .filter(|&(_, c)| c == '}')
        .last()
        .map(|(idx, _)| idx)
}

fn brace_delta(code: &str) -> i32 {
    outside_strings(code).fold(0, |depth, (_, c)| match c {
        '{' => depth + 1,
        '}' => depth - 1,
        _ => depth,
    })
}

/// `name Type[]? [attributes...]` within a model body.
fn parse_field_line(line_index: usize, content: &str) -> Option<FieldDecl> {
    fn type_token(input: &str) -> IResult<&str, (&str, Option<&str>)> {
        tuple((parse_ident, opt(alt((tag("[]?"), tag("[]"), tag("?"))))))(input)
    }

    fn head(input: &str) -> IResult<&str, (&str, (&str, Option<&str>))> {
        let (input, name) = preceded(multispace0, parse_ident)(input)?;
        let (input, ty) = preceded(multispace1, type_token)(input)?;
        Ok((input, (name, ty)))
    }

    let code = strip_line_comment(content);
    let (rest, (name, (type_name, marker))) = head(code).ok()?;
    // `Unsupported("...")`, `Type.x` and friends are outside the modelled subset.
    // Attributes may follow the type token directly (`Post[]@relation("x")`).
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) && !rest.starts_with('@') {
        return None;
    }

    let modifier = match marker {
        Some("?") => TypeModifier::Optional,
        Some(_) => TypeModifier::List,
        None => TypeModifier::Required,
    };
    let attributes = rest.trim();
    let attributes_column = code.len() - rest.trim_start().len();

    let relation = match parse_relation_attribute(attributes) {
        Ok(relation) => relation,
        Err(err) => {
            tracing::debug!(
                line = line_index + 1,
                field = name,
                error = %err,
                "skipping unparseable @relation clause"
            );
            None
        }
    };

    Some(FieldDecl {
        line: line_index,
        name: name.to_string(),
        ty: TypeRef {
            name: type_name.to_string(),
            modifier,
        },
        attributes: attributes.to_string(),
        attributes_column,
        relation,
    })
}

/// Field declarations of a raw model body (as returned by `extract_models`).
pub fn parse_body_fields(body: &str) -> Vec<FieldDecl> {
    split_lines(body)
        .iter()
        .enumerate()
        .filter_map(|(idx, line)| parse_field_line(idx, &line.content))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const BLOG: &str = r#"datasource db {
  provider = "postgresql"
  url      = env("DATABASE_URL")
}

/// A person
model User {
  id    String @id @default(cuid())
  name  String
  posts Post[]
}

enum Role {
  ADMIN
  USER
}

model Post {
  id       String  @id
  authorId String
  author   User?   @relation(fields: [authorId], references: [id]) // owner
  @@index([authorId])
}
"#;

    #[test]
    fn tokenizes_models_and_skips_other_blocks() {
        let doc = parse_schema_document(BLOG);
        let names: Vec<&str> = doc.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["User", "Post"]);

        let user = doc.model("User").expect("User");
        assert_eq!(user.fields.len(), 3);
        assert_eq!(user.close, BlockClose::Line(10));

        let post = doc.model("Post").expect("Post");
        let author = post.field("author").expect("author field");
        assert_eq!(author.ty.name, "User");
        assert_eq!(author.ty.modifier, TypeModifier::Optional);
        assert!(author.has_key_mapping());
        assert!(!author.attributes.contains("owner"));
        assert!(post.field("@@index").is_none());
    }

    #[test]
    fn relation_args_column_points_into_the_line() {
        let doc = parse_schema_document(BLOG);
        let author = doc.model("Post").and_then(|m| m.field("author")).expect("author");
        let column = author.relation_args_column().expect("column");
        let content = &doc.lines[author.line].content;
        assert!(content[..column].ends_with("@relation("));
        assert!(content[column..].starts_with("fields:"));
    }

    #[test]
    fn round_trips_text_byte_for_byte() {
        let crlf = BLOG.replace('\n', "\r\n");
        for text in [BLOG, crlf.as_str(), "model A {\n  id Int\n}", ""] {
            assert_eq!(parse_schema_document(text).to_text(), text);
        }
    }

    #[test]
    fn extract_models_uses_last_declaration() {
        let text = "model A {\n  x Int\n}\nmodel A {\n  y Int\n}\n";
        let models = extract_models(text);
        assert_eq!(models.len(), 1);
        assert_eq!(models["A"], "\n  y Int\n");
    }

    #[test]
    fn records_inline_and_unterminated_blocks() {
        let doc = parse_schema_document("model Empty {}\nmodel Tail {\n  id Int }\nmodel Open {\n  id Int\n");
        assert_eq!(doc.model("Empty").map(|m| m.close), Some(BlockClose::Inline(0)));
        assert_eq!(doc.model("Tail").map(|m| m.close), Some(BlockClose::Inline(2)));
        assert_eq!(doc.model("Open").map(|m| m.close), Some(BlockClose::Unterminated));
        assert_eq!(extract_models("model Empty {}")["Empty"], "");
    }

    #[test]
    fn braces_inside_strings_do_not_close_blocks() {
        let text = "model A {\n  note String @default(\"}\")\n  id Int\n}\n";
        let doc = parse_schema_document(text);
        let a = doc.model("A").expect("A");
        assert_eq!(a.close, BlockClose::Line(3));
        assert_eq!(a.fields.len(), 2);
    }

    #[test]
    fn unsupported_types_are_parse_gaps() {
        let fields = parse_body_fields("\n  geom Unsupported(\"geometry\")\n  id Int @id\n");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "id");
    }

    #[test]
    fn unparsed_body_lines_still_claim_their_names() {
        let doc = parse_schema_document(
            "model A {\n  geom Unsupported(\"geometry\")\n  id Int @id\n  // note Int\n  @@index([id])\n}\n",
        );
        let a = doc.model("A").expect("A");
        assert_eq!(a.field_names(), BTreeSet::from(["id"]));
        assert!(a.declares("geom"));
        assert!(a.declares("id"));
        assert!(!a.declares("note"));
        assert_eq!(a.member_names.len(), 2);
    }

    #[test]
    fn attributes_may_follow_the_type_directly() {
        let fields = parse_body_fields("\n  posts Post[]@relation(\"Z\")\n");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].ty.name, "Post");
        assert_eq!(fields[0].ty.modifier, TypeModifier::List);
        assert_eq!(fields[0].relation_name(), Some("Z"));
        assert_eq!(fields[0].attributes_column, 14);
    }
}
