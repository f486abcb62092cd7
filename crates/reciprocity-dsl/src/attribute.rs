//! Structured parser for the `@relation(...)` field attribute.
//!
//! Accepted argument shapes (whitespace is flexible):
//! - positional relation name: `@relation("PostAuthor", ...)`
//! - named arguments: `name: "PostAuthor"`, `fields: [authorId]`,
//!   `references: [id]`, `onDelete: Cascade`, `map: "fk_post_author"`
//!
//! Anything else inside the clause is a parse gap: callers treat the field as
//! a non-relation rather than failing the whole schema.

use nom::{
    branch::alt,
    bytes::complete::{escaped, is_not, take_while1},
    character::complete::{anychar, char as pchar, multispace0},
    combinator::{all_consuming, map, opt},
    multi::separated_list0,
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lex::{find_closing_paren, is_ident_continue, outside_strings, parse_ident};

const RELATION_TOKEN: &str = "@relation";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "tag", content = "value", rename_all = "snake_case")]
pub enum RelationArgValue {
    Str(String),
    List(Vec<String>),
    Bare(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationArg {
    /// `None` for positional arguments.
    pub key: Option<String>,
    pub value: RelationArgValue,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationAttribute {
    pub args: Vec<RelationArg>,
    /// Byte offset (into the text handed to `parse_relation_attribute`) just
    /// past the opening `(`. Identity rewrites are spliced in here.
    pub args_start: usize,
}

impl RelationAttribute {
    /// Explicit relation identity: the positional string, or `name: "..."`.
    pub fn name(&self) -> Option<&str> {
        self.args.iter().find_map(|arg| match (&arg.key, &arg.value) {
            (None, RelationArgValue::Str(s)) => Some(s.as_str()),
            (Some(key), RelationArgValue::Str(s)) if key == "name" => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn fields(&self) -> Option<&[String]> {
        self.list_arg("fields")
    }

    pub fn references(&self) -> Option<&[String]> {
        self.list_arg("references")
    }

    /// Both `fields:` and `references:` are present.
    pub fn has_key_mapping(&self) -> bool {
        self.has_key("fields") && self.has_key("references")
    }

    fn has_key(&self, key: &str) -> bool {
        self.args.iter().any(|arg| arg.key.as_deref() == Some(key))
    }

    fn list_arg(&self, key: &str) -> Option<&[String]> {
        self.args.iter().find_map(|arg| match (&arg.key, &arg.value) {
            (Some(k), RelationArgValue::List(items)) if k == key => Some(items.as_slice()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttributeParseError {
    #[error("`@relation` is missing its argument list")]
    MissingArguments,
    #[error("unbalanced `@relation(` clause")]
    Unbalanced,
    #[error("invalid `@relation` arguments: `{0}`")]
    InvalidArguments(String),
}

/// Locate and parse the `@relation(...)` clause in a field's attribute text.
///
/// Returns `Ok(None)` when the text carries no `@relation` attribute.
pub fn parse_relation_attribute(
    attributes: &str,
) -> Result<Option<RelationAttribute>, AttributeParseError> {
    let Some(token_at) = find_relation_token(attributes) else {
        return Ok(None);
    };

    let after_token = token_at + RELATION_TOKEN.len();
    let rest = &attributes[after_token..];
    let open = after_token + (rest.len() - rest.trim_start().len());
    if !attributes[open..].starts_with('(') {
        return Err(AttributeParseError::MissingArguments);
    }
    let close = find_closing_paren(attributes, open).ok_or(AttributeParseError::Unbalanced)?;

    let inner = &attributes[open + 1..close];
    let args = parse_relation_args(inner)?;
    Ok(Some(RelationAttribute {
        args,
        args_start: open + 1,
    }))
}

fn find_relation_token(attributes: &str) -> Option<usize> {
    outside_strings(attributes)
        .filter(|&(_, c)| c == '@')
        .map(|(idx, _)| idx)
        .find(|&idx| {
            attributes[idx..].starts_with(RELATION_TOKEN)
                && !attributes[idx + RELATION_TOKEN.len()..]
                    .chars()
                    .next()
                    .is_some_and(is_ident_continue)
        })
}

fn parse_relation_args(inner: &str) -> Result<Vec<RelationArg>, AttributeParseError> {
    fn comma(input: &str) -> IResult<&str, ()> {
        let (input, _) = multispace0(input)?;
        let (input, _) = pchar(',')(input)?;
        Ok((input, ()))
    }

    fn string_lit(input: &str) -> IResult<&str, String> {
        let (input, body) = delimited(
            pchar('"'),
            opt(escaped(is_not("\"\\"), '\\', anychar)),
            pchar('"'),
        )(input)?;
        Ok((input, body.unwrap_or_default().to_string()))
    }

    fn list_item(input: &str) -> IResult<&str, String> {
        let (input, item) = preceded(multispace0, take_while1(|c| c != ',' && c != ']'))(input)?;
        Ok((input, item.trim().to_string()))
    }

    fn list_lit(input: &str) -> IResult<&str, Vec<String>> {
        delimited(
            pchar('['),
            separated_list0(pchar(','), list_item),
            preceded(multispace0, pchar(']')),
        )(input)
    }

    fn bare(input: &str) -> IResult<&str, String> {
        let (input, raw) = take_while1(|c| c != ',')(input)?;
        Ok((input, raw.trim().to_string()))
    }

    fn value(input: &str) -> IResult<&str, RelationArgValue> {
        alt((
            map(string_lit, RelationArgValue::Str),
            map(list_lit, RelationArgValue::List),
            map(bare, RelationArgValue::Bare),
        ))(input)
    }

    fn named_arg(input: &str) -> IResult<&str, RelationArg> {
        let (input, (key, _, _, _, value)) =
            tuple((parse_ident, multispace0, pchar(':'), multispace0, value))(input)?;
        Ok((
            input,
            RelationArg {
                key: Some(key.to_string()),
                value,
            },
        ))
    }

    fn positional_arg(input: &str) -> IResult<&str, RelationArg> {
        let (input, value) = value(input)?;
        Ok((input, RelationArg { key: None, value }))
    }

    fn arg(input: &str) -> IResult<&str, RelationArg> {
        terminated(
            preceded(multispace0, alt((named_arg, positional_arg))),
            multispace0,
        )(input)
    }

    all_consuming(terminated(separated_list0(comma, arg), multispace0))(inner)
        .map(|(_, args)| args)
        .map_err(|_| AttributeParseError::InvalidArguments(inner.trim().to_string()))
}
