//! Lexical helpers shared by the block tokenizer and the attribute parser.

use nom::{
    bytes::complete::{take_while, take_while1},
    combinator::recognize,
    sequence::tuple,
    IResult,
};

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub(crate) fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub(crate) fn parse_ident(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        take_while1(is_ident_start),
        take_while(is_ident_continue),
    )))(input)
}

/// Characters of `s` that are not part of a string literal (quotes included).
pub(crate) fn outside_strings(s: &str) -> impl Iterator<Item = (usize, char)> + '_ {
    let mut in_string = false;
    let mut escaped = false;
    s.char_indices().filter(move |&(_, c)| {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            false
        } else if c == '"' {
            in_string = true;
            false
        } else {
            true
        }
    })
}

/// Cut a line at its `//` comment. `//` inside a string literal
/// (e.g. `@default("https://...")`) is not a comment.
pub(crate) fn strip_line_comment(line: &str) -> &str {
    for (idx, c) in outside_strings(line) {
        if c == '/' && line[idx + 1..].starts_with('/') {
            return &line[..idx];
        }
    }
    line
}

/// Byte index of the `)` closing the `(` at `open`, skipping string literals
/// and nested `(...)` / `[...]`.
pub(crate) fn find_closing_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth: i32 = 0;
    for (idx, c) in outside_strings(&s[open..]) {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return (c == ')').then_some(open + idx);
                }
            }
            _ => {}
        }
    }
    None
}
