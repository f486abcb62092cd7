//! Prisma schema surface (the subset needed for relation repair)
//!
//! This crate turns schema text into an immutable line-oriented parse tree
//! (`schema::SchemaDocument`) and exposes the two read-only stages of the
//! reconcile pipeline:
//! - the **model extractor** (`schema::extract_models`), and
//! - the **relation field classifier** (`classify::classify_fields`).
//!
//! Only `model` blocks are interpreted. Other top-level blocks (`enum`,
//! `datasource`, `generator`, `type`, `view`) are tokenized so their braces
//! are skipped correctly, but their contents are never inspected.

pub mod attribute;
pub mod classify;
mod lex;
pub mod schema;
