//! Relation field classifier.
//!
//! A field is a relation candidate only when its `@relation(...)` clause has
//! an explicit key mapping (`fields:` *and* `references:`) and its type names
//! a model of the schema. Bare back-references (`posts Post[]`) and scalar or
//! enum typed fields are never candidates.

use serde::{Deserialize, Serialize};

use crate::schema::{
    parse_body_fields, FieldDecl, ModelMap, Name, SchemaDocument, TypeModifier,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    Single,
    Nullable,
    List,
}

impl From<TypeModifier> for Cardinality {
    fn from(modifier: TypeModifier) -> Self {
        match modifier {
            TypeModifier::Required => Cardinality::Single,
            TypeModifier::Optional => Cardinality::Nullable,
            TypeModifier::List => Cardinality::List,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationField {
    pub source: Name,
    pub field: Name,
    pub target: Name,
    pub cardinality: Cardinality,
    /// Explicit relation identity, if the source text carries one.
    pub identity: Option<String>,
    /// Line of the declaration (document line for `relation_fields`, body
    /// line for `classify_fields`).
    pub line: usize,
}

fn classify_decl(
    source: &str,
    decl: &FieldDecl,
    is_model: impl Fn(&str) -> bool,
) -> Option<RelationField> {
    if !decl.has_key_mapping() || !is_model(&decl.ty.name) {
        return None;
    }
    tracing::debug!(
        source = source,
        field = %decl.name,
        target = %decl.ty.name,
        identity = decl.relation_name().unwrap_or(""),
        "classified relation field"
    );
    Some(RelationField {
        source: source.to_string(),
        field: decl.name.clone(),
        target: decl.ty.name.clone(),
        cardinality: decl.ty.modifier.into(),
        identity: decl.relation_name().map(str::to_string),
        line: decl.line,
    })
}

/// Relation candidates declared in one raw model body.
pub fn classify_fields(source: &str, body: &str, models: &ModelMap) -> Vec<RelationField> {
    parse_body_fields(body)
        .iter()
        .filter_map(|decl| classify_decl(source, decl, |name| models.contains_key(name)))
        .collect()
}

/// Relation candidates of every effective model, in discovery order.
pub fn relation_fields(document: &SchemaDocument) -> Vec<RelationField> {
    let names = document.model_names();
    let names = &names;
    document
        .effective_models()
        .flat_map(move |model| {
            model.fields.iter().filter_map(move |decl| {
                classify_decl(&model.name, decl, |name| names.contains(name))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::extract_models;

    const SCHEMA: &str = r#"model User {
  id      String  @id
  posts   Post[]
  role    Role
  manager User?   @relation("Reports", fields: [managerId], references: [id])
  managerId String?
}

model Post {
  id       String @id
  authorId String
  author   User   @relation(fields: [authorId], references: [id])
  editor   User?  @relation("Editor")
  ghost    Ghost  @relation(fields: [ghostId], references: [id])
  ghostId  String
}
"#;

    #[test]
    fn classifies_only_key_mapped_fields_to_known_models() {
        let document = SchemaDocument::parse(SCHEMA);
        let fields = relation_fields(&document);
        let summary: Vec<(&str, &str, &str, Option<&str>)> = fields
            .iter()
            .map(|f| {
                (
                    f.source.as_str(),
                    f.field.as_str(),
                    f.target.as_str(),
                    f.identity.as_deref(),
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("User", "manager", "User", Some("Reports")),
                ("Post", "author", "User", None),
            ]
        );
        assert_eq!(fields[0].cardinality, Cardinality::Nullable);
        assert_eq!(fields[1].cardinality, Cardinality::Single);
    }

    #[test]
    fn body_level_classification_matches_document_level() {
        let models = extract_models(SCHEMA);
        let fields = classify_fields("Post", &models["Post"], &models);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "author");
        assert_eq!(fields[0].target, "User");
    }

    #[test]
    fn shadowed_duplicate_models_are_not_classified() {
        let text = "model A {\n  b B @relation(fields: [bId], references: [id])\n}\nmodel A {\n  id Int\n}\nmodel B {\n  id Int\n}\n";
        let document = SchemaDocument::parse(text);
        assert!(relation_fields(&document).is_empty());
    }
}
