//! Reciprocity resolver.
//!
//! For every relation field `F` (source `S` -> target `T`) in discovery order:
//!
//! 1. look for a field on `T` whose type references `S` with a matching
//!    identity (identical explicit identity, or both anonymous);
//! 2. otherwise name a reciprocal field `lowerCamel(S)` pluralized plus an
//!    identity hint suffix, made unique among `T`'s fields;
//! 3. reuse `F`'s explicit identity, or synthesize `{S}{T}Relation` (unique
//!    schema-wide) and plan a rewrite stamping it onto `F`;
//! 4. plan the insertion of the reciprocal field into `T`.
//!
//! The resolver never edits text. It keeps a *planned view* of every model
//! (declared fields + planned insertions + planned identity rewrites) so a
//! later step observes the effect of earlier ones exactly as if the text had
//! already been edited.

use std::collections::{BTreeMap, BTreeSet};

use reciprocity_dsl::classify::RelationField;
use reciprocity_dsl::schema::{Name, SchemaDocument};
use serde::{Deserialize, Serialize};

use crate::naming::{
    reciprocal_field_base, synthesized_identity_base, uniquify, MAX_SUFFIX_ATTEMPTS,
};
use crate::ReconcileError;

pub(crate) const FIELD_INDENT: &str = "  ";

/// A pending field line for a target model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Insertion {
    pub target_model: Name,
    pub field_name: Name,
    pub source_model: Name,
    pub relation_identity: String,
    /// Rendered line, without line ending.
    pub line: String,
}

impl Insertion {
    pub fn new(
        target_model: impl Into<Name>,
        field_name: impl Into<Name>,
        source_model: impl Into<Name>,
        relation_identity: impl Into<String>,
    ) -> Self {
        let field_name = field_name.into();
        let source_model = source_model.into();
        let relation_identity = relation_identity.into();
        let line = render_field_line(&field_name, &source_model, &relation_identity);
        Self {
            target_model: target_model.into(),
            field_name,
            source_model,
            relation_identity,
            line,
        }
    }
}

pub fn render_field_line(field_name: &str, source_model: &str, identity: &str) -> String {
    format!("{FIELD_INDENT}{field_name} {source_model}[] @relation(\"{identity}\")")
}

/// Stamp a synthesized identity onto the source field's `@relation(` clause.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityRewrite {
    pub model: Name,
    pub field: Name,
    /// Document line of the field declaration.
    pub line: usize,
    /// Byte column just past `@relation(`.
    pub column: usize,
    pub relation_identity: String,
}

impl IdentityRewrite {
    pub fn inserted_text(&self) -> String {
        format!("\"{}\", ", self.relation_identity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// More than one anonymous key-mapped relation between the same ordered
    /// pair. They cannot be told apart; each is resolved independently.
    AmbiguousAnonymousRelations {
        source_model: Name,
        target_model: Name,
        fields: Vec<Name>,
    },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::AmbiguousAnonymousRelations {
                source_model,
                target_model,
                fields,
            } => write!(
                f,
                "{source_model} has {} anonymous relations to {target_model}: {}",
                fields.len(),
                fields.join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionPlan {
    /// Discovery order.
    pub insertions: Vec<Insertion>,
    pub rewrites: Vec<IdentityRewrite>,
    pub diagnostics: Vec<Diagnostic>,
    /// Input identities plus every identity synthesized by this plan.
    pub used_identities: BTreeSet<String>,
}

// ============================================================================
// Planned view
// ============================================================================

#[derive(Debug, Clone)]
struct PlannedField {
    name: Name,
    /// Referenced type with list / nullable markers stripped.
    target: Name,
    identity: Option<String>,
}

#[derive(Debug, Default)]
struct PlannedModel {
    fields: Vec<PlannedField>,
    names: BTreeSet<Name>,
}

impl PlannedModel {
    fn push(&mut self, field: PlannedField) {
        self.names.insert(field.name.clone());
        self.fields.push(field);
    }
}

#[derive(Debug, Default)]
struct PlannedSchema {
    models: BTreeMap<Name, PlannedModel>,
}

impl PlannedSchema {
    fn from_document(document: &SchemaDocument) -> Self {
        let mut planned = Self::default();
        for model in document.effective_models() {
            planned
                .models
                .entry(model.name.clone())
                .or_default()
                .names
                .extend(model.member_names.iter().cloned());
            for decl in &model.fields {
                planned.push(
                    &model.name,
                    PlannedField {
                        name: decl.name.clone(),
                        target: decl.ty.name.clone(),
                        identity: decl.relation_name().map(str::to_string),
                    },
                );
            }
        }
        planned
    }

    fn fields(&self, model: &str) -> &[PlannedField] {
        self.models
            .get(model)
            .map(|m| m.fields.as_slice())
            .unwrap_or_default()
    }

    /// A field on the target pointing back at the source with a matching
    /// identity. For self-relations the field itself does not count.
    fn find_reciprocal(&self, field: &RelationField) -> Option<&PlannedField> {
        let is_self = field.source == field.target;
        self.fields(&field.target).iter().find(|candidate| {
            candidate.target == field.source
                && !(is_self && candidate.name == field.field)
                && candidate.identity == field.identity
        })
    }

    fn field_taken(&self, model: &str, name: &str) -> bool {
        self.models
            .get(model)
            .is_some_and(|m| m.names.contains(name))
    }

    fn push(&mut self, model: &str, field: PlannedField) {
        self.models.entry(model.to_string()).or_default().push(field);
    }

    fn set_identity(&mut self, model: &str, field: &str, identity: &str) {
        if let Some(planned) = self
            .models
            .get_mut(model)
            .and_then(|m| m.fields.iter_mut().find(|f| f.name == field))
        {
            planned.identity = Some(identity.to_string());
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Plan every missing reciprocal field.
///
/// `used_identities` is the set of identities already present in the schema;
/// the returned plan carries it forward with the synthesized ones added.
pub fn resolve(
    document: &SchemaDocument,
    fields: &[RelationField],
    used_identities: BTreeSet<String>,
) -> Result<ResolutionPlan, ReconcileError> {
    let mut planned = PlannedSchema::from_document(document);
    let mut plan = ResolutionPlan {
        diagnostics: ambiguous_anonymous_relations(fields),
        used_identities,
        ..ResolutionPlan::default()
    };

    for field in fields {
        if let Some(existing) = planned.find_reciprocal(field) {
            tracing::debug!(
                source = %field.source,
                field = %field.field,
                target = %field.target,
                reciprocal = %existing.name,
                "relation already reciprocal"
            );
            continue;
        }

        let base = reciprocal_field_base(&field.source, field.identity.as_deref());
        let field_name = uniquify(&base, |candidate| {
            planned.field_taken(&field.target, candidate)
        })
        .ok_or_else(|| ReconcileError::CollisionExhausted {
            model: field.target.clone(),
            base: base.clone(),
            attempts: MAX_SUFFIX_ATTEMPTS,
        })?;

        let identity = match &field.identity {
            Some(identity) => identity.clone(),
            None => {
                let identity = synthesize_identity(field, &plan.used_identities)?;
                plan.used_identities.insert(identity.clone());
                match identity_rewrite(document, field, &identity) {
                    Some(rewrite) => {
                        tracing::debug!(
                            model = %rewrite.model,
                            field = %rewrite.field,
                            identity = %identity,
                            "planned identity rewrite"
                        );
                        plan.rewrites.push(rewrite);
                    }
                    None => tracing::warn!(
                        model = %field.source,
                        field = %field.field,
                        "source field has no @relation clause to stamp"
                    ),
                }
                planned.set_identity(&field.source, &field.field, &identity);
                identity
            }
        };

        planned.push(
            &field.target,
            PlannedField {
                name: field_name.clone(),
                target: field.source.clone(),
                identity: Some(identity.clone()),
            },
        );
        tracing::debug!(
            target = %field.target,
            field = %field_name,
            identity = %identity,
            "planned reciprocal insertion"
        );
        plan.insertions.push(Insertion::new(
            field.target.clone(),
            field_name,
            field.source.clone(),
            identity,
        ));
    }

    Ok(plan)
}

fn synthesize_identity(
    field: &RelationField,
    used: &BTreeSet<String>,
) -> Result<String, ReconcileError> {
    let base = synthesized_identity_base(&field.source, &field.target);
    uniquify(&base, |candidate| used.contains(candidate)).ok_or_else(|| {
        ReconcileError::CollisionExhausted {
            model: field.source.clone(),
            base,
            attempts: MAX_SUFFIX_ATTEMPTS,
        }
    })
}

fn identity_rewrite(
    document: &SchemaDocument,
    field: &RelationField,
    identity: &str,
) -> Option<IdentityRewrite> {
    let decl = document.model(&field.source)?.field(&field.field)?;
    Some(IdentityRewrite {
        model: field.source.clone(),
        field: field.field.clone(),
        line: decl.line,
        column: decl.relation_args_column()?,
        relation_identity: identity.to_string(),
    })
}

fn ambiguous_anonymous_relations(fields: &[RelationField]) -> Vec<Diagnostic> {
    let mut anonymous: BTreeMap<(&str, &str), Vec<Name>> = BTreeMap::new();
    for field in fields.iter().filter(|f| f.identity.is_none()) {
        anonymous
            .entry((field.source.as_str(), field.target.as_str()))
            .or_default()
            .push(field.field.clone());
    }

    anonymous
        .into_iter()
        .filter(|(_, names)| names.len() > 1)
        .map(|((source, target), fields)| {
            tracing::warn!(
                source = source,
                target = target,
                fields = ?fields,
                "ambiguous anonymous relations"
            );
            Diagnostic::AmbiguousAnonymousRelations {
                source_model: source.to_string(),
                target_model: target.to_string(),
                fields,
            }
        })
        .collect()
}
