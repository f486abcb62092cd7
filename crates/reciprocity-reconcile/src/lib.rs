//! Relation reciprocity reconciler
//!
//! Pipeline:
//!
//! ```text
//! text ──parse──► SchemaDocument ──classify──► [RelationField]
//!                      │                              │
//!                      │                         resolve (planned view,
//!                      │                          used identities)
//!                      │                              │
//!                      └──────────render◄─── insertions + rewrites
//!                                   │
//!                                   ▼
//!                            new text + report
//! ```
//!
//! The parse tree is built once and never mutated; the output text is
//! rendered once from the plan. `reconcile` wraps the pipeline with a
//! [`SchemaStore`]: load, back up, plan, save.

mod error;
pub mod naming;
pub mod resolver;
pub mod splice;

pub use error::ReconcileError;
pub use resolver::{resolve, Diagnostic, IdentityRewrite, Insertion, ResolutionPlan};
pub use splice::{render, splice, SkipReason, SkippedInsertion, SpliceOutcome};

use reciprocity_dsl::classify::relation_fields;
use reciprocity_dsl::schema::{Name, SchemaDocument};
use reciprocity_storage::SchemaStore;
use serde::{Deserialize, Serialize};

/// One applied insertion as shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InsertionDetail {
    pub target_model: Name,
    pub field_name: Name,
    pub relation_identity: String,
}

impl From<&Insertion> for InsertionDetail {
    fn from(insertion: &Insertion) -> Self {
        Self {
            target_model: insertion.target_model.clone(),
            field_name: insertion.field_name.clone(),
            relation_identity: insertion.relation_identity.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconcileReport {
    pub insertions_applied: usize,
    /// Applied insertions in discovery order.
    pub details: Vec<InsertionDetail>,
    pub identity_rewrites: Vec<IdentityRewrite>,
    pub skipped: Vec<SkippedInsertion>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ReconcileReport {
    pub fn insertions_skipped(&self) -> usize {
        self.skipped.len()
    }

    /// True when the run leaves the text unchanged.
    pub fn is_noop(&self) -> bool {
        self.insertions_applied == 0 && self.identity_rewrites.is_empty()
    }
}

/// The rendered result of a reconcile, before anything is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub text: String,
    pub report: ReconcileReport,
}

/// Plan a reconcile of `text` without touching any store.
pub fn plan_reconcile(text: &str) -> Result<ReconcilePlan, ReconcileError> {
    let document = SchemaDocument::parse(text);
    let fields = relation_fields(&document);
    tracing::debug!(
        models = document.models.len(),
        relation_fields = fields.len(),
        "parsed schema"
    );

    let plan = resolve(&document, &fields, document.relation_identities())?;
    let outcome = render(&document, &plan.rewrites, &plan.insertions);

    let report = ReconcileReport {
        insertions_applied: outcome.applied.len(),
        details: outcome.applied.iter().map(InsertionDetail::from).collect(),
        identity_rewrites: outcome.rewrites_applied,
        skipped: outcome.skipped,
        diagnostics: plan.diagnostics,
    };
    Ok(ReconcilePlan {
        text: outcome.text,
        report,
    })
}

/// Load the schema, write the backup, apply every missing reciprocal field
/// and save the result.
///
/// The backup is written before planning, so it exists even when planning
/// fails. The schema is saved only when the text actually changes.
pub fn reconcile<S: SchemaStore + ?Sized>(store: &mut S) -> Result<ReconcileReport, ReconcileError> {
    let original = store.load_schema_text()?;
    store.write_backup(&original)?;

    let plan = plan_reconcile(&original)?;
    if plan.text != original {
        store.save_schema_text(&plan.text)?;
    }

    tracing::info!(
        applied = plan.report.insertions_applied,
        skipped = plan.report.insertions_skipped(),
        rewrites = plan.report.identity_rewrites.len(),
        "reconcile finished"
    );
    Ok(plan.report)
}
