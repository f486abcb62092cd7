use reciprocity_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The numeric-suffix search for a free name gave up. Only pathological
    /// inputs get here.
    #[error("no free name for `{base}` in model `{model}` after {attempts} attempts")]
    CollisionExhausted {
        model: String,
        base: String,
        attempts: usize,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}
