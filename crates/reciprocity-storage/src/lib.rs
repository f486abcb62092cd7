//! Reciprocity schema storage
//!
//! The reconcile pipeline never touches the filesystem directly. It talks to a
//! `SchemaStore`, which exposes exactly three operations:
//!
//! ```text
//! ┌──────────────┐  load_schema_text   ┌──────────────────┐
//! │              │◄────────────────────│  schema.prisma   │
//! │  reconcile   │  save_schema_text   │                  │
//! │              │────────────────────►│                  │
//! │              │  write_backup       ├──────────────────┤
//! │              │────────────────────►│ schema.reconcile │
//! └──────────────┘                     │ .bak             │
//!                                      └──────────────────┘
//! ```
//!
//! Two stores are provided:
//! - `FsSchemaStore`: the schema file on disk plus a sibling backup file;
//! - `MemorySchemaStore`: an in-memory store that records every save and
//!   backup (tests, dry runs, embedding).


use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("schema file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read schema {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write schema {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write backup {}: {source}", path.display())]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid store config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

// ============================================================================
// Configuration
// ============================================================================

/// Where the schema lives and how its backup is named.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Schema file (relative paths resolve against the working directory).
    pub schema_path: PathBuf,
    /// Extension that replaces the schema's own extension for the backup
    /// (`schema.prisma` → `schema.reconcile.bak`).
    pub backup_extension: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            schema_path: PathBuf::from("apps/api/prisma/schema.prisma"),
            backup_extension: "reconcile.bak".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn with_schema_path(path: impl Into<PathBuf>) -> Self {
        Self {
            schema_path: path.into(),
            ..Self::default()
        }
    }

    pub fn backup_path(&self) -> PathBuf {
        self.schema_path.with_extension(&self.backup_extension)
    }

    /// Load a JSON config file. Missing keys fall back to the defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let contents = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|err| StoreError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}

// ============================================================================
// Store interface
// ============================================================================

/// The external collaborator of the reconcile pipeline.
///
/// Callers must not let another writer touch the schema while a run holds
/// the store.
pub trait SchemaStore {
    fn load_schema_text(&self) -> Result<String, StoreError>;

    fn save_schema_text(&mut self, text: &str) -> Result<(), StoreError>;

    /// Immutable snapshot of the text as loaded, written before any mutation.
    fn write_backup(&mut self, text: &str) -> Result<(), StoreError>;
}

// ============================================================================
// Filesystem store
// ============================================================================

#[derive(Debug, Clone)]
pub struct FsSchemaStore {
    config: StoreConfig,
}

impl FsSchemaStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn schema_path(&self) -> &Path {
        &self.config.schema_path
    }

    pub fn backup_path(&self) -> PathBuf {
        self.config.backup_path()
    }
}

impl SchemaStore for FsSchemaStore {
    fn load_schema_text(&self) -> Result<String, StoreError> {
        let path = self.schema_path();
        if !path.exists() {
            return Err(StoreError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), bytes = text.len(), "loaded schema");
        Ok(text)
    }

    fn save_schema_text(&mut self, text: &str) -> Result<(), StoreError> {
        let path = self.schema_path();
        std::fs::write(path, text).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), bytes = text.len(), "saved schema");
        Ok(())
    }

    fn write_backup(&mut self, text: &str) -> Result<(), StoreError> {
        let path = self.backup_path();
        std::fs::write(&path, text).map_err(|source| StoreError::Backup {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), "wrote schema backup");
        Ok(())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MemorySchemaStore {
    text: String,
    saves: Vec<String>,
    backups: Vec<String>,
}

impl MemorySchemaStore {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Current schema text (the last save, or the initial text).
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn saves(&self) -> &[String] {
        &self.saves
    }

    pub fn backups(&self) -> &[String] {
        &self.backups
    }
}

impl SchemaStore for MemorySchemaStore {
    fn load_schema_text(&self) -> Result<String, StoreError> {
        Ok(self.text.clone())
    }

    fn save_schema_text(&mut self, text: &str) -> Result<(), StoreError> {
        self.text = text.to_string();
        self.saves.push(text.to_string());
        Ok(())
    }

    fn write_backup(&mut self, text: &str) -> Result<(), StoreError> {
        self.backups.push(text.to_string());
        Ok(())
    }
}
