//! Error types for registry operations.
//!
//! Every variant carries the offending id (or version) so callers can report
//! failures without re-deriving context. Validation is eager: an operation
//! that returns an error has not mutated the registry.

use thiserror::Error;

/// Structured error types for registry mutations and reads.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The document has no `_id_` key (or it is not a string).
    #[error("document has no valid config id")]
    MissingId,

    /// The registry has a version whitelist but the document names none.
    #[error("document '{id}' does not specify a config version")]
    UnspecifiedVersion { id: String },

    /// The document names a version outside the whitelist.
    #[error("document '{id}' has unsupported config version '{version}'")]
    UnsupportedVersion { id: String, version: String },

    /// The document names a parent id that is not registered.
    #[error("document '{id}' names unknown parent '{parent}'")]
    InvalidParent { id: String, parent: String },

    /// Two documents sharing an id (or a member and its group) disagree on
    /// an identity field.
    #[error("config conflict for '{id}': {field} differs")]
    ConfigConflict { id: String, field: &'static str },

    /// An `_include_` directive is not a list, or one of its entries has an
    /// unusable type.
    #[error("include directive of '{id}' must be a list of paths or records")]
    InvalidIncludeType { id: String },

    /// A record-form include entry lacks its required `path`.
    #[error("include entry of '{id}' is missing its path")]
    MissingIncludePath { id: String },

    /// An operation referenced an id that is not registered, or asked for
    /// the raw form of a group (groups have no caller-supplied raw).
    #[error("invalid config id '{id}'")]
    InvalidId { id: String },

    /// Removal was refused because other documents still build on this one.
    #[error("config '{id}' still has dependents: {dependents:?}")]
    HasDependents {
        id: String,
        dependents: Vec<String>,
    },
}

impl RegistryError {
    /// Check if this error indicates a missing or unknown id.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::InvalidId { .. })
    }

    /// Check if this error indicates a conflict between documents.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            RegistryError::ConfigConflict { .. } | RegistryError::HasDependents { .. }
        )
    }

    /// Check if this error is a version whitelist failure.
    pub fn is_version_error(&self) -> bool {
        matches!(
            self,
            RegistryError::UnspecifiedVersion { .. } | RegistryError::UnsupportedVersion { .. }
        )
    }
}
