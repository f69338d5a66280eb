//!
//! Sediment: a hierarchical configuration registry.
//! This library stores named, tree-structured configuration documents and
//! resolves them into merged views layered over their ancestors.
//!
//! ## Core Concepts
//!
//! * **Documents ([`Value`] maps)**: JSON-like trees identified by an `_id_`
//!   key, carrying their settings under `_merge_`/`_append_`/`_remove_`.
//! * **Inheritance (`_parent_`)**: a document layers over its parent's merged
//!   view; chains may be arbitrarily deep.
//! * **Groups (`_group_`)**: several documents can feed one aggregate
//!   document whose content is the union of its members.
//! * **The registry ([`Registry`])**: the thread-safe store. Merged views
//!   are cached lazily and invalidated precisely when an ancestor or group
//!   member changes.
//! * **Observation ([`ChangeObserver`])**: after every mutation, a
//!   registered observer receives the minimal patch for each document whose
//!   merged view changed.
//! * **Files ([`Registry::add_config_file`])**: documents load from JSON
//!   files and `.config` directories, with `_include_` directives and
//!   `{keyword}` substitution.

pub mod engine;
pub mod keys;
pub mod loader;
pub mod observer;
pub mod registry;
pub mod subst;
pub mod value;

pub use observer::ChangeObserver;
pub use registry::Registry;
pub use value::{Map, Value};

/// Result type used throughout the Sediment library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Sediment library.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Structured registry errors from the registry module
    #[error(transparent)]
    Registry(#[from] registry::RegistryError),

    /// Structured file loading errors from the loader module
    #[error(transparent)]
    Loader(#[from] loader::LoaderError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Registry(_) => "registry",
            Error::Loader(_) => "loader",
        }
    }

    /// Check if this error indicates a missing id or file.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Registry(registry_err) => registry_err.is_not_found(),
            Error::Loader(loader_err) => loader_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates conflicting documents.
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Registry(registry_err) => registry_err.is_conflict(),
            _ => false,
        }
    }

    /// Check if this error is a version whitelist failure.
    pub fn is_version_error(&self) -> bool {
        match self {
            Error::Registry(registry_err) => registry_err.is_version_error(),
            _ => false,
        }
    }
}
