//! Reserved keys of the document format.
//!
//! A document handed to [`Registry::add_config`](crate::Registry::add_config)
//! is an ordinary [`Value::Map`](crate::Value) whose structural keys all use
//! the underscore-delimited spellings below. These keys, together with the
//! [`DEFAULT_VALUE`] sentinel and the [`INCLUDE_EXT`] file suffix, are the
//! whole on-disk contract of the registry.

/// Sentinel string meaning "inherit the existing value at this position".
///
/// Useful in lists: a merge of `["_default_", 9]` overwrites only the second
/// element. Diff patches use the same sentinel to pad unchanged indices so a
/// patch can be fed back through [`engine::merge`](crate::engine::merge).
pub const DEFAULT_VALUE: &str = "_default_";

/// Document format version (checked against the registry's version set).
pub const VERSION: &str = "_version_";

/// Unique id under which the document is registered. Required.
pub const ID: &str = "_id_";

/// Id of the aggregation group this document contributes to.
pub const GROUP: &str = "_group_";

/// Id of the document whose merged view this document builds on.
pub const PARENT: &str = "_parent_";

/// Subtree of values that overwrite the corresponding paths in the parent.
pub const MERGE: &str = "_merge_";

/// Subtree of values appended to (rather than overwriting) the parent.
pub const APPEND: &str = "_append_";

/// Shape whose leaves name paths to delete from the inherited view.
pub const REMOVE: &str = "_remove_";

/// List of files or directories to load and add before this document.
pub const INCLUDE: &str = "_include_";

/// Keys skipped by [`engine::diff`](crate::engine::diff): session-local data
/// that never counts as a configuration change.
pub const TMP: &str = "_tmp_";

/// File suffix selecting which directory entries an include directive loads.
pub const INCLUDE_EXT: &str = ".config";
