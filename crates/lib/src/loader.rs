//! Loading documents from JSON files and `.config` directories.
//!
//! [`Registry::add_config_file`] accepts a file or directory path. A file is
//! parsed as one JSON document and added with include processing enabled and
//! the file's directory as the base for relative includes (also exposed to
//! substitution as the `CURRENT_DIR` keyword). A directory is scanned for
//! `.config` files, which load in lexicographic order so layering between
//! sibling files is deterministic.

use std::{
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::{Registry, Result, value::Value};

/// Errors for file and directory loading.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The path names neither an existing file nor a directory.
    #[error("config file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// The file parsed as JSON but its top level is not an object.
    #[error("config file is not a JSON object: {}", path.display())]
    NotADocument { path: PathBuf },

    /// Something inside the file failed to load; the source chain ends at
    /// the root cause (a parse error, a registry error, or a nested include
    /// failure).
    #[error("invalid config file: {}", path.display())]
    InvalidConfigFile {
        path: PathBuf,
        source: Box<crate::Error>,
    },
}

impl LoaderError {
    /// Check if this error indicates a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoaderError::FileNotFound { .. })
    }
}

impl Registry {
    /// Loads a config file or directory into the registry.
    ///
    /// A relative `path` is resolved against `dir` when one is given. With
    /// `optional` set, a missing path is silently skipped. For directories,
    /// `subdirectories` additionally loads first-level subdirectories (after
    /// the directory's own files); nesting does not recurse further.
    ///
    /// Any failure below the top level is wrapped in
    /// [`LoaderError::InvalidConfigFile`] carrying this path, so nested
    /// include failures report the full chain of files involved.
    pub fn add_config_file(
        &self,
        path: impl AsRef<Path>,
        include: bool,
        dir: Option<&Path>,
        optional: bool,
        subdirectories: bool,
    ) -> Result<()> {
        let path = path.as_ref();
        let full = match dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        };
        if !full.exists() {
            if optional {
                tracing::debug!(path = %full.display(), "skipping optional config file");
                return Ok(());
            }
            return Err(LoaderError::FileNotFound { path: full }.into());
        }
        let result = if full.is_dir() {
            self.load_directory(&full, include, subdirectories)
        } else {
            self.load_file(&full, include)
        };
        result.map_err(|source| {
            LoaderError::InvalidConfigFile {
                path: full,
                source: Box::new(source),
            }
            .into()
        })
    }

    fn load_file(&self, path: &Path, include: bool) -> Result<()> {
        tracing::debug!(path = %path.display(), "loading config file");
        let text = fs::read_to_string(path)?;
        let doc: Value = serde_json::from_str(&text)?;
        if !doc.is_map() {
            return Err(LoaderError::NotADocument {
                path: path.to_path_buf(),
            }
            .into());
        }
        self.add_config(doc, include, path.parent())
    }

    fn load_directory(&self, path: &Path, include: bool, subdirectories: bool) -> Result<()> {
        tracing::debug!(path = %path.display(), "loading config directory");
        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry_path = entry?.path();
            if entry_path.is_dir() {
                if subdirectories {
                    dirs.push(entry_path);
                }
            } else if has_config_extension(&entry_path) {
                files.push(entry_path);
            }
        }
        files.sort();
        dirs.sort();
        for file in files {
            self.add_config_file(&file, include, None, false, false)?;
        }
        for dir in dirs {
            self.add_config_file(&dir, include, None, false, false)?;
        }
        Ok(())
    }
}

fn has_config_extension(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(crate::keys::INCLUDE_EXT))
}
