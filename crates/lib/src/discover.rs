//! Glue file discovery.
//!
//! Expands `<root>/<pattern>` into the ordered list of files a load executes.
//! The order is lexicographic by absolute path, which fixes both hook order
//! and step matching priority for a given file set.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::util::path::normalize;

#[derive(Debug, Error)]
pub enum DiscoveryError {
  #[error("invalid glue pattern '{pattern}': {source}")]
  Pattern {
    pattern: String,
    #[source]
    source: glob::PatternError,
  },

  #[error("glue root not found: {0}")]
  RootNotFound(PathBuf),

  #[error("glue root is not a directory: {0}")]
  NotADirectory(PathBuf),

  #[error("glue root is not valid UTF-8: {0}")]
  NonUtf8Root(PathBuf),

  #[error("cannot read '{path}' while discovering glue: {source}")]
  Unreadable {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Find every regular file under `root` matching `pattern`.
///
/// A relative `root` is resolved against `base_dir`. The returned paths are
/// absolute, sorted, and free of aliases: when two matches canonicalize to the
/// same file (symlinks), only the first in sort order is kept.
pub fn discover_glue_files(root: &Path, pattern: &str, base_dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
  let root = if root.is_absolute() {
    normalize(root)
  } else {
    normalize(&base_dir.join(root))
  };

  if !root.exists() {
    return Err(DiscoveryError::RootNotFound(root));
  }
  if !root.is_dir() {
    return Err(DiscoveryError::NotADirectory(root));
  }

  let root_str = root.to_str().ok_or_else(|| DiscoveryError::NonUtf8Root(root.clone()))?;
  let full_pattern = format!(
    "{}/{}",
    glob::Pattern::escape(root_str.trim_end_matches(['/', '\\'])),
    pattern.trim_start_matches(['/', '\\'])
  );

  let entries = glob::glob(&full_pattern).map_err(|source| DiscoveryError::Pattern {
    pattern: pattern.to_string(),
    source,
  })?;

  let mut files = Vec::new();
  for entry in entries {
    let path = entry.map_err(|e| DiscoveryError::Unreadable {
      path: e.path().to_path_buf(),
      source: e.into_error(),
    })?;
    if path.is_file() {
      files.push(path);
    }
  }
  files.sort();

  let mut seen = HashSet::new();
  files.retain(|path| {
    let canonical = dunce::canonicalize(path).unwrap_or_else(|_| path.clone());
    let first = seen.insert(canonical);
    if !first {
      debug!(path = %path.display(), "skipping glue file already matched through another path");
    }
    first
  });

  debug!(root = %root.display(), pattern, count = files.len(), "discovered glue files");
  Ok(files)
}
