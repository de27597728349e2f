//! Loader configuration.
//!
//! Defaults cover the common layout (every `.lua` file under the glue root,
//! locations relative to the process working directory). Both settings can be
//! overridden through `CUKE_*` environment variables.

use std::path::PathBuf;

use crate::consts::{BASE_DIR_ENV, DEFAULT_GLUE_PATTERN, GLUE_PATTERN_ENV};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
  /// Glob, relative to the glue root, selecting the files to load.
  pub pattern: String,
  /// Directory that relative roots resolve against and that locations are
  /// reported relative to. `None` means the process working directory at
  /// load time.
  pub base_dir: Option<PathBuf>,
}

impl Default for LoaderConfig {
  fn default() -> Self {
    Self {
      pattern: DEFAULT_GLUE_PATTERN.to_string(),
      base_dir: None,
    }
  }
}

impl LoaderConfig {
  /// Read `CUKE_GLUE_PATTERN` and `CUKE_BASE_DIR`, falling back to defaults.
  /// Empty values count as unset.
  pub fn from_env() -> Self {
    let pattern = std::env::var(GLUE_PATTERN_ENV)
      .ok()
      .filter(|p| !p.is_empty())
      .unwrap_or_else(|| DEFAULT_GLUE_PATTERN.to_string());
    let base_dir = std::env::var_os(BASE_DIR_ENV)
      .filter(|d| !d.is_empty())
      .map(PathBuf::from);
    Self { pattern, base_dir }
  }

  pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
    self.pattern = pattern.into();
    self
  }

  pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
    self.base_dir = Some(base_dir.into());
    self
  }

  /// The effective base directory.
  pub fn resolve_base_dir(&self) -> std::io::Result<PathBuf> {
    match &self.base_dir {
      Some(dir) if dir.is_absolute() => Ok(dir.clone()),
      Some(dir) => Ok(std::env::current_dir()?.join(dir)),
      None => std::env::current_dir(),
    }
  }
}
