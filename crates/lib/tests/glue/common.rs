//! Shared helpers for glue loading tests.

use std::path::{Path, PathBuf};

use cuke_lib::{GlueLoader, LoaderConfig};
use tempfile::TempDir;

/// Isolated project directory with a loader whose locations are relative to it.
pub struct TestEnv {
  pub temp: TempDir,
  pub loader: GlueLoader,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let loader = GlueLoader::new(LoaderConfig::default().with_base_dir(temp.path())).unwrap();
    Self { temp, loader }
  }

  /// Write a file relative to the project directory.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  /// Glue directory used by most tests.
  pub fn glue_dir(&self) -> PathBuf {
    let dir = self.temp.path().join("features");
    std::fs::create_dir_all(&dir).unwrap();
    dir
  }

  /// Evaluate a Lua expression in the loader's runtime.
  pub fn eval<T: mlua::FromLua>(&self, code: &str) -> T {
    self.loader.lua().load(code).eval().unwrap()
  }
}
