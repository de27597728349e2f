//! Glue file execution with per-file `__dir` injection.
//!
//! Each glue file runs once in its own environment table that holds `__dir`
//! (the directory of the file) and forwards every other read and write to
//! `_G`. Injected keywords are therefore visible, and globals a glue file
//! defines still land in `_G` where later files can see them.
//!
//! `dofile` is replaced so that support files can be pulled in relative to
//! the glue file that asks for them.
//!
//! While a load is tracked ([`begin_tracking`]), every executed file is
//! recorded by canonical path, so a glue file that an earlier one already
//! pulled in with `dofile` can be skipped.

use std::fs;
use std::path::{Path, PathBuf};

use mlua::prelude::*;

use crate::util::path::normalize;

/// Registry key holding the `__dir` of the file currently executing.
const CURRENT_DIR_KEY: &str = "__cuke_current_dir";

/// Registry key holding the set of files executed during the current load.
const EXECUTED_FILES_KEY: &str = "__cuke_executed_files";

/// Start recording executed files.
pub fn begin_tracking(lua: &Lua) -> LuaResult<()> {
  lua.set_named_registry_value(EXECUTED_FILES_KEY, lua.create_table()?)
}

/// Stop recording executed files and forget the recorded set.
pub fn end_tracking(lua: &Lua) -> LuaResult<()> {
  lua.unset_named_registry_value(EXECUTED_FILES_KEY)
}

/// Whether `path` has run since [`begin_tracking`].
pub fn already_executed(lua: &Lua, path: &Path) -> LuaResult<bool> {
  let executed: Option<LuaTable> = lua.named_registry_value(EXECUTED_FILES_KEY)?;
  match executed {
    Some(executed) => executed.contains_key(tracking_key(path)),
    None => Ok(false),
  }
}

fn record_executed(lua: &Lua, path: &Path) -> LuaResult<()> {
  let executed: Option<LuaTable> = lua.named_registry_value(EXECUTED_FILES_KEY)?;
  if let Some(executed) = executed {
    executed.set(tracking_key(path), true)?;
  }
  Ok(())
}

fn tracking_key(path: &Path) -> String {
  dunce::canonicalize(path)
    .unwrap_or_else(|_| normalize(path))
    .to_string_lossy()
    .into_owned()
}

/// Execute a glue file's top-level code once.
///
/// The chunk is named `@<path>` so that the call-site locator can map frames
/// back to the file. The path is used as given; callers pass absolute paths.
pub fn exec_glue_file(lua: &Lua, path: &Path) -> LuaResult<()> {
  load_file_with_dir(lua, path).map(|_| ())
}

/// Load and evaluate a Lua file with `__dir` set to its parent directory.
pub fn load_file_with_dir(lua: &Lua, path: &Path) -> LuaResult<LuaValue> {
  let content = fs::read_to_string(path)
    .map_err(|e| LuaError::external(format!("cannot read '{}': {}", path.display(), e)))?;

  let dir = path
    .parent()
    .unwrap_or(Path::new("."))
    .to_string_lossy()
    .into_owned();

  record_executed(lua, path)?;

  let prev_dir: Option<String> = lua.named_registry_value(CURRENT_DIR_KEY)?;
  lua.set_named_registry_value(CURRENT_DIR_KEY, dir.clone())?;

  let result = dir_environment(lua, &dir).and_then(|env| {
    lua
      .load(&content)
      .set_name(format!("@{}", path.display()))
      .set_environment(env)
      .eval::<LuaValue>()
  });

  // Restore even on failure; a cleanup error must not mask the load error.
  let _ = lua.set_named_registry_value(CURRENT_DIR_KEY, prev_dir);

  result
}

/// Environment table with `__dir` that inherits from and writes through to `_G`.
fn dir_environment(lua: &Lua, dir: &str) -> LuaResult<LuaTable> {
  let env = lua.create_table()?;
  env.set("__dir", dir)?;

  let mt = lua.create_table()?;
  mt.set("__index", lua.globals())?;
  mt.set("__newindex", lua.globals())?;
  env.set_metatable(Some(mt))?;
  Ok(env)
}

/// Resolve a `dofile` argument against the `__dir` of the running file.
fn resolve_path(lua: &Lua, path_str: &str) -> LuaResult<PathBuf> {
  let path = Path::new(path_str);
  if path.is_absolute() {
    return Ok(normalize(path));
  }

  let current: Option<String> = lua.named_registry_value(CURRENT_DIR_KEY)?;
  match current {
    Some(dir) => Ok(normalize(&Path::new(&dir).join(path))),
    None => {
      let cwd = std::env::current_dir().map_err(LuaError::external)?;
      Ok(normalize(&cwd.join(path)))
    }
  }
}

fn create_dofile(lua: &Lua) -> LuaResult<LuaFunction> {
  lua.create_function(|lua, path: Option<String>| match path {
    Some(path_str) => {
      let resolved = resolve_path(lua, &path_str)?;
      load_file_with_dir(lua, &resolved)
    }
    None => Err(LuaError::external("dofile() without path not supported")),
  })
}

/// Replace the global `dofile` with the `__dir`-aware version.
pub fn install_loaders(lua: &Lua) -> LuaResult<()> {
  lua.globals().set("dofile", create_dofile(lua)?)?;
  Ok(())
}
