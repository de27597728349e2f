use mlua::prelude::*;

use crate::lua::loaders;

/// Create a Lua runtime ready to execute glue files.
///
/// Standard safe libraries are loaded and `dofile` is replaced with a version
/// that resolves relative paths against the calling glue file.
pub fn create_runtime() -> LuaResult<Lua> {
  let lua = Lua::new();
  loaders::install_loaders(&lua)?;
  Ok(lua)
}
