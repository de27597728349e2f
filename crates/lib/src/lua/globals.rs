//! Temporary keyword bindings in `_G`.
//!
//! [`GlobalBindings`] swaps DSL keywords into the globals table for the length
//! of one load and puts back whatever was there before. A keyword that did
//! not exist before the load is removed again, not left behind as a stale
//! callback.
//!
//! All access is raw (`rawget`/`rawset`), so a strict-mode metatable on `_G`
//! does not interfere with the swap.

use std::collections::BTreeMap;

use mlua::prelude::*;
use tracing::{debug, warn};

/// Keyword bindings installed into `_G`, together with their pre-load values.
pub struct GlobalBindings {
  globals: LuaTable,
  saved: BTreeMap<String, LuaValue>,
  restored: bool,
}

impl GlobalBindings {
  pub fn new(lua: &Lua) -> Self {
    Self {
      globals: lua.globals(),
      saved: BTreeMap::new(),
      restored: false,
    }
  }

  /// Bind every keyword in `keywords` to `callback`.
  ///
  /// The first install of a keyword records its current value (`nil` when
  /// absent). Installing the same keyword again replaces the binding but keeps
  /// the original saved value, so the last install wins during the load and
  /// the pre-load value comes back afterwards.
  pub fn install(&mut self, keywords: &[&str], callback: &LuaFunction) -> LuaResult<()> {
    for &keyword in keywords {
      if !self.saved.contains_key(keyword) {
        let previous: LuaValue = self.globals.raw_get(keyword)?;
        self.saved.insert(keyword.to_string(), previous);
      }
      self.globals.raw_set(keyword, callback.clone())?;
    }
    debug!(?keywords, "installed glue keywords");
    Ok(())
  }

  /// Keywords currently held by these bindings.
  pub fn keywords(&self) -> impl Iterator<Item = &str> {
    self.saved.keys().map(String::as_str)
  }

  /// Put every keyword back to its pre-load value.
  ///
  /// Every keyword is attempted even if an earlier one fails; the first error
  /// is returned.
  pub fn restore(mut self) -> LuaResult<()> {
    self.restore_all()
  }

  fn restore_all(&mut self) -> LuaResult<()> {
    self.restored = true;
    let keywords: Vec<String> = self.keywords().map(str::to_string).collect();
    let mut first_error = None;
    for (keyword, previous) in std::mem::take(&mut self.saved) {
      if let Err(e) = self.globals.raw_set(keyword.as_str(), previous) {
        first_error.get_or_insert(e);
      }
    }
    debug!(?keywords, "restored glue keywords");
    match first_error {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }
}

impl Drop for GlobalBindings {
  fn drop(&mut self) {
    if !self.restored
      && let Err(e) = self.restore_all()
    {
      warn!(error = %e, "failed to restore glue keywords while unwinding");
    }
  }
}
