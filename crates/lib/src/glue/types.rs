//! Glue value types.
//!
//! Every record carries the [`Location`] of the declaration that produced it,
//! captured when the glue file ran. The Lua bodies are kept as live
//! [`LuaFunction`] handles so the runner can call them later; they are skipped
//! when a record is serialized.

use std::fmt;
use std::path::PathBuf;

use mlua::prelude::*;
use serde::{Deserialize, Serialize};

/// Where a glue author wrote a registration call.
///
/// `path` is relative to the loader's base directory; `line` and `column` are
/// 1-based.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
  pub path: PathBuf,
  pub line: usize,
  pub column: usize,
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.path.display(), self.line, self.column)
  }
}

/// A pattern paired with the Lua function run when a step's text matches it.
#[derive(Debug, Clone, Serialize)]
pub struct StepDefinition {
  pub pattern: String,
  #[serde(skip)]
  pub body: LuaFunction,
  pub location: Location,
}

impl StepDefinition {
  pub fn new(pattern: impl Into<String>, body: LuaFunction, location: Location) -> Self {
    Self {
      pattern: pattern.into(),
      body,
      location,
    }
  }
}

/// When a hook runs relative to each scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookPhase {
  Before,
  After,
}

impl HookPhase {
  pub fn as_str(self) -> &'static str {
    match self {
      HookPhase::Before => "before",
      HookPhase::After => "after",
    }
  }
}

impl fmt::Display for HookPhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A Lua function run before or after every scenario.
#[derive(Debug, Clone, Serialize)]
pub struct Hook {
  #[serde(skip)]
  pub body: LuaFunction,
  pub location: Location,
  pub phase: HookPhase,
}

impl Hook {
  pub fn new(body: LuaFunction, location: Location, phase: HookPhase) -> Self {
    Self { body, location, phase }
  }
}

/// Everything declared by one glue load.
///
/// Both sequences are in declaration order: discovery order of the files,
/// then statement order within each file. Steps and hooks are independent
/// sequences.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Glue {
  pub step_definitions: Vec<StepDefinition>,
  pub hooks: Vec<Hook>,
}

impl Glue {
  /// Build the aggregate. Has the glue factory signature, so it can be passed
  /// straight to [`crate::GlueLoader::load_glue`].
  pub fn new(step_definitions: Vec<StepDefinition>, hooks: Vec<Hook>) -> Self {
    Self { step_definitions, hooks }
  }

  pub fn before_hooks(&self) -> impl Iterator<Item = &Hook> {
    self.hooks.iter().filter(|h| h.phase == HookPhase::Before)
  }

  pub fn after_hooks(&self) -> impl Iterator<Item = &Hook> {
    self.hooks.iter().filter(|h| h.phase == HookPhase::After)
  }

  pub fn is_empty(&self) -> bool {
    self.step_definitions.is_empty() && self.hooks.is_empty()
  }

  /// Short human-readable count, used in log output.
  pub fn summary(&self) -> String {
    format!(
      "{} step definitions, {} before hooks, {} after hooks",
      self.step_definitions.len(),
      self.before_hooks().count(),
      self.after_hooks().count()
    )
  }

  /// Serialize the declarations (patterns, phases, locations) as pretty JSON.
  pub fn to_json_pretty(&self) -> serde_json::Result<String> {
    serde_json::to_string_pretty(self)
  }
}
