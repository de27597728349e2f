//! Registration callbacks behind the glue keywords.
//!
//! | Keyword                                  | Registers              |
//! |------------------------------------------|------------------------|
//! | `Given`, `When`, `Then`, `And`, `But`    | a [`StepDefinition`]   |
//! | `Before`                                 | a before [`Hook`]      |
//! | `After`                                  | an after [`Hook`]      |
//!
//! The five step keywords share one callback, so the keyword a glue author
//! picked is not recorded. Each registration captures the caller's
//! [`Location`] through [`locate_caller`].

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use mlua::prelude::*;
use tracing::debug;

use crate::glue::{Hook, HookPhase, Location, StepDefinition};
use crate::lua::globals::GlobalBindings;
use crate::lua::locate::{LocateError, SourceIndex, locate_caller};

pub const STEP_KEYWORDS: &[&str] = &["Given", "When", "Then", "And", "But"];
pub const BEFORE_KEYWORDS: &[&str] = &["Before"];
pub const AFTER_KEYWORDS: &[&str] = &["After"];

/// A group of keywords bound to the same registration callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Registration {
  Step,
  BeforeHook,
  AfterHook,
}

impl Registration {
  pub const ALL: [Registration; 3] = [Registration::Step, Registration::BeforeHook, Registration::AfterHook];

  pub fn keywords(self) -> &'static [&'static str] {
    match self {
      Registration::Step => STEP_KEYWORDS,
      Registration::BeforeHook => BEFORE_KEYWORDS,
      Registration::AfterHook => AFTER_KEYWORDS,
    }
  }
}

/// Every DSL keyword, in installation order.
pub fn all_keywords() -> impl Iterator<Item = &'static str> {
  Registration::ALL.into_iter().flat_map(|r| r.keywords().iter().copied())
}

/// Accumulators for one load.
#[derive(Debug, Default)]
struct Registry {
  steps: Vec<StepDefinition>,
  hooks: Vec<Hook>,
  closed: bool,
}

/// State shared by the callbacks of one load.
///
/// Created empty for every load and closed when the load ends. Callbacks that
/// outlive their load (a glue file can stash `local G = Given`) raise an error
/// instead of registering into a finished load.
pub struct DslState {
  registry: RefCell<Registry>,
  sources: SourceIndex,
  base_dir: PathBuf,
  locate_failure: RefCell<Option<LocateError>>,
}

impl DslState {
  pub fn new(base_dir: PathBuf) -> Self {
    Self {
      registry: RefCell::new(Registry::default()),
      sources: SourceIndex::default(),
      base_dir,
      locate_failure: RefCell::new(None),
    }
  }

  /// Stop accepting registrations and hand over everything registered so far.
  pub fn close(&self) -> (Vec<StepDefinition>, Vec<Hook>) {
    let mut registry = self.registry.borrow_mut();
    registry.closed = true;
    (std::mem::take(&mut registry.steps), std::mem::take(&mut registry.hooks))
  }

  /// The first call-site failure seen since the last call, if any.
  pub fn take_locate_failure(&self) -> Option<LocateError> {
    self.locate_failure.borrow_mut().take()
  }

  fn ensure_open(&self) -> LuaResult<()> {
    if self.registry.borrow().closed {
      return Err(LuaError::external(
        "glue keywords can only be used while glue files are loading",
      ));
    }
    Ok(())
  }

  fn locate(&self, lua: &Lua, registration: Registration) -> LuaResult<Location> {
    locate_caller(lua, &self.sources, registration, &self.base_dir).map_err(|e| {
      self.locate_failure.borrow_mut().get_or_insert_with(|| e.clone());
      LuaError::external(e)
    })
  }

  fn register_step(&self, step: StepDefinition) {
    debug!(pattern = %step.pattern, location = %step.location, "registered step definition");
    self.registry.borrow_mut().steps.push(step);
  }

  fn register_hook(&self, hook: Hook) {
    debug!(phase = %hook.phase, location = %hook.location, "registered hook");
    self.registry.borrow_mut().hooks.push(hook);
  }
}

fn expect_function(value: LuaValue, what: &str) -> LuaResult<LuaFunction> {
  match value {
    LuaValue::Function(f) => Ok(f),
    other => Err(LuaError::external(format!(
      "{} must be a function, got {}",
      what,
      other.type_name()
    ))),
  }
}

fn create_step_callback(lua: &Lua, state: Rc<DslState>) -> LuaResult<LuaFunction> {
  lua.create_function(move |lua, (pattern, body): (LuaValue, LuaValue)| {
    state.ensure_open()?;
    let pattern = match pattern {
      LuaValue::String(s) => s.to_str()?.to_string(),
      other => {
        return Err(LuaError::external(format!(
          "step pattern must be a string, got {}",
          other.type_name()
        )));
      }
    };
    let body = expect_function(body, "step body")?;
    let location = state.locate(lua, Registration::Step)?;
    state.register_step(StepDefinition::new(pattern, body, location));
    Ok(())
  })
}

fn create_hook_callback(lua: &Lua, state: Rc<DslState>, phase: HookPhase) -> LuaResult<LuaFunction> {
  let registration = match phase {
    HookPhase::Before => Registration::BeforeHook,
    HookPhase::After => Registration::AfterHook,
  };
  lua.create_function(move |lua, body: LuaValue| {
    state.ensure_open()?;
    let body = expect_function(body, &format!("{} hook body", phase))?;
    let location = state.locate(lua, registration)?;
    state.register_hook(Hook::new(body, location, phase));
    Ok(())
  })
}

/// Create the three registration callbacks and bind them to their keywords.
pub fn install_dsl(lua: &Lua, bindings: &mut GlobalBindings, state: &Rc<DslState>) -> LuaResult<()> {
  bindings.install(STEP_KEYWORDS, &create_step_callback(lua, Rc::clone(state))?)?;
  bindings.install(
    BEFORE_KEYWORDS,
    &create_hook_callback(lua, Rc::clone(state), HookPhase::Before)?,
  )?;
  bindings.install(
    AFTER_KEYWORDS,
    &create_hook_callback(lua, Rc::clone(state), HookPhase::After)?,
  )?;
  Ok(())
}
