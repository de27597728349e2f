//! The glue load cycle.
//!
//! [`GlueLoader::load_glue`] discovers the glue files under a root, swaps the
//! DSL keywords into `_G`, executes every file once, puts `_G` back the way it
//! was, and hands the registered steps and hooks to a caller-supplied factory.
//!
//! ```text
//! Idle -> Installing -> Loading -> Restoring -> Done
//!                          \            \
//!                           +------------+--> Failed
//! ```
//!
//! Restoring always runs once anything has been installed, so a glue file that
//! fails (or a location that cannot be resolved) never leaves the keywords
//! behind in the runtime.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use mlua::prelude::*;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::LoaderConfig;
use crate::consts::LOAD_IN_PROGRESS_KEY;
use crate::discover::{DiscoveryError, discover_glue_files};
use crate::glue::{Hook, StepDefinition};
use crate::lua::dsl::{DslState, install_dsl};
use crate::lua::globals::GlobalBindings;
use crate::lua::locate::LocateError;
use crate::lua::{loaders, runtime};

/// Errors that can occur while loading glue.
#[derive(Debug, Error)]
pub enum GlueError {
  /// Glob expansion failed; nothing was installed.
  #[error(transparent)]
  Discovery(#[from] DiscoveryError),

  /// A glue file raised an error while its top-level code ran.
  #[error("failed to load glue file {path}: {source}")]
  Execute {
    path: PathBuf,
    #[source]
    source: LuaError,
  },

  /// A registration could not be attributed to a source location.
  #[error("failed to locate a declaration in glue file {path}: {source}")]
  Location {
    path: PathBuf,
    #[source]
    source: LocateError,
  },

  /// The keywords could not be installed into `_G`.
  #[error("failed to install glue keywords: {0}")]
  Install(#[source] LuaError),

  /// The keywords could not be put back after loading.
  #[error("failed to restore global keywords: {0}")]
  Restore(#[source] LuaError),

  /// Another load is running on the same Lua state.
  #[error("a glue load is already in progress on this Lua runtime")]
  LoadInProgress,

  /// The base directory could not be determined.
  #[error("cannot determine base directory: {0}")]
  BaseDir(#[source] io::Error),

  /// The Lua runtime could not be created or queried.
  #[error("lua error: {0}")]
  Runtime(#[from] LuaError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPhase {
  Idle,
  Installing,
  Loading,
  Restoring,
  Done,
  Failed,
}

impl fmt::Display for LoadPhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      LoadPhase::Idle => "idle",
      LoadPhase::Installing => "installing",
      LoadPhase::Loading => "loading",
      LoadPhase::Restoring => "restoring",
      LoadPhase::Done => "done",
      LoadPhase::Failed => "failed",
    };
    f.write_str(name)
  }
}

struct PhaseTracker(LoadPhase);

impl PhaseTracker {
  fn enter(&mut self, next: LoadPhase) {
    debug!(from = %self.0, to = %next, "glue load phase");
    self.0 = next;
  }
}

/// Marks a Lua state as busy for the lifetime of one load.
///
/// The mark lives in the Lua registry, so two loaders sharing one state (a
/// cloned [`Lua`] handle) still exclude each other.
struct LoadGuard<'a> {
  lua: &'a Lua,
}

impl<'a> LoadGuard<'a> {
  fn acquire(lua: &'a Lua) -> Result<Self, GlueError> {
    let busy: Option<bool> = lua.named_registry_value(LOAD_IN_PROGRESS_KEY)?;
    if busy == Some(true) {
      return Err(GlueError::LoadInProgress);
    }
    lua.set_named_registry_value(LOAD_IN_PROGRESS_KEY, true)?;
    Ok(Self { lua })
  }
}

impl Drop for LoadGuard<'_> {
  fn drop(&mut self) {
    let _ = self.lua.unset_named_registry_value(LOAD_IN_PROGRESS_KEY);
  }
}

/// Loads glue files into a Lua runtime.
pub struct GlueLoader {
  lua: Lua,
  config: LoaderConfig,
}

impl GlueLoader {
  /// Create a loader with its own fresh runtime.
  pub fn new(config: LoaderConfig) -> Result<Self, GlueError> {
    let lua = runtime::create_runtime()?;
    Ok(Self { lua, config })
  }

  /// Create a loader over an existing runtime.
  ///
  /// The runtime's `_G` is the global scope the keywords are swapped into and
  /// restored in. Its `dofile` is left as it is.
  pub fn with_runtime(lua: Lua, config: LoaderConfig) -> Self {
    Self { lua, config }
  }

  /// The runtime glue runs in. Step and hook bodies belong to it.
  pub fn lua(&self) -> &Lua {
    &self.lua
  }

  pub fn config(&self) -> &LoaderConfig {
    &self.config
  }

  /// Load every glue file under `glue_path` and build the result with
  /// `glue_factory`.
  ///
  /// Steps and hooks are passed to the factory in declaration order (files in
  /// path order, then statement order). Each call executes the files afresh
  /// with empty accumulators. On any error the keywords in `_G` are left
  /// exactly as they were before the call.
  ///
  /// # Example
  /// ```ignore
  /// use cuke_lib::{Glue, GlueLoader, LoaderConfig};
  ///
  /// let loader = GlueLoader::new(LoaderConfig::from_env())?;
  /// let glue = loader.load_glue("features", Glue::new)?;
  /// println!("{}", glue.summary());
  /// ```
  pub fn load_glue<G, F>(&self, glue_path: impl AsRef<Path>, glue_factory: F) -> Result<G, GlueError>
  where
    F: FnOnce(Vec<StepDefinition>, Vec<Hook>) -> G,
  {
    let glue_path = glue_path.as_ref();
    let mut phase = PhaseTracker(LoadPhase::Idle);

    let base_dir = self.config.resolve_base_dir().map_err(GlueError::BaseDir)?;
    let _guard = LoadGuard::acquire(&self.lua)?;

    info!(root = %glue_path.display(), pattern = %self.config.pattern, "loading glue");
    let files = discover_glue_files(glue_path, &self.config.pattern, &base_dir)?;

    phase.enter(LoadPhase::Installing);
    let state = Rc::new(DslState::new(base_dir));
    let mut bindings = GlobalBindings::new(&self.lua);
    if let Err(e) = install_dsl(&self.lua, &mut bindings, &state) {
      phase.enter(LoadPhase::Failed);
      state.close();
      if let Err(restore_err) = bindings.restore() {
        error!(error = %restore_err, "failed to restore glue keywords after install failure");
      }
      return Err(GlueError::Install(e));
    }

    phase.enter(LoadPhase::Loading);
    let failure = self.exec_files(&files, &state);

    phase.enter(LoadPhase::Restoring);
    let (steps, hooks) = state.close();
    let restored = bindings.restore();

    match (failure, restored) {
      (Some(err), restored) => {
        if let Err(restore_err) = restored {
          error!(error = %restore_err, "failed to restore glue keywords after load failure");
        }
        phase.enter(LoadPhase::Failed);
        Err(err)
      }
      (None, Err(restore_err)) => {
        phase.enter(LoadPhase::Failed);
        Err(GlueError::Restore(restore_err))
      }
      (None, Ok(())) => {
        phase.enter(LoadPhase::Done);
        info!(
          files = files.len(),
          steps = steps.len(),
          hooks = hooks.len(),
          "glue loaded"
        );
        Ok(glue_factory(steps, hooks))
      }
    }
  }

  /// Run each file in order, stopping at the first failure.
  ///
  /// A discovered file that an earlier file already ran through `dofile` is
  /// skipped, so its registrations are not made twice.
  fn exec_files(&self, files: &[PathBuf], state: &DslState) -> Option<GlueError> {
    if let Err(e) = loaders::begin_tracking(&self.lua) {
      return Some(GlueError::Runtime(e));
    }
    let failure = self.exec_tracked(files, state);
    if let Err(e) = loaders::end_tracking(&self.lua) {
      warn!(error = %e, "failed to clear executed glue file set");
    }
    failure
  }

  fn exec_tracked(&self, files: &[PathBuf], state: &DslState) -> Option<GlueError> {
    for path in files {
      match loaders::already_executed(&self.lua, path) {
        Ok(true) => {
          debug!(path = %path.display(), "glue file already executed through dofile; skipping");
          continue;
        }
        Ok(false) => {}
        Err(e) => return Some(GlueError::Runtime(e)),
      }
      debug!(path = %path.display(), "executing glue file");
      let result = loaders::exec_glue_file(&self.lua, path);

      // A location failure outranks the Lua error it caused, and still fails
      // the load when the glue file swallowed that error with pcall.
      if let Some(source) = state.take_locate_failure() {
        return Some(GlueError::Location {
          path: path.clone(),
          source,
        });
      }
      if let Err(source) = result {
        return Some(GlueError::Execute {
          path: path.clone(),
          source,
        });
      }
    }
    None
  }
}
