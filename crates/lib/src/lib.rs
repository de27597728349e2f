//! cuke-lib: glue loading for a Lua-scripted behavior-driven test runner
//!
//! Glue files are Lua scripts that declare step definitions and hooks with
//! short global keywords:
//!
//! ```lua
//! Before(function() reset_db() end)
//!
//! Given("I have {int} cukes in my belly", function(n)
//!   belly = n
//! end)
//! ```
//!
//! This crate provides:
//! - `discover`: glob-based discovery of glue files under a root directory
//! - `lua`: the injected DSL, file execution, and call-site location
//! - `loader`: the load cycle that ties them together and restores globals
//! - `glue`: the step definition, hook, and aggregate value types

pub mod config;
pub mod consts;
pub mod discover;
pub mod glue;
pub mod loader;
pub mod lua;
pub mod util;

pub use config::LoaderConfig;
pub use glue::{Glue, Hook, HookPhase, Location, StepDefinition};
pub use loader::{GlueError, GlueLoader};
