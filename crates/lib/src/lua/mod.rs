//! Lua runtime and the glue DSL.
//!
//! This module provides the Lua side of glue loading: the keyword bindings
//! glue files call, the machinery that swaps them into `_G` for the duration
//! of a load, and the locator that attributes each call to its source line.
//!
//! # Submodules
//!
//! - [`dsl`] - Registration callbacks behind `Given`/`When`/.../`Before`/`After`
//! - [`globals`] - Installing and restoring keyword bindings in `_G`
//! - [`loaders`] - Executing glue files with a per-file `__dir`
//! - [`locate`] - Recovering the call site of a registration
//! - [`runtime`] - Low-level Lua VM setup

pub mod dsl;
pub mod globals;
pub mod loaders;
pub mod locate;
pub mod runtime;
