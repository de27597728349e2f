//! Crate-wide constants.

/// Glob, relative to the glue root, that selects glue files.
pub const DEFAULT_GLUE_PATTERN: &str = "**/*.lua";

/// Overrides [`DEFAULT_GLUE_PATTERN`].
pub const GLUE_PATTERN_ENV: &str = "CUKE_GLUE_PATTERN";

/// Directory that locations are made relative to (defaults to the process cwd).
pub const BASE_DIR_ENV: &str = "CUKE_BASE_DIR";

/// Stack level of the glue author's frame as seen from inside a registration
/// callback. Level 0 is the callback itself.
pub const CALLER_STACK_LEVEL: usize = 1;

/// Named registry key marking a Lua state that is in the middle of a glue load.
pub const LOAD_IN_PROGRESS_KEY: &str = "__cuke_load_in_progress";
