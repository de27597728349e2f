//! Step definition, hook, and glue aggregate types.
//!
//! These are the records produced by loading glue files. The loader only
//! constructs them; matching and execution belong to the runner.

mod types;

pub use types::*;
