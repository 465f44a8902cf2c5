//! worldkeep CLI library module.
//!
//! - `cli/` - argument parsing and the maintenance command
//! - `logging` - tracing subscriber setup

pub mod cli;
pub mod logging;
