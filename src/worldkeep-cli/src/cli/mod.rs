//! CLI argument parsing and command dispatch.
//!
//! - `args` - Command-line argument structures
//! - `handlers` - Command execution

pub mod args;
pub mod handlers;

pub use args::{Cli, LogLevel};
pub use handlers::run;
