//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI. Results are printed
//! to stdout as pretty JSON.

pub mod advanced;
pub mod graph;
pub mod search;

use anyhow::Result;
use serde::Serialize;

pub use advanced::{parse_clause, AdvancedArgs};
pub use graph::{GraphArgs, GraphInput};
pub use search::SearchArgs;

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
