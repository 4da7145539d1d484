//! The script execution engine
//!
//! A flat, line-oriented command language. Control blocks are resolved by
//! depth-counted scans over the source lines and executed by recursing into
//! sub-ranges; fenced snippets are handed to foreign engines.

pub mod blocks;
pub mod directives;
mod error;
mod executor;
pub mod expr;
pub mod snippet;
pub mod source;
mod statements;
pub mod value;

pub use directives::RunFlags;
pub use error::ScriptError;
pub use executor::{Interpreter, RunContext};
pub use snippet::Snippet;
pub use source::Source;
pub use value::{Key, Value, VarStore};
