//! Foreign engines that fenced snippets are delegated to
//!
//! - `rhai_snippet:` runs on an embedded Rhai engine ([`RhaiEngine`])
//! - `py_snippet:` runs on an embedded CPython (`python` feature)
//!
//! Both satisfy [`ForeignEngine`]: execute a snippet, and copy variables
//! in before and back out after.

mod api;
mod engine;
pub mod marshal;
#[cfg(feature = "python")]
mod python;
mod rhai_engine;

pub use engine::{ForeignEngine, Language};
#[cfg(feature = "python")]
pub use python::PythonEngine;
pub use rhai_engine::RhaiEngine;
