use crate::host::Origin;
use crate::script::{Snippet, VarStore};

/// The snippet languages a script can delegate to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    Rhai,
}

impl Language {
    /// Recognise a snippet header line (already trimmed)
    pub fn from_header(line: &str) -> Option<Self> {
        match line {
            "py_snippet:" => Some(Language::Python),
            "rhai_snippet:" => Some(Language::Rhai),
            _ => None,
        }
    }

    /// Detect a standalone file's language from its extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "py" | "pyw" => Some(Language::Python),
            "rhai" => Some(Language::Rhai),
            _ => None,
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            Language::Python => "py_snippet:",
            Language::Rhai => "rhai_snippet:",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::Rhai => "Rhai",
        }
    }

    pub fn origin(self) -> Origin {
        match self {
            Language::Python => Origin::Python,
            Language::Rhai => Origin::Rhai,
        }
    }
}

/// Adapter between the script engine and a foreign runtime.
///
/// The interpreter calls `inject`, `execute` and `pull` in that order for
/// every snippet. Runtime faults inside `execute` are reported to the host
/// debugger and never abort the surrounding script.
pub trait ForeignEngine {
    /// Tag used on this engine's diagnostics
    fn origin(&self) -> Origin;

    /// Run the snippet against the engine's private runtime; false when a
    /// fault was reported
    fn execute(&mut self, snippet: &Snippet) -> bool;

    /// Copy host-visible variables into the foreign scope
    fn inject(&mut self, vars: &VarStore);

    /// Copy variables back: every name the host already has, plus any
    /// foreign name carrying the export prefix
    fn pull(&mut self, vars: &mut VarStore);
}
