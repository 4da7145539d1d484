use super::source::Source;
use crate::scripting::Language;

/// Which foreign engines a run may delegate to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFlags {
    pub include_python: bool,
    pub include_rhai: bool,
}

impl RunFlags {
    pub fn enabled(&self, language: Language) -> bool {
        match language {
            Language::Python => self.include_python,
            Language::Rhai => self.include_rhai,
        }
    }
}

/// Scan every line once for `#include_*` directives.
///
/// Directives only ever turn flags on, so their order does not matter.
pub fn scan(source: &Source) -> RunFlags {
    let mut flags = RunFlags::default();
    for idx in 0..source.len() {
        let line = source.trimmed(idx);
        if line.starts_with("#include_rhai&python") {
            flags.include_python = true;
            flags.include_rhai = true;
        } else if line.starts_with("#include_python") {
            flags.include_python = true;
        } else if line.starts_with("#include_rhai") {
            flags.include_rhai = true;
        }
    }
    flags
}
