//! Reading script files from disk and deciding which engine runs them

use std::fs;
use std::io;
use std::path::Path;

use crate::scripting::Language;

/// How a file on disk should be run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// The line-oriented script language
    Script,
    /// A whole file for one foreign engine
    Foreign(Language),
}

/// Read a file as UTF-8, decoding it as Latin-1 when it is not valid UTF-8
pub fn read_script(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().into_iter().map(char::from).collect(),
    })
}

/// A first non-blank line starting with `#rhai` marks a Rhai file regardless
/// of extension; otherwise the extension decides
pub fn detect_dialect(path: &Path, text: &str) -> Dialect {
    let first = text.lines().map(str::trim).find(|line| !line.is_empty());
    if first.is_some_and(|line| line.starts_with("#rhai")) {
        return Dialect::Foreign(Language::Rhai);
    }

    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(Language::from_extension)
        .map_or(Dialect::Script, Dialect::Foreign)
}

/// Blank out a leading `#rhai` marker line, keeping line numbers intact
pub fn foreign_body(text: &str) -> String {
    let mut marker_seen = false;
    let mut body: Vec<&str> = Vec::new();
    for line in text.lines() {
        if !marker_seen && !line.trim().is_empty() {
            marker_seen = true;
            if line.trim_start().starts_with("#rhai") {
                body.push("");
                continue;
            }
        }
        body.push(line);
    }
    body.join("\n")
}
