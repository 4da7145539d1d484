use std::sync::Mutex;

use chrono::Local;
use serde::Serialize;

use super::{Debugger, Diagnostic, Level, Origin};

/// A timestamped debugger entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugEntry {
    pub ts: String,
    pub level: Level,
    pub source: Origin,
    pub line: Option<usize>,
    pub message: String,
}

impl DebugEntry {
    pub fn new(diagnostic: Diagnostic) -> Self {
        Self {
            ts: Local::now().format("%H:%M:%S").to_string(),
            level: diagnostic.level,
            source: diagnostic.source,
            line: diagnostic.line,
            message: diagnostic.message,
        }
    }

    /// `[ts] [LEVEL] [SRC:line] message`
    pub fn format(&self) -> String {
        let mut origin = self.source.to_string();
        if let Some(line) = self.line {
            origin.push_str(&format!(":{}", line));
        }
        format!("[{}] [{}] [{}] {}", self.ts, self.level, origin, self.message)
    }
}

/// Which levels are shown
#[derive(Debug, Clone, Copy)]
pub struct LevelFilter {
    pub info: bool,
    pub warning: bool,
    pub error: bool,
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self {
            info: true,
            warning: true,
            error: true,
        }
    }
}

impl LevelFilter {
    pub fn allows(&self, level: Level) -> bool {
        match level {
            Level::Info => self.info,
            Level::Warning => self.warning,
            Level::Error => self.error,
        }
    }
}

/// In-memory debugger panel model: keeps every entry, shows a filtered view
#[derive(Default)]
pub struct DebugLog {
    entries: Mutex<Vec<DebugEntry>>,
    filter: Mutex<LevelFilter>,
}

impl DebugLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(filter: LevelFilter) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            filter: Mutex::new(filter),
        }
    }

    pub fn entries(&self) -> Vec<DebugEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn set_filter(&self, filter: LevelFilter) {
        if let Ok(mut current) = self.filter.lock() {
            *current = filter;
        }
    }

    /// Formatted entries that pass the current filter
    pub fn visible(&self) -> Vec<String> {
        let filter = self.filter.lock().map(|f| *f).unwrap_or_default();
        self.entries()
            .iter()
            .filter(|e| filter.allows(e.level))
            .map(DebugEntry::format)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl Debugger for DebugLog {
    fn write(&self, diagnostic: Diagnostic) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(DebugEntry::new(diagnostic));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(level: Level, line: Option<usize>) -> Diagnostic {
        Diagnostic {
            message: "boom".into(),
            line,
            level,
            source: Origin::Script,
        }
    }

    #[test]
    fn format_includes_line_when_known() {
        let mut entry = DebugEntry::new(diag(Level::Error, Some(4)));
        entry.ts = "12:00:00".into();
        assert_eq!(entry.format(), "[12:00:00] [ERROR] [GX:4] boom");
        entry.line = None;
        assert_eq!(entry.format(), "[12:00:00] [ERROR] [GX] boom");
    }

    #[test]
    fn filter_hides_but_keeps_entries() {
        let log = DebugLog::new();
        log.write(diag(Level::Info, None));
        log.write(diag(Level::Warning, None));
        log.set_filter(LevelFilter {
            info: false,
            ..LevelFilter::default()
        });
        assert_eq!(log.entries().len(), 2);
        assert_eq!(log.visible().len(), 1);
    }

    #[test]
    fn unknown_levels_normalise_to_info() {
        assert_eq!(Level::parse("WARNING"), Level::Warning);
        assert_eq!(Level::parse("loud"), Level::Info);
    }

    #[test]
    fn entries_serialize_with_tags() {
        let mut entry = DebugEntry::new(diag(Level::Warning, Some(2)));
        entry.ts = "t".into();
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(
            json,
            r#"{"ts":"t","level":"warning","source":"GX","line":2,"message":"boom"}"#
        );
    }
}
