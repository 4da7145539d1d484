//! Collaborators the engine talks to
//!
//! The engine never owns a UI. It writes to a [`Console`], reports to a
//! [`Debugger`] and asks an [`InputSource`] for user text. All three are
//! bundled in a cloneable [`Host`] handle that the interpreter and every
//! foreign engine adapter share.

mod debug_log;
pub mod terminal;
mod transcript;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

pub use debug_log::{DebugEntry, DebugLog, LevelFilter};
pub use transcript::{ScriptedInput, Transcript};

/// Append-only transcript sink
pub trait Console: Send + Sync {
    fn write(&self, text: &str);
    fn clear(&self);
}

/// Structured diagnostic sink
pub trait Debugger: Send + Sync {
    fn write(&self, diagnostic: Diagnostic);
}

/// Blocking request for one line of user text.
///
/// Implementations may park the calling thread; no engine code runs while a
/// request is outstanding.
pub trait InputSource: Send + Sync {
    fn request_input(&self, prompt: &str) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    /// Lenient parse; anything unrecognised is info
    pub fn parse(level: &str) -> Self {
        match level.trim().to_lowercase().as_str() {
            "warning" | "warn" => Level::Warning,
            "error" => Level::Error,
            _ => Level::Info,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        };
        write!(f, "{}", label)
    }
}

/// Which runtime produced a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Origin {
    #[serde(rename = "GX")]
    Script,
    #[serde(rename = "PY")]
    Python,
    #[serde(rename = "RHAI")]
    Rhai,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Origin::Script => "GX",
            Origin::Python => "PY",
            Origin::Rhai => "RHAI",
        };
        write!(f, "{}", tag)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub message: String,
    /// 1-indexed script line, when one is known
    pub line: Option<usize>,
    pub level: Level,
    pub source: Origin,
}

/// Shared handle to the three collaborators
#[derive(Clone)]
pub struct Host {
    pub console: Arc<dyn Console>,
    pub debugger: Arc<dyn Debugger>,
    pub input: Arc<dyn InputSource>,
}

impl Host {
    pub fn new(
        console: Arc<dyn Console>,
        debugger: Arc<dyn Debugger>,
        input: Arc<dyn InputSource>,
    ) -> Self {
        Self {
            console,
            debugger,
            input,
        }
    }

    pub fn write_console(&self, text: &str) {
        self.console.write(text);
    }

    pub fn clear_console(&self) {
        self.console.clear();
    }

    pub fn diagnostic(&self, level: Level, message: impl Into<String>, line: Option<usize>, source: Origin) {
        self.debugger.write(Diagnostic {
            message: message.into(),
            line,
            level,
            source,
        });
    }

    pub fn request_input(&self, prompt: &str) -> String {
        self.input.request_input(prompt)
    }
}
