//! Terminal-backed collaborators used by the `gxscript` binary

use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use tokio::sync::{mpsc, oneshot};

use super::{Console, DebugEntry, Debugger, Diagnostic, InputSource, Level, LevelFilter};

/// Console writing straight to stdout
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn write(&self, text: &str) {
        let mut out = io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn clear(&self) {
        let mut out = io::stdout();
        let _ = execute!(out, Clear(ClearType::All), MoveTo(0, 0));
    }
}

/// Debugger printing one line per entry to stderr
pub struct TerminalDebugger {
    pub filter: LevelFilter,
    pub color: bool,
    pub json: bool,
    pub timestamps: bool,
}

impl TerminalDebugger {
    fn render(&self, entry: &DebugEntry) -> String {
        if self.json {
            return serde_json::to_string(entry).unwrap_or_else(|_| entry.format());
        }

        let mut origin = entry.source.to_string();
        if let Some(line) = entry.line {
            origin.push_str(&format!(":{}", line));
        }
        let level = if self.color {
            match entry.level {
                Level::Info => entry.level.to_string().cyan().to_string(),
                Level::Warning => entry.level.to_string().yellow().to_string(),
                Level::Error => entry.level.to_string().red().bold().to_string(),
            }
        } else {
            entry.level.to_string()
        };

        if self.timestamps {
            format!("[{}] [{}] [{}] {}", entry.ts, level, origin, entry.message)
        } else {
            format!("[{}] [{}] {}", level, origin, entry.message)
        }
    }
}

impl Debugger for TerminalDebugger {
    fn write(&self, diagnostic: Diagnostic) {
        if !self.filter.allows(diagnostic.level) {
            return;
        }
        let entry = DebugEntry::new(diagnostic);
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{}", self.render(&entry));
    }
}

/// A pending request for a line of user input
pub struct InputRequest {
    pub prompt: String,
    pub reply: oneshot::Sender<String>,
}

/// Input source that parks the script thread until the async side replies
pub struct ChannelInput {
    requests: mpsc::UnboundedSender<InputRequest>,
}

/// Create a channel-backed input source and the receiver that serves it
pub fn input_channel() -> (ChannelInput, mpsc::UnboundedReceiver<InputRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelInput { requests: tx }, rx)
}

impl InputSource for ChannelInput {
    fn request_input(&self, prompt: &str) -> String {
        let (reply, response) = oneshot::channel();
        let request = InputRequest {
            prompt: prompt.to_string(),
            reply,
        };
        if self.requests.send(request).is_err() {
            return String::new();
        }
        // Must not be called from inside the async runtime
        response.blocking_recv().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Origin;

    fn entry(level: Level) -> DebugEntry {
        DebugEntry {
            ts: "10:00:00".into(),
            level,
            source: Origin::Rhai,
            line: Some(3),
            message: "oops".into(),
        }
    }

    #[test]
    fn plain_render_without_timestamps() {
        let debugger = TerminalDebugger {
            filter: LevelFilter::default(),
            color: false,
            json: false,
            timestamps: false,
        };
        assert_eq!(debugger.render(&entry(Level::Error)), "[ERROR] [RHAI:3] oops");
    }

    #[test]
    fn json_render() {
        let debugger = TerminalDebugger {
            filter: LevelFilter::default(),
            color: false,
            json: true,
            timestamps: true,
        };
        let line = debugger.render(&entry(Level::Info));
        assert!(line.starts_with('{'));
        assert!(line.contains(r#""source":"RHAI""#));
    }

    #[test]
    fn channel_input_round_trip() {
        let (input, mut requests) = input_channel();
        let worker = std::thread::spawn(move || input.request_input("name?"));
        let request = requests.blocking_recv().unwrap();
        assert_eq!(request.prompt, "name?");
        request.reply.send("ada".to_string()).unwrap();
        assert_eq!(worker.join().unwrap(), "ada");
    }
}
