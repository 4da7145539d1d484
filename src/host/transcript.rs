use std::collections::VecDeque;
use std::sync::Mutex;

use super::{Console, InputSource};

/// In-memory console that records everything written to it
#[derive(Default)]
pub struct Transcript {
    text: Mutex<String>,
    clears: Mutex<usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written since the last clear
    pub fn contents(&self) -> String {
        self.text.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn clear_count(&self) -> usize {
        self.clears.lock().map(|c| *c).unwrap_or(0)
    }
}

impl Console for Transcript {
    fn write(&self, text: &str) {
        if let Ok(mut buf) = self.text.lock() {
            buf.push_str(text);
        }
    }

    fn clear(&self) {
        if let Ok(mut buf) = self.text.lock() {
            buf.clear();
        }
        if let Ok(mut clears) = self.clears.lock() {
            *clears += 1;
        }
    }
}

/// Input source answering from a fixed list of replies
#[derive(Default)]
pub struct ScriptedInput {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedInput {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl InputSource for ScriptedInput {
    fn request_input(&self, prompt: &str) -> String {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or_default()
    }
}
