use ropey::Rope;

use crate::scripting::Language;

pub const START_FENCE: &str = "--s--";
pub const END_FENCE: &str = "--e--";

/// Immutable script text addressed by 0-based line index
pub struct Source {
    text: Rope,
}

/// What a trimmed script line means to the block walker
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind<'a> {
    Blank,
    Comment,
    End,
    Snippet(Language),
    Repeat(&'a str),
    If(&'a str),
    Elif(&'a str),
    Else,
    Statement,
}

impl LineKind<'_> {
    /// Whether the line opens a block that must be closed
    pub fn opens_block(&self) -> bool {
        matches!(
            self,
            LineKind::Snippet(_) | LineKind::Repeat(_) | LineKind::If(_)
        )
    }
}

impl Source {
    pub fn new(text: &str) -> Self {
        Self {
            text: Rope::from_str(text),
        }
    }

    pub fn len(&self) -> usize {
        self.text.len_lines()
    }

    pub fn is_empty(&self) -> bool {
        self.text.len_chars() == 0
    }

    /// Raw line content without its line terminator
    pub fn line(&self, idx: usize) -> String {
        let mut line = self.text.line(idx).to_string();
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        line
    }

    pub fn trimmed(&self, idx: usize) -> String {
        self.line(idx).trim().to_string()
    }
}

/// Classify a trimmed line by its leading word
pub fn classify(line: &str) -> LineKind<'_> {
    if line.is_empty() {
        return LineKind::Blank;
    }
    if line.starts_with('#') {
        return LineKind::Comment;
    }
    if let Some(language) = Language::from_header(line) {
        return LineKind::Snippet(language);
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    match head {
        "end" if rest.is_empty() => LineKind::End,
        "repeat" => LineKind::Repeat(rest),
        "if" => LineKind::If(rest),
        "elif" => LineKind::Elif(rest),
        "else" => LineKind::Else,
        _ => LineKind::Statement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_count_matches_newlines() {
        let src = Source::new("a\nb\n");
        assert_eq!(src.len(), 3);
        assert_eq!(src.line(0), "a");
        assert_eq!(src.line(2), "");
    }

    #[test]
    fn line_strips_crlf() {
        let src = Source::new("say 1\r\nend");
        assert_eq!(src.line(0), "say 1");
    }

    #[test]
    fn classify_keywords_by_leading_word() {
        assert_eq!(classify(""), LineKind::Blank);
        assert_eq!(classify("# note"), LineKind::Comment);
        assert_eq!(classify("end"), LineKind::End);
        assert_eq!(classify("repeat 3"), LineKind::Repeat("3"));
        assert_eq!(classify("if x > 1"), LineKind::If("x > 1"));
        assert_eq!(classify("elif x"), LineKind::Elif("x"));
        assert_eq!(classify("else"), LineKind::Else);
        assert_eq!(classify("py_snippet:"), LineKind::Snippet(Language::Python));
        assert_eq!(classify("rhai_snippet:"), LineKind::Snippet(Language::Rhai));
        assert_eq!(classify("endless"), LineKind::Statement);
        assert_eq!(classify("say \"if\""), LineKind::Statement);
    }
}
