use super::ScriptError;
use super::source::{END_FENCE, START_FENCE, Source};

/// Foreign source extracted from a fenced snippet
#[derive(Debug, Clone, PartialEq)]
pub struct Snippet {
    pub body: String,
    /// 1-indexed script line of the first body line
    pub body_start_line: usize,
}

impl Snippet {
    /// Translate a 1-indexed line of the body into a script line
    pub fn script_line(&self, body_line: usize) -> usize {
        self.body_start_line + body_line.saturating_sub(1)
    }
}

/// Extract the fenced body following the snippet header at `header`.
///
/// Returns the snippet and the index of the line just past the end fence.
/// Body lines are kept verbatim.
pub fn extract(source: &Source, header: usize) -> Result<(Snippet, usize), ScriptError> {
    let mut idx = header + 1;
    let body_start = loop {
        if idx >= source.len() {
            return Err(missing_end_fence(source, header));
        }
        let line = source.trimmed(idx);
        if line.is_empty() {
            idx += 1;
            continue;
        }
        if line == START_FENCE {
            break idx + 1;
        }
        return Err(ScriptError::MalformedHeader {
            expected: START_FENCE,
            found: line,
            line: header + 1,
        });
    };

    let mut body = Vec::new();
    for idx in body_start..source.len() {
        if source.trimmed(idx) == END_FENCE {
            let snippet = Snippet {
                body: body.join("\n"),
                body_start_line: body_start + 1,
            };
            return Ok((snippet, idx + 1));
        }
        body.push(source.line(idx));
    }

    Err(missing_end_fence(source, header))
}

fn missing_end_fence(source: &Source, header: usize) -> ScriptError {
    ScriptError::MissingTerminator {
        construct: format!("`{}`", source.trimmed(header)),
        terminator: END_FENCE,
        line: header + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_is_returned_verbatim() {
        let src = Source::new("py_snippet:\n--s--\n  x = 1\n\n\tif x:\n        pass\n--e--\nsay 1");
        let (snippet, next) = extract(&src, 0).unwrap();
        assert_eq!(snippet.body, "  x = 1\n\n\tif x:\n        pass");
        assert_eq!(snippet.body_start_line, 3);
        assert_eq!(next, 7);
    }

    #[test]
    fn blank_lines_before_fence_are_skipped() {
        let src = Source::new("say 0\nrhai_snippet:\n\n\n--s--\nlet a = 1;\n--e--");
        let (snippet, next) = extract(&src, 1).unwrap();
        // fence on 0-based line 4 -> first body line is script line 6
        assert_eq!(snippet.body_start_line, 6);
        assert_eq!(snippet.body, "let a = 1;");
        assert_eq!(next, 7);
    }

    #[test]
    fn empty_body() {
        let src = Source::new("py_snippet:\n--s--\n--e--");
        let (snippet, _) = extract(&src, 0).unwrap();
        assert_eq!(snippet.body, "");
    }

    #[test]
    fn stray_line_before_fence_is_malformed() {
        let src = Source::new("py_snippet:\nprint(1)\n--s--\n--e--");
        let err = extract(&src, 0).unwrap_err();
        assert!(matches!(err, ScriptError::MalformedHeader { line: 1, .. }));
    }

    #[test]
    fn missing_end_fence_cites_header() {
        let src = Source::new("say 1\npy_snippet:\n--s--\nprint(1)");
        let err = extract(&src, 1).unwrap_err();
        assert!(matches!(
            err,
            ScriptError::MissingTerminator {
                terminator: END_FENCE,
                line: 2,
                ..
            }
        ));
    }

    #[test]
    fn script_line_offsets_body_lines() {
        let snippet = Snippet {
            body: String::new(),
            body_start_line: 10,
        };
        assert_eq!(snippet.script_line(1), 10);
        assert_eq!(snippet.script_line(3), 12);
    }
}
