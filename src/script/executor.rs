use tracing::{debug, trace, warn};

use super::blocks::{self, BranchKind};
use super::directives::{self, RunFlags};
use super::source::{LineKind, Source, classify};
use super::value::{Value, VarStore};
use super::{ScriptError, expr, snippet, statements};
use crate::host::{Host, Level, Origin};
use crate::scripting::{ForeignEngine, Language};

/// State of a single run, passed explicitly to every component
pub struct RunContext<'a> {
    pub source: &'a Source,
    pub vars: VarStore,
    pub flags: RunFlags,
}

impl<'a> RunContext<'a> {
    pub fn new(source: &'a Source, flags: RunFlags) -> Self {
        Self {
            source,
            vars: VarStore::new(),
            flags,
        }
    }
}

/// Runs scripts and delegates fenced snippets to the configured engines
pub struct Interpreter {
    host: Host,
    python: Option<Box<dyn ForeignEngine>>,
    rhai: Option<Box<dyn ForeignEngine>>,
}

impl Interpreter {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            python: None,
            rhai: None,
        }
    }

    pub fn with_engine(mut self, language: Language, engine: Box<dyn ForeignEngine>) -> Self {
        match language {
            Language::Python => self.python = Some(engine),
            Language::Rhai => self.rhai = Some(engine),
        }
        self
    }

    fn engine_mut(&mut self, language: Language) -> Option<&mut Box<dyn ForeignEngine>> {
        match language {
            Language::Python => self.python.as_mut(),
            Language::Rhai => self.rhai.as_mut(),
        }
    }

    /// Execute a whole script from its first line.
    ///
    /// The variable store lives only for this call. A failure aborts the run,
    /// is reported once to the debugger and is returned.
    pub fn run(&mut self, text: &str) -> Result<(), ScriptError> {
        let source = Source::new(text);
        let flags = directives::scan(&source);
        debug!(lines = source.len(), ?flags, "starting run");

        let mut ctx = RunContext::new(&source, flags);
        let result = self.execute_block(&mut ctx, 0, source.len());

        if let Err(err) = &result {
            warn!(line = err.line(), "run aborted: {}", err);
            self.host
                .diagnostic(Level::Error, err.to_string(), Some(err.line()), Origin::Script);
        }
        result
    }

    /// Walk `start..end`, executing statements and recursing into blocks
    pub fn execute_block(&mut self, ctx: &mut RunContext<'_>, start: usize, end: usize) -> Result<(), ScriptError> {
        let mut idx = start;
        while idx < end {
            let line_no = idx + 1;
            let line = ctx.source.trimmed(idx);

            match classify(&line) {
                LineKind::Blank | LineKind::Comment => idx += 1,
                LineKind::End => return Ok(()),
                LineKind::Snippet(language) => {
                    let next = self.delegate(ctx, language, idx)?;
                    // a snippet block may close with its own `end`
                    idx = match blocks::snippet_end(ctx.source, next, end) {
                        Some(close) => close + 1,
                        None => next,
                    };
                }
                LineKind::Repeat(count) => {
                    let times = repeat_count(&eval(ctx, count, line_no)?, line_no)?;
                    let body_end = blocks::find_block_end(ctx.source, idx + 1, idx)?;
                    debug!(line = line_no, times, "repeat");
                    for _ in 0..times {
                        self.execute_block(ctx, idx + 1, body_end)?;
                    }
                    idx = body_end + 1;
                }
                LineKind::If(_) => {
                    idx = self.execute_if(ctx, idx)?;
                }
                LineKind::Elif(_) | LineKind::Else | LineKind::Statement => {
                    trace!(line = line_no, "{}", line);
                    statements::execute(&line, line_no, ctx, &self.host)?;
                    idx += 1;
                }
            }
        }
        Ok(())
    }

    /// Run the first branch whose condition holds (or the `else`);
    /// returns the index after the chain's `end`
    fn execute_if(&mut self, ctx: &mut RunContext<'_>, header: usize) -> Result<usize, ScriptError> {
        let chain = blocks::partition_if(ctx.source, header)?;
        for branch in &chain.branches {
            let taken = match &branch.kind {
                BranchKind::Condition(cond) => eval(ctx, cond, branch.header + 1)?.is_truthy(),
                BranchKind::Else => true,
            };
            if taken {
                trace!(line = branch.header + 1, "branch taken");
                self.execute_block(ctx, branch.start, branch.end)?;
                break;
            }
        }
        Ok(chain.end + 1)
    }

    /// Hand the snippet headed at `header` to its engine, syncing variables
    /// both ways; returns the index after the end fence
    fn delegate(&mut self, ctx: &mut RunContext<'_>, language: Language, header: usize) -> Result<usize, ScriptError> {
        let enabled = ctx.flags.enabled(language);
        let Some(engine) = self.engine_mut(language).filter(|_| enabled) else {
            return Err(ScriptError::DelegationDisabled {
                header: language.header(),
                language: language.name(),
                line: header + 1,
            });
        };

        let (snippet, next) = snippet::extract(ctx.source, header)?;
        debug!(
            language = language.name(),
            body_start = snippet.body_start_line,
            "delegating snippet"
        );
        engine.inject(&ctx.vars);
        if !engine.execute(&snippet) {
            debug!(line = header + 1, "snippet faulted, run continues");
        }
        engine.pull(&mut ctx.vars);
        Ok(next)
    }
}

fn eval(ctx: &RunContext<'_>, text: &str, line: usize) -> Result<Value, ScriptError> {
    expr::evaluate(text, &ctx.vars).map_err(|e| ScriptError::InvalidExpression {
        expr: text.to_string(),
        reason: e.to_string(),
        line,
    })
}

/// Iterations for a `repeat` count: floor of the value, never negative
fn repeat_count(value: &Value, line: usize) -> Result<u64, ScriptError> {
    let count = match value {
        Value::Int(n) => *n as f64,
        Value::Float(f) => *f,
        Value::Bool(b) => *b as i64 as f64,
        Value::Str(s) => s.trim().parse::<f64>().map_err(|_| ScriptError::TypeMismatch {
            message: format!("repeat count '{}' is not a number", s),
            line,
        })?,
        other => {
            return Err(ScriptError::TypeMismatch {
                message: format!("repeat count must be a number, not {}", other.type_name()),
                line,
            });
        }
    };
    if count.is_nan() || count <= 0.0 {
        return Ok(0);
    }
    Ok(count.floor() as u64)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::host::{DebugLog, ScriptedInput, Transcript};
    use crate::script::Snippet;

    /// Records what it is asked to do; doubles every injected int on pull
    #[derive(Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
        seen: VarStore,
    }

    impl ForeignEngine for Recorder {
        fn origin(&self) -> Origin {
            Origin::Rhai
        }

        fn execute(&mut self, snippet: &Snippet) -> bool {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(format!("{}@{}", snippet.body, snippet.body_start_line));
            }
            snippet.body != "fail"
        }

        fn inject(&mut self, vars: &VarStore) {
            self.seen = vars.clone();
        }

        fn pull(&mut self, vars: &mut VarStore) {
            for (name, value) in &self.seen {
                if let Value::Int(n) = value {
                    vars.insert(name.clone(), Value::Int(n * 2));
                }
            }
            vars.insert("gx_done".into(), Value::Bool(true));
        }
    }

    struct Harness {
        console: Arc<Transcript>,
        debug: Arc<DebugLog>,
        calls: Arc<Mutex<Vec<String>>>,
        interpreter: Interpreter,
    }

    fn harness() -> Harness {
        let console = Arc::new(Transcript::new());
        let debug = Arc::new(DebugLog::new());
        let host = Host::new(console.clone(), debug.clone(), Arc::new(ScriptedInput::new(["3"])));
        let recorder = Recorder::default();
        let calls = recorder.calls.clone();
        let interpreter = Interpreter::new(host).with_engine(Language::Rhai, Box::new(recorder));
        Harness {
            console,
            debug,
            calls,
            interpreter,
        }
    }

    fn run(script: &str) -> (Harness, Result<(), ScriptError>) {
        let mut h = harness();
        let result = h.interpreter.run(script);
        (h, result)
    }

    #[test]
    fn repeat_runs_body_count_times() {
        let (h, result) = run("var.set = x, 2\nrepeat x\nsay \"hi\"\nend");
        result.unwrap();
        assert_eq!(h.console.contents(), "hi\nhi\n");
    }

    #[test]
    fn repeat_zero_or_negative_skips_body() {
        let (h, result) = run("repeat 0\nsay 1\nend\nrepeat -3\nsay 2\nend\nsay 3");
        result.unwrap();
        assert_eq!(h.console.contents(), "3\n");
    }

    #[test]
    fn repeat_floors_and_shares_store() {
        let (h, result) = run("var.set = n, 0\nrepeat 2.9\nvar.inc n\nend\nsay n");
        result.unwrap();
        assert_eq!(h.console.contents(), "2\n");
    }

    #[test]
    fn repeat_accepts_numeric_reply() {
        let (h, result) = run("var.ask = n, 'times?'\nrepeat n\nsay '.'\nend");
        result.unwrap();
        assert_eq!(h.console.contents(), ".\n.\n.\n");
    }

    #[test]
    fn if_chain_runs_exactly_one_branch() {
        for (x, expected) in [(1, "one\n"), (2, "two\n"), (3, "other\n")] {
            let script = format!(
                "var.set = x, {}\nif x == 1\nsay 'one'\nelif x == 2\nsay 'two'\nelse\nsay 'other'\nend",
                x
            );
            let (h, result) = run(&script);
            result.unwrap();
            assert_eq!(h.console.contents(), expected);
        }
    }

    #[test]
    fn if_without_else_can_run_nothing() {
        let (h, result) = run("if false\nsay 1\nelif 1 > 2\nsay 2\nend\nsay 'after'");
        result.unwrap();
        assert_eq!(h.console.contents(), "after\n");
    }

    #[test]
    fn first_true_condition_wins() {
        let (h, result) = run("if true\nsay 'a'\nelif true\nsay 'b'\nend");
        result.unwrap();
        assert_eq!(h.console.contents(), "a\n");
    }

    #[test]
    fn three_levels_of_nesting() {
        let script = "\
var.set = total, 0
repeat 2
  if total >= 0
    repeat 3
      if true
        var.inc total
      end
    end
  else
    say 'never'
  end
end
say total";
        let (h, result) = run(script);
        result.unwrap();
        assert_eq!(h.console.contents(), "6\n");
    }

    #[test]
    fn missing_end_aborts_with_diagnostic() {
        let (h, result) = run("say 1\nrepeat 2\nsay 2");
        let err = result.unwrap_err();
        assert!(matches!(err, ScriptError::MissingTerminator { line: 2, .. }));
        assert_eq!(h.console.contents(), "1\n");
        let entries = h.debug.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, Level::Error);
        assert_eq!(entries[0].line, Some(2));
        assert_eq!(entries[0].source, Origin::Script);
    }

    #[test]
    fn failure_stops_remaining_statements() {
        let (h, result) = run("say 1\nbogus\nsay 2");
        assert!(matches!(result, Err(ScriptError::UnknownStatement { line: 2, .. })));
        assert_eq!(h.console.contents(), "1\n");
    }

    #[test]
    fn oversized_repetition_fails_closed() {
        for script in ["say 'ab' * 9223372036854775807", "say [1, 2] * 9223372036854775807"] {
            let (h, result) = run(script);
            assert!(matches!(result, Err(ScriptError::InvalidExpression { line: 1, .. })));
            assert_eq!(h.console.contents(), "");
        }
    }

    #[test]
    fn invalid_condition_cites_branch_line() {
        let (_, result) = run("if false\nsay 1\nelif nope\nsay 2\nend");
        assert!(matches!(result, Err(ScriptError::InvalidExpression { line: 3, .. })));
    }

    #[test]
    fn snippet_without_directive_is_rejected() {
        let (h, result) = run("say 'before'\nrhai_snippet:\n--s--\nprint(\"x\");\n--e--\nsay 'after'");
        assert_eq!(
            result,
            Err(ScriptError::DelegationDisabled {
                header: "rhai_snippet:",
                language: "Rhai",
                line: 2
            })
        );
        assert!(h.calls.lock().unwrap().is_empty());
        assert_eq!(h.console.contents(), "before\n");
    }

    #[test]
    fn snippet_without_engine_is_rejected() {
        let (_, result) = run("#include_python\npy_snippet:\n--s--\nprint(1)\n--e--");
        assert!(matches!(result, Err(ScriptError::DelegationDisabled { line: 2, .. })));
    }

    #[test]
    fn snippet_delegation_syncs_variables() {
        let script = "\
#include_rhai
var.set = n, 21
rhai_snippet:
--s--
n *= 2;
--e--
say n, gx_done";
        let (h, result) = run(script);
        result.unwrap();
        assert_eq!(*h.calls.lock().unwrap(), vec!["n *= 2;@5".to_string()]);
        assert_eq!(h.console.contents(), "42 true\n");
    }

    #[test]
    fn snippet_inside_repeat_closes_with_end() {
        let script = "\
#include_rhai
repeat 2
rhai_snippet:
--s--
if x { end }
--e--
end
say 'in'
end
say 'after'";
        let (h, result) = run(script);
        result.unwrap();
        assert_eq!(h.calls.lock().unwrap().len(), 2);
        assert_eq!(h.console.contents(), "in\nin\nafter\n");
    }

    #[test]
    fn snippet_inside_repeat_without_end_is_unclosed() {
        let script = "\
#include_rhai
repeat 2
rhai_snippet:
--s--
x = 1;
--e--
end
say 'after'";
        let (h, result) = run(script);
        assert!(matches!(result, Err(ScriptError::MissingTerminator { line: 2, .. })));
        assert!(h.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn snippet_in_elif_branch() {
        let script = "\
#include_rhai
var.set = x, 2
if x == 1
say 'one'
elif x == 2
rhai_snippet:
--s--
let y = 1;
--e--
end
say 'two'
else
say 'other'
end
say x";
        let (h, result) = run(script);
        result.unwrap();
        assert_eq!(*h.calls.lock().unwrap(), vec!["let y = 1;@8".to_string()]);
        assert_eq!(h.console.contents(), "two\n4\n");
    }

    #[test]
    fn top_level_snippet_end_is_optional() {
        let script = "#include_rhai\nrhai_snippet:\n--s--\na\n--e--\nsay 1\nrhai_snippet:\n--s--\nb\n--e--\nend\nsay 2";
        let (h, result) = run(script);
        result.unwrap();
        assert_eq!(h.calls.lock().unwrap().len(), 2);
        assert_eq!(h.console.contents(), "1\n2\n");
    }

    #[test]
    fn faulting_snippet_does_not_abort_run() {
        let script = "#include_rhai\nrhai_snippet:\n--s--\nfail\n--e--\nsay 'still here'";
        let (h, result) = run(script);
        result.unwrap();
        assert_eq!(h.calls.lock().unwrap().len(), 1);
        assert_eq!(h.console.contents(), "still here\n");
    }

    #[test]
    fn store_does_not_survive_runs() {
        let mut h = harness();
        h.interpreter.run("var.set = x, 1").unwrap();
        let err = h.interpreter.run("say x").unwrap_err();
        assert!(matches!(err, ScriptError::InvalidExpression { .. }));
    }

    #[test]
    fn repeat_count_rules() {
        assert_eq!(repeat_count(&Value::Float(2.7), 1), Ok(2));
        assert_eq!(repeat_count(&Value::Int(-1), 1), Ok(0));
        assert_eq!(repeat_count(&Value::from(" 4 "), 1), Ok(4));
        assert!(repeat_count(&Value::List(vec![]), 1).is_err());
    }
}
