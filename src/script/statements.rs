//! Plain statements: assignment, math, tables, console and debugger output

use tracing::trace;

use super::ScriptError;
use super::executor::RunContext;
use super::expr::{self, BinaryOp};
use super::value::Value;
use crate::host::{Host, Level, Origin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    ClearConsole,
    VarSet,
    VarAsk,
    MathTyped,
    MathExpr,
    Inc,
    Dec,
    TableAdd,
    TableRemove,
    TableGet,
    Say,
    DebugPrint,
}

const COMMANDS: &[(&str, Command)] = &[
    ("console.clear()", Command::ClearConsole),
    ("var.set", Command::VarSet),
    ("var.ask", Command::VarAsk),
    ("var.math_", Command::MathTyped),
    ("var.math", Command::MathExpr),
    ("var.inc", Command::Inc),
    ("var.dec", Command::Dec),
    ("table.add", Command::TableAdd),
    ("table.remove", Command::TableRemove),
    ("table.get", Command::TableGet),
    ("say", Command::Say),
    ("debugprint", Command::DebugPrint),
];

/// Longest command prefix of `statement`, with the text after it
fn lookup(statement: &str) -> Option<(Command, &'static str, &str)> {
    COMMANDS
        .iter()
        .filter(|(prefix, _)| statement.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(prefix, command)| (*command, *prefix, &statement[prefix.len()..]))
}

/// Execute one trimmed, non-control statement found on `line` (1-indexed)
pub(crate) fn execute(
    statement: &str,
    line: usize,
    ctx: &mut RunContext<'_>,
    host: &Host,
) -> Result<(), ScriptError> {
    let Some((command, name, rest)) = lookup(statement) else {
        return Err(ScriptError::UnknownStatement {
            statement: statement.to_string(),
            line,
        });
    };
    trace!(line, ?command, "statement");

    let mut stmt = Statement {
        name,
        line,
        ctx,
        host,
    };
    match command {
        Command::ClearConsole => {
            host.clear_console();
            Ok(())
        }
        Command::VarSet => stmt.var_set(rest),
        Command::VarAsk => stmt.var_ask(rest),
        Command::MathTyped => stmt.math_typed(rest),
        Command::MathExpr => stmt.var_set(rest),
        Command::Inc => stmt.step(rest, 1),
        Command::Dec => stmt.step(rest, -1),
        Command::TableAdd => stmt.table_add(rest),
        Command::TableRemove => stmt.table_remove(rest),
        Command::TableGet => stmt.table_get(rest),
        Command::Say => stmt.say(rest),
        Command::DebugPrint => {
            stmt.debug_print(statement);
            Ok(())
        }
    }
}

/// Drop an optional leading `=` from a command's argument text
fn after_equals(rest: &str) -> &str {
    let rest = rest.trim();
    rest.strip_prefix('=').map(str::trim).unwrap_or(rest)
}

/// Split on top-level commas, leaving commas inside brackets and string
/// literals alone
pub(crate) fn split_args(content: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut buf = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in content.chars() {
        if let Some(q) = quote {
            buf.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                buf.push(ch);
            }
            '(' | '[' | '{' => {
                depth += 1;
                buf.push(ch);
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                buf.push(ch);
            }
            ',' if depth == 0 => {
                if !buf.trim().is_empty() {
                    parts.push(buf.trim().to_string());
                }
                buf.clear();
            }
            _ => buf.push(ch),
        }
    }
    if !buf.trim().is_empty() {
        parts.push(buf.trim().to_string());
    }
    parts
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Where a typed math operation takes its operator from
fn math_op(name: &str) -> Option<BinaryOp> {
    match name {
        "add" => Some(BinaryOp::Add),
        "sub" => Some(BinaryOp::Sub),
        "mul" => Some(BinaryOp::Mul),
        "div" => Some(BinaryOp::Div),
        _ => None,
    }
}

struct Statement<'s, 'c, 'a> {
    name: &'static str,
    line: usize,
    ctx: &'c mut RunContext<'a>,
    host: &'s Host,
}

impl Statement<'_, '_, '_> {
    fn eval(&self, text: &str) -> Result<Value, ScriptError> {
        expr::evaluate(text, &self.ctx.vars).map_err(|e| ScriptError::InvalidExpression {
            expr: text.to_string(),
            reason: e.to_string(),
            line: self.line,
        })
    }

    fn malformed(&self, expected: &'static str) -> ScriptError {
        ScriptError::MalformedStatement {
            command: self.name,
            expected,
            line: self.line,
        }
    }

    /// Exactly `N` arguments, the first being a variable name
    fn args<const N: usize>(&self, rest: &str, expected: &'static str) -> Result<[String; N], ScriptError> {
        let parts: [String; N] = split_args(after_equals(rest))
            .try_into()
            .map_err(|_| self.malformed(expected))?;
        if !is_identifier(&parts[0]) {
            return Err(self.malformed(expected));
        }
        Ok(parts)
    }

    fn target(&self, name: &str) -> Result<String, ScriptError> {
        if is_identifier(name) {
            Ok(name.to_string())
        } else {
            Err(self.malformed("a variable name"))
        }
    }

    fn var_set(&mut self, rest: &str) -> Result<(), ScriptError> {
        let [name, value] = self.args::<2>(rest, "`name, expression`")?;
        let value = self.eval(&value)?;
        self.ctx.vars.insert(name, value);
        Ok(())
    }

    fn var_ask(&mut self, rest: &str) -> Result<(), ScriptError> {
        let [name, question] = self.args::<2>(rest, "`name, prompt`")?;
        let prompt = self.eval(&question)?.to_string();
        let reply = self.host.request_input(&prompt);
        self.ctx.vars.insert(name, Value::Str(reply));
        Ok(())
    }

    fn math_typed(&mut self, rest: &str) -> Result<(), ScriptError> {
        let op_len = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let op = math_op(&rest[..op_len]).ok_or_else(|| self.malformed("add, sub, mul or div"))?;

        let parts: [String; 3] = split_args(after_equals(&rest[op_len..]))
            .try_into()
            .map_err(|_| self.malformed("`a, b, output`"))?;
        let [a, b, out] = parts;
        let out = self.target(&out)?;
        let a = self.eval(&a)?;
        let b = self.eval(&b)?;
        let result = expr::binary(op, &a, &b).map_err(|e| ScriptError::Arithmetic {
            message: e.to_string(),
            line: self.line,
        })?;
        self.ctx.vars.insert(out, result);
        Ok(())
    }

    fn step(&mut self, rest: &str, delta: i64) -> Result<(), ScriptError> {
        let name = self.target(after_equals(rest))?;
        let current = self.ctx.vars.get(&name).cloned().unwrap_or(Value::Int(0));
        let next = expr::binary(BinaryOp::Add, &current, &Value::Int(delta)).map_err(|_| {
            ScriptError::TypeMismatch {
                message: format!(
                    "{} target `{}` is a {}, not a number",
                    self.name,
                    name,
                    current.type_name()
                ),
                line: self.line,
            }
        })?;
        self.ctx.vars.insert(name, next);
        Ok(())
    }

    fn table_add(&mut self, rest: &str) -> Result<(), ScriptError> {
        let [table, value] = self.args::<2>(rest, "`table, value`")?;
        let value = self.eval(&value)?;
        let slot = self.ctx.vars.entry(table).or_insert_with(|| Value::List(Vec::new()));
        if !matches!(slot, Value::List(_)) {
            *slot = Value::List(Vec::new());
        }
        if let Value::List(items) = slot {
            items.push(value);
        }
        Ok(())
    }

    fn not_a_table(&self, table: &str) -> ScriptError {
        ScriptError::TypeMismatch {
            message: format!("{} target `{}` is not a table", self.name, table),
            line: self.line,
        }
    }

    fn table_remove(&mut self, rest: &str) -> Result<(), ScriptError> {
        let [table, value] = self.args::<2>(rest, "`table, value`")?;
        let value = self.eval(&value)?;
        let line = self.line;
        let not_a_table = self.not_a_table(&table);
        let Some(Value::List(items)) = self.ctx.vars.get_mut(&table) else {
            return Err(not_a_table);
        };
        match items.iter().position(|item| item.loose_eq(&value)) {
            Some(idx) => {
                items.remove(idx);
                Ok(())
            }
            None => Err(ScriptError::ValueNotFound {
                table,
                value: value.repr(),
                line,
            }),
        }
    }

    fn table_get(&mut self, rest: &str) -> Result<(), ScriptError> {
        let [table, index, out] = self.args::<3>(rest, "`table, index, output`")?;
        let out = self.target(&out)?;
        let index = match self.eval(&index)? {
            Value::Int(n) => n,
            Value::Float(f) => f.trunc() as i64,
            Value::Bool(b) => b as i64,
            other => {
                return Err(ScriptError::TypeMismatch {
                    message: format!("table index must be a number, not {}", other.type_name()),
                    line: self.line,
                });
            }
        };
        let Some(Value::List(items)) = self.ctx.vars.get(&table) else {
            return Err(self.not_a_table(&table));
        };
        let Some(idx) = expr::resolve_index(index, items.len()) else {
            return Err(ScriptError::IndexOutOfRange {
                len: items.len(),
                table,
                index,
                line: self.line,
            });
        };
        let value = items[idx].clone();
        self.ctx.vars.insert(out, value);
        Ok(())
    }

    fn say(&mut self, rest: &str) -> Result<(), ScriptError> {
        let values = split_args(rest.trim())
            .iter()
            .map(|arg| self.eval(arg).map(|v| v.to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        self.host.write_console(&format!("{}\n", values.join(" ")));
        Ok(())
    }

    fn debug_print(&self, statement: &str) {
        let quoted = statement.split_once('"').and_then(|(before, after)| {
            after
                .split_once('"')
                .map(|(message, tail)| (message, format!("{} {}", before, tail)))
        });

        let Some((message, flags)) = quoted else {
            self.host.diagnostic(
                Level::Warning,
                "debugprint missing string",
                Some(self.line),
                Origin::Script,
            );
            return;
        };

        let mut level = Level::Info;
        for token in flags.split_whitespace() {
            match token {
                "-e" => level = Level::Error,
                "-w" if level != Level::Error => level = Level::Warning,
                _ => {}
            }
        }
        self.host
            .diagnostic(level, message, Some(self.line), Origin::Script);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::host::{DebugLog, ScriptedInput, Transcript};
    use crate::script::{RunFlags, Source};

    struct Fixture {
        console: Arc<Transcript>,
        debug: Arc<DebugLog>,
        host: Host,
        source: Source,
    }

    fn fixture(replies: &[&str]) -> Fixture {
        let console = Arc::new(Transcript::new());
        let debug = Arc::new(DebugLog::new());
        let input = Arc::new(ScriptedInput::new(replies.iter().copied()));
        let host = Host::new(console.clone(), debug.clone(), input);
        Fixture {
            console,
            debug,
            host,
            source: Source::new(""),
        }
    }

    fn run_all<'a>(fx: &'a Fixture, lines: &[&str]) -> Result<RunContext<'a>, ScriptError> {
        let mut ctx = RunContext::new(&fx.source, RunFlags::default());
        for (i, line) in lines.iter().enumerate() {
            execute(line, i + 1, &mut ctx, &fx.host)?;
        }
        Ok(ctx)
    }

    #[test]
    fn split_args_respects_nesting_and_quotes() {
        assert_eq!(
            split_args(r#"x, [1, 2], "a, b", f(3, 4)"#),
            vec!["x", "[1, 2]", r#""a, b""#, "f(3, 4)"]
        );
        assert!(split_args("  ").is_empty());
    }

    #[test]
    fn longest_prefix_wins() {
        assert_eq!(lookup("var.math_add = 1, 2, x").map(|l| l.0), Some(Command::MathTyped));
        assert_eq!(lookup("var.math = x, 1").map(|l| l.0), Some(Command::MathExpr));
        assert!(lookup("print 1").is_none());
    }

    #[test]
    fn set_and_math() {
        let fx = fixture(&[]);
        let ctx = run_all(
            &fx,
            &[
                "var.set = a, 6",
                "var.math_div = a, 4, q",
                "var.math_mul = a, 2, m",
                "var.math = s, a + m",
            ],
        )
        .unwrap();
        assert_eq!(ctx.vars["q"], Value::Float(1.5));
        assert_eq!(ctx.vars["m"], Value::Int(12));
        assert_eq!(ctx.vars["s"], Value::Int(18));
    }

    #[test]
    fn typed_division_by_zero_is_arithmetic_error() {
        let fx = fixture(&[]);
        let err = run_all(&fx, &["var.math_div = 1, 0, q"]).err().unwrap();
        assert!(matches!(err, ScriptError::Arithmetic { line: 1, .. }));
    }

    #[test]
    fn inc_and_dec_auto_initialise() {
        let fx = fixture(&[]);
        let ctx = run_all(&fx, &["var.inc = n", "var.inc n", "var.dec = m"]).unwrap();
        assert_eq!(ctx.vars["n"], Value::Int(2));
        assert_eq!(ctx.vars["m"], Value::Int(-1));
    }

    #[test]
    fn inc_on_string_is_type_mismatch() {
        let fx = fixture(&[]);
        let err = run_all(&fx, &["var.set = s, 'a'", "var.inc = s"]).err().unwrap();
        assert!(matches!(err, ScriptError::TypeMismatch { line: 2, .. }));
    }

    #[test]
    fn ask_stores_reply_as_string() {
        let fx = fixture(&["42"]);
        let ctx = run_all(&fx, &["var.ask = n, 'How many? ' + 'now'"]).unwrap();
        assert_eq!(ctx.vars["n"], Value::from("42"));
    }

    #[test]
    fn table_add_creates_list() {
        let fx = fixture(&[]);
        let ctx = run_all(&fx, &["table.add = t, 5"]).unwrap();
        assert_eq!(ctx.vars["t"], Value::List(vec![Value::Int(5)]));
    }

    #[test]
    fn table_add_reinitialises_non_list() {
        let fx = fixture(&[]);
        let ctx = run_all(&fx, &["var.set = t, 3", "table.add = t, 'x'"]).unwrap();
        assert_eq!(ctx.vars["t"], Value::List(vec![Value::from("x")]));
    }

    #[test]
    fn table_get_and_remove() {
        let fx = fixture(&[]);
        let ctx = run_all(
            &fx,
            &[
                "table.add = t, 1",
                "table.add = t, 2",
                "table.add = t, 3",
                "table.remove = t, 2",
                "table.get = t, -1, last",
            ],
        )
        .unwrap();
        assert_eq!(ctx.vars["t"], Value::List(vec![Value::Int(1), Value::Int(3)]));
        assert_eq!(ctx.vars["last"], Value::Int(3));
    }

    #[test]
    fn table_get_out_of_range_leaves_store_unchanged() {
        let fx = fixture(&[]);
        let mut ctx = run_all(&fx, &["table.add = t, 1"]).unwrap();
        let before = ctx.vars.clone();
        let err = execute("table.get = t, 4, out", 9, &mut ctx, &fx.host).unwrap_err();
        assert!(matches!(
            err,
            ScriptError::IndexOutOfRange {
                index: 4,
                len: 1,
                line: 9,
                ..
            }
        ));
        assert_eq!(ctx.vars, before);
    }

    #[test]
    fn table_remove_on_non_list_is_type_mismatch() {
        let fx = fixture(&[]);
        let err = run_all(&fx, &["var.set = t, 'abc'", "table.remove = t, 'a'"])
            .err()
            .unwrap();
        assert!(matches!(err, ScriptError::TypeMismatch { line: 2, .. }));
    }

    #[test]
    fn table_remove_missing_value() {
        let fx = fixture(&[]);
        let err = run_all(&fx, &["table.add = t, 1", "table.remove = t, 9"])
            .err()
            .unwrap();
        assert!(matches!(err, ScriptError::ValueNotFound { .. }));
    }

    #[test]
    fn say_joins_with_spaces() {
        let fx = fixture(&[]);
        run_all(&fx, &["var.set = x, 2", r#"say "x is", x, [1, "a"]"#, "say"]).unwrap();
        assert_eq!(fx.console.contents(), "x is 2 [1, 'a']\n\n");
    }

    #[test]
    fn clear_console() {
        let fx = fixture(&[]);
        run_all(&fx, &["say 1", "console.clear()"]).unwrap();
        assert_eq!(fx.console.contents(), "");
        assert_eq!(fx.console.clear_count(), 1);
    }

    #[test]
    fn debugprint_levels() {
        let fx = fixture(&[]);
        run_all(
            &fx,
            &[
                r#"debugprint "plain""#,
                r#"debugprint -w "careful""#,
                r#"debugprint -e "broken -w""#,
                "debugprint",
            ],
        )
        .unwrap();
        let entries = fx.debug.entries();
        let levels: Vec<_> = entries.iter().map(|e| (e.level, e.message.as_str(), e.line)).collect();
        assert_eq!(
            levels,
            vec![
                (Level::Info, "plain", Some(1)),
                (Level::Warning, "careful", Some(2)),
                (Level::Error, "broken -w", Some(3)),
                (Level::Warning, "debugprint missing string", Some(4)),
            ]
        );
    }

    #[test]
    fn unknown_statement_cites_text() {
        let fx = fixture(&[]);
        let err = run_all(&fx, &["print 1"]).err().unwrap();
        assert_eq!(
            err,
            ScriptError::UnknownStatement {
                statement: "print 1".into(),
                line: 1
            }
        );
    }

    #[test]
    fn invalid_expression_cites_line() {
        let fx = fixture(&[]);
        let err = run_all(&fx, &["say 1", "var.set = x, open('f')"]).err().unwrap();
        assert!(matches!(err, ScriptError::InvalidExpression { line: 2, .. }));
    }

    #[test]
    fn missing_arguments_are_malformed() {
        let fx = fixture(&[]);
        let err = run_all(&fx, &["var.set = x"]).err().unwrap();
        assert!(matches!(err, ScriptError::MalformedStatement { .. }));
    }
}
