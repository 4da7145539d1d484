//! Expression evaluator
//!
//! A small, closed grammar: literals, variables, indexing, arithmetic,
//! comparison and boolean operators. There are no calls, attribute access or
//! any other way to reach the host, so anything outside the grammar fails.

mod eval;
mod lexer;
mod parser;

use thiserror::Error;

use super::value::{Value, VarStore};

pub use eval::{binary, resolve_index};
pub use parser::BinaryOp;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("name '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("{0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,

    #[error("{0}")]
    Index(String),
}

/// Evaluate `input` against the variable store
pub fn evaluate(input: &str, vars: &VarStore) -> Result<Value, ExprError> {
    let tokens = lexer::tokenize(input)?;
    let expr = parser::Parser::new(tokens).parse()?;
    eval::eval(&expr, vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> VarStore {
        let mut vars = VarStore::new();
        vars.insert("x".into(), Value::Int(2));
        vars.insert("name".into(), Value::from("gx"));
        vars.insert(
            "xs".into(),
            Value::List(vec![Value::Int(10), Value::Int(20), Value::Int(30)]),
        );
        vars
    }

    fn eval_ok(input: &str) -> Value {
        evaluate(input, &vars()).unwrap()
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval_ok("1 + 2 * 3"), Value::Int(7));
        assert_eq!(eval_ok("(1 + 2) * 3"), Value::Int(9));
        assert_eq!(eval_ok("-2 ** 2"), Value::Int(-4));
        assert_eq!(eval_ok("2 ** -1"), Value::Float(0.5));
        assert_eq!(eval_ok("x * 1.5"), Value::Float(3.0));
    }

    #[test]
    fn comparisons_and_booleans() {
        assert_eq!(eval_ok("x > 1 and x < 3"), Value::Bool(true));
        assert_eq!(eval_ok("1 < x < 2"), Value::Bool(false));
        assert_eq!(eval_ok("not x == 2"), Value::Bool(false));
        assert_eq!(eval_ok("x == 2.0"), Value::Bool(true));
        assert_eq!(eval_ok("true or missing"), Value::Bool(true));
        assert_eq!(eval_ok("0 or 'fallback'"), Value::from("fallback"));
    }

    #[test]
    fn indexing_and_membership() {
        assert_eq!(eval_ok("xs[0]"), Value::Int(10));
        assert_eq!(eval_ok("xs[-1]"), Value::Int(30));
        assert_eq!(eval_ok("name[1]"), Value::from("x"));
        assert_eq!(eval_ok("20 in xs"), Value::Bool(true));
        assert_eq!(eval_ok("'z' not in name"), Value::Bool(true));
        assert_eq!(eval_ok("{'a': [1, 2]}['a'][1]"), Value::Int(2));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(eval_ok("'hi ' + name"), Value::from("hi gx"));
    }

    #[test]
    fn boolean_keywords_are_normalized() {
        assert_eq!(eval_ok("true"), Value::Bool(true));
        assert_eq!(eval_ok("False"), Value::Bool(false));
    }

    #[test]
    fn fails_closed() {
        let vars = vars();
        assert!(matches!(
            evaluate("missing + 1", &vars),
            Err(ExprError::UndefinedVariable(_))
        ));
        assert!(matches!(
            evaluate("__import__('os')", &vars),
            Err(ExprError::Syntax(_))
        ));
        assert!(matches!(evaluate("name.upper", &vars), Err(ExprError::Syntax(_))));
        assert!(matches!(evaluate("xs[5]", &vars), Err(ExprError::Index(_))));
        assert!(matches!(evaluate("1 + 'a'", &vars), Err(ExprError::Type(_))));
        assert_eq!(evaluate("x // 0", &vars), Err(ExprError::DivisionByZero));
    }
}
