//! Tokenizer for script expressions

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),

    // Keywords
    True,
    False,
    None,
    And,
    Or,
    Not,
    In,

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let ch = chars[pos];

        if ch.is_whitespace() {
            pos += 1;
            continue;
        }

        if ch.is_ascii_digit() {
            let (token, next) = number(&chars, pos)?;
            tokens.push(token);
            pos = next;
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            let word: String = chars[start..pos].iter().collect();
            tokens.push(keyword(word));
            continue;
        }

        if ch == '"' || ch == '\'' {
            let (text, next) = string(&chars, pos)?;
            tokens.push(Token::Str(text));
            pos = next;
            continue;
        }

        let next = chars.get(pos + 1).copied();
        let (token, width) = match (ch, next) {
            ('*', Some('*')) => (Token::StarStar, 2),
            ('/', Some('/')) => (Token::SlashSlash, 2),
            ('=', Some('=')) => (Token::EqEq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('{', _) => (Token::LBrace, 1),
            ('}', _) => (Token::RBrace, 1),
            (',', _) => (Token::Comma, 1),
            (':', _) => (Token::Colon, 1),
            _ => return Err(ExprError::Syntax(format!("unexpected character '{}'", ch))),
        };
        tokens.push(token);
        pos += width;
    }

    Ok(tokens)
}

fn keyword(word: String) -> Token {
    match word.as_str() {
        "true" | "True" => Token::True,
        "false" | "False" => Token::False,
        "none" | "None" => Token::None,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "in" => Token::In,
        _ => Token::Ident(word),
    }
}

fn number(chars: &[char], start: usize) -> Result<(Token, usize), ExprError> {
    let mut pos = start;
    let mut is_float = false;
    while pos < chars.len() && chars[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos + 1 < chars.len() && chars[pos] == '.' && chars[pos + 1].is_ascii_digit() {
        is_float = true;
        pos += 1;
        while pos < chars.len() && chars[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos < chars.len() && (chars[pos] == 'e' || chars[pos] == 'E') {
        let mut probe = pos + 1;
        if probe < chars.len() && (chars[probe] == '+' || chars[probe] == '-') {
            probe += 1;
        }
        if probe < chars.len() && chars[probe].is_ascii_digit() {
            is_float = true;
            pos = probe;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }

    let text: String = chars[start..pos].iter().collect();
    let token = if is_float {
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|_| ExprError::Syntax(format!("invalid number '{}'", text)))?
    } else {
        text.parse::<i64>()
            .map(Token::Int)
            .map_err(|_| ExprError::Syntax(format!("integer literal '{}' is too large", text)))?
    };
    Ok((token, pos))
}

fn string(chars: &[char], start: usize) -> Result<(String, usize), ExprError> {
    let quote = chars[start];
    let mut out = String::new();
    let mut pos = start + 1;
    while pos < chars.len() {
        let ch = chars[pos];
        if ch == quote {
            return Ok((out, pos + 1));
        }
        if ch == '\\' && pos + 1 < chars.len() {
            pos += 1;
            out.push(match chars[pos] {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
        } else {
            out.push(ch);
        }
        pos += 1;
    }
    Err(ExprError::Syntax("unterminated string literal".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_operators() {
        let tokens = tokenize("a ** 2 // 3 != 4").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".into()),
                Token::StarStar,
                Token::Int(2),
                Token::SlashSlash,
                Token::Int(3),
                Token::NotEq,
                Token::Int(4),
            ]
        );
    }

    #[test]
    fn tokenizes_numbers() {
        assert_eq!(tokenize("1.5").unwrap(), vec![Token::Float(1.5)]);
        assert_eq!(tokenize("2e3").unwrap(), vec![Token::Float(2000.0)]);
        assert_eq!(tokenize("42").unwrap(), vec![Token::Int(42)]);
    }

    #[test]
    fn keywords_accept_both_cases() {
        assert_eq!(
            tokenize("true False None").unwrap(),
            vec![Token::True, Token::False, Token::None]
        );
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(
            tokenize(r#""a\"b" 'c\n'"#).unwrap(),
            vec![Token::Str("a\"b".into()), Token::Str("c\n".into())]
        );
    }

    #[test]
    fn keyword_text_inside_strings_is_untouched() {
        assert_eq!(tokenize("'true'").unwrap(), vec![Token::Str("true".into())]);
    }

    #[test]
    fn rejects_attribute_access() {
        assert!(tokenize("os.system").is_err());
    }

    #[test]
    fn rejects_unterminated_string() {
        assert!(tokenize("\"abc").is_err());
    }
}
