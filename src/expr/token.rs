//! Tokenizer for the action language.

use logos::Logos;

use crate::error::EvalError;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    #[token("true")]
    True,
    #[token("false")]
    False,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse().ok())]
    Float(f64),

    #[regex(r"[0-9]+", |lex| lex.slice().parse().ok())]
    Int(i64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(String),

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(";")]
    Semi,

    #[token("=")]
    Assign,
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,

    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,

    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
}

/// Strips the surrounding quotes and resolves the escape sequences the
/// dialect supports.
fn unescape(quoted: &str) -> Option<String> {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Some(out)
}

/// Tokenizes a full source string, rejecting anything the dialect does not
/// know (the sandbox has no dots, brackets or other host syntax).
pub fn lex(src: &str) -> Result<Vec<Token>, EvalError> {
    let mut lexer = Token::lexer(src);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(EvalError::Syntax(format!(
                    "unrecognized input '{}'",
                    lexer.slice()
                )));
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_lex_greedily() {
        let tokens = lex("a >= 1 && b == 2").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".into()),
                Token::Ge,
                Token::Int(1),
                Token::AndAnd,
                Token::Ident("b".into()),
                Token::Eq,
                Token::Int(2),
            ]
        );
    }

    #[test]
    fn floats_and_ints_are_distinct() {
        assert_eq!(
            lex("1.5 2").unwrap(),
            vec![Token::Float(1.5), Token::Int(2)]
        );
    }

    #[test]
    fn string_escapes_resolve() {
        assert_eq!(
            lex(r#""a\"b\n""#).unwrap(),
            vec![Token::Str("a\"b\n".into())]
        );
    }

    #[test]
    fn host_syntax_is_rejected() {
        assert!(matches!(lex("obj.attr"), Err(EvalError::Syntax(_))));
        assert!(matches!(lex("xs[0]"), Err(EvalError::Syntax(_))));
    }
}
