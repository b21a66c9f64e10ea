use crate::error::{Result, SchemeError};
use crate::value::Value;
use crate::Config;
use std::iter::Peekable;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Quote,           // '
    Quasiquote,      // `
    Unquote,         // ,
    UnquoteSplicing, // ,@
    Dot,             // .
    Bool(bool),
    Integer(i64),
    Float(f64),
    Str(String),
    Symbol(String),
}

const DELIMITERS: &str = "()'`,;\"";

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            ';' => {
                // Comment: skip to end of line.
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            '\'' => {
                tokens.push(Token::Quote);
                chars.next();
            }
            '`' => {
                tokens.push(Token::Quasiquote);
                chars.next();
            }
            ',' => {
                chars.next();
                if chars.peek() == Some(&'@') {
                    chars.next();
                    tokens.push(Token::UnquoteSplicing);
                } else {
                    tokens.push(Token::Unquote);
                }
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                let mut terminated = false;
                while let Some(next) = chars.next() {
                    match next {
                        '"' => {
                            terminated = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some('\\') => s.push('\\'),
                            Some('"') => s.push('"'),
                            Some(other) => {
                                return Err(SchemeError::Parse(format!(
                                    "invalid escape sequence: \\{}",
                                    other
                                )));
                            }
                            None => {
                                return Err(SchemeError::Parse(
                                    "unterminated string literal".to_string(),
                                ));
                            }
                        },
                        other => s.push(other),
                    }
                }
                if !terminated {
                    return Err(SchemeError::Parse("unterminated string literal".to_string()));
                }
                tokens.push(Token::Str(s));
            }
            '#' => {
                chars.next();
                match chars.next() {
                    Some('t') => tokens.push(Token::Bool(true)),
                    Some('f') => tokens.push(Token::Bool(false)),
                    Some(other) => {
                        return Err(SchemeError::Parse(format!(
                            "invalid boolean literal: #{}",
                            other
                        )));
                    }
                    None => {
                        return Err(SchemeError::Parse("incomplete boolean literal: #".to_string()));
                    }
                }
            }
            _ => {
                // Everything else is an atom chunk, classified after scanning.
                let mut chunk = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() || DELIMITERS.contains(next) {
                        break;
                    }
                    chunk.push(next);
                    chars.next();
                }
                tokens.push(classify_atom(chunk));
            }
        }
    }
    Ok(tokens)
}

fn classify_atom(chunk: String) -> Token {
    if chunk == "." {
        return Token::Dot;
    }
    if let Ok(n) = chunk.parse::<i64>() {
        return Token::Integer(n);
    }
    // Only treat the chunk as a float when it starts numerically, so
    // symbols like `1+` stay symbols but `1.5` and `-2.5e3` parse.
    let numeric_start = chunk
        .strip_prefix(['+', '-'])
        .unwrap_or(&chunk)
        .starts_with(|c: char| c.is_ascii_digit() || c == '.');
    if numeric_start && chunk != "+" && chunk != "-" {
        if let Ok(x) = chunk.parse::<f64>() {
            return Token::Float(x);
        }
    }
    Token::Symbol(chunk)
}

fn tagged_form(keyword: &str, datum: Value) -> Value {
    Value::list([Value::symbol(keyword), datum])
}

fn parse_expr<'a, I>(tokens: &mut Peekable<I>, config: &Config) -> Result<Value>
where
    I: Iterator<Item = &'a Token>,
{
    let token = tokens
        .next()
        .ok_or_else(|| SchemeError::Parse("unexpected end of input".to_string()))?;

    match token {
        Token::LParen => parse_list(tokens, config),
        Token::Quote => Ok(tagged_form("quote", parse_expr(tokens, config)?)),
        Token::Quasiquote => Ok(tagged_form("quasiquote", parse_expr(tokens, config)?)),
        Token::Unquote => Ok(tagged_form("unquote", parse_expr(tokens, config)?)),
        Token::UnquoteSplicing => {
            Ok(tagged_form("unquote-splicing", parse_expr(tokens, config)?))
        }
        Token::RParen => Err(SchemeError::Parse("unexpected ')'".to_string())),
        Token::Dot => Err(SchemeError::Parse("unexpected '.'".to_string())),
        Token::Bool(b) => Ok(Value::Bool(*b)),
        Token::Integer(n) => Ok(Value::Integer(*n)),
        Token::Float(x) => Ok(Value::Float(*x)),
        Token::Str(s) => Ok(Value::string(s.clone())),
        Token::Symbol(s) => Ok(Value::symbol(s)),
    }
}

fn parse_list<'a, I>(tokens: &mut Peekable<I>, config: &Config) -> Result<Value>
where
    I: Iterator<Item = &'a Token>,
{
    let mut items = Vec::new();
    loop {
        match tokens.peek() {
            Some(Token::RParen) => {
                tokens.next();
                return Ok(Value::list(items));
            }
            Some(Token::Dot) => {
                tokens.next();
                let datum = parse_expr(tokens, config)?;
                match tokens.next() {
                    Some(Token::RParen) => {}
                    _ => {
                        return Err(SchemeError::Parse(
                            "expected ')' after dotted tail".to_string(),
                        ));
                    }
                }
                // Dotted pairs are only readable in cons mode; otherwise a
                // dot marks a variadic parameter.
                return if config.dots_are_cons {
                    if items.is_empty() {
                        Err(SchemeError::Parse("unexpected '.'".to_string()))
                    } else {
                        Ok(Value::list_with_tail(items, datum))
                    }
                } else {
                    items.push(tagged_form("variadic", datum));
                    Ok(Value::list(items))
                };
            }
            Some(_) => items.push(parse_expr(tokens, config)?),
            None => return Err(SchemeError::Parse("unmatched '('".to_string())),
        }
    }
}

/// Read a single expression; trailing input is an error.
pub fn parse(input: &str, config: &Config) -> Result<Value> {
    let tokens = tokenize(input)?;
    let mut iter = tokens.iter().peekable();
    let expr = parse_expr(&mut iter, config)?;
    if iter.peek().is_some() {
        return Err(SchemeError::Parse("unexpected tokens after expression".to_string()));
    }
    Ok(expr)
}

/// Read every expression in `input`, in order. Blank input reads as no
/// expressions.
pub fn parse_all(input: &str, config: &Config) -> Result<Vec<Value>> {
    let tokens = tokenize(input)?;
    let mut iter = tokens.iter().peekable();
    let mut exprs = Vec::new();
    while iter.peek().is_some() {
        exprs.push(parse_expr(&mut iter, config)?);
    }
    Ok(exprs)
}
