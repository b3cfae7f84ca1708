//! Tokenizer for the condition language.
//!
//! Keywords are matched case-insensitively. Placeholders are written
//! `:name:` and quoted strings accept either quote character with `\`
//! escapes.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use crate::error::{QueryError, QueryResult};

/// Lexer token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// Field name, possibly dotted.
    Identifier(String),
    /// Bound parameter reference (`:name:`).
    Placeholder(String),
    /// Numeric literal, kept as written.
    Number(String),
    /// Quoted string literal, unescaped.
    Str(String),
    /// `=`
    Eq,
    /// `!=` or `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    // Keywords
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `NOT`
    Not,
    /// `IN`
    In,
    /// `LIKE`
    Like,
    /// `IS`
    Is,
    /// `NULL`
    Null,
    /// `BETWEEN`
    Between,
    /// End of input.
    Eof,
}

impl Token {
    /// Tokens that end a leaf predicate at the current nesting level.
    pub(crate) fn ends_term(&self) -> bool {
        matches!(self, Self::And | Self::Or | Self::RParen | Self::Eof)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(s) | Self::Number(s) => f.write_str(s),
            Self::Placeholder(s) => write!(f, ":{s}:"),
            Self::Str(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Self::Eq => f.write_str("="),
            Self::Ne => f.write_str("!="),
            Self::Lt => f.write_str("<"),
            Self::Le => f.write_str("<="),
            Self::Gt => f.write_str(">"),
            Self::Ge => f.write_str(">="),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::Comma => f.write_str(","),
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
            Self::Not => f.write_str("NOT"),
            Self::In => f.write_str("IN"),
            Self::Like => f.write_str("LIKE"),
            Self::Is => f.write_str("IS"),
            Self::Null => f.write_str("NULL"),
            Self::Between => f.write_str("BETWEEN"),
            Self::Eof => f.write_str("end of expression"),
        }
    }
}

/// Tokenizer over a condition string.
pub(crate) struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    /// Tokenize the entire input. The result always ends with [`Token::Eof`].
    pub(crate) fn tokenize(&mut self) -> QueryResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok == Token::Eof;
            tokens.push(tok);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(char::is_ascii_whitespace) {
            self.chars.next();
        }
    }

    fn next_token(&mut self) -> QueryResult<Token> {
        self.skip_whitespace();

        let Some(&ch) = self.chars.peek() else {
            return Ok(Token::Eof);
        };

        match ch {
            ':' => self.read_placeholder(),
            '\'' | '"' => self.read_string(ch),
            '=' => Ok(self.single(Token::Eq)),
            '!' => {
                self.chars.next();
                if self.chars.next_if_eq(&'=').is_some() {
                    Ok(Token::Ne)
                } else {
                    Err(QueryError::syntax("unrecognized operator '!'"))
                }
            }
            '<' => {
                self.chars.next();
                if self.chars.next_if_eq(&'=').is_some() {
                    Ok(Token::Le)
                } else if self.chars.next_if_eq(&'>').is_some() {
                    Ok(Token::Ne)
                } else {
                    Ok(Token::Lt)
                }
            }
            '>' => {
                self.chars.next();
                if self.chars.next_if_eq(&'=').is_some() {
                    Ok(Token::Ge)
                } else {
                    Ok(Token::Gt)
                }
            }
            '(' => Ok(self.single(Token::LParen)),
            ')' => Ok(self.single(Token::RParen)),
            ',' => Ok(self.single(Token::Comma)),
            c if c.is_ascii_digit() || c == '-' => self.read_number(),
            c if is_ident_start(c) => Ok(self.read_identifier_or_keyword()),
            other => Err(QueryError::syntax(format!("unrecognized character '{other}'"))),
        }
    }

    fn single(&mut self, tok: Token) -> Token {
        self.chars.next();
        tok
    }

    fn read_placeholder(&mut self) -> QueryResult<Token> {
        self.chars.next(); // consume ':'
        let mut name = String::new();
        while let Some(c) = self.chars.next_if(|c| is_ident_continue(*c)) {
            name.push(c);
        }
        if name.is_empty() {
            return Err(QueryError::syntax("empty placeholder name after ':'"));
        }
        if self.chars.next_if_eq(&':').is_none() {
            return Err(QueryError::syntax(format!(
                "placeholder ':{name}' is missing its closing ':'"
            )));
        }
        Ok(Token::Placeholder(name))
    }

    fn read_string(&mut self, quote: char) -> QueryResult<Token> {
        self.chars.next(); // consume opening quote
        let mut s = String::new();
        loop {
            match self.chars.next() {
                Some('\\') => match self.chars.next() {
                    Some(escaped) => s.push(escaped),
                    None => break,
                },
                Some(c) if c == quote => return Ok(Token::Str(s)),
                Some(c) => s.push(c),
                None => break,
            }
        }
        Err(QueryError::syntax("unterminated string literal"))
    }

    fn read_number(&mut self) -> QueryResult<Token> {
        let mut s = String::new();
        if let Some(sign) = self.chars.next_if_eq(&'-') {
            s.push(sign);
        }
        while let Some(c) = self
            .chars
            .next_if(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+'))
        {
            s.push(c);
        }
        if s.parse::<serde_json::Number>().is_err() {
            return Err(QueryError::syntax(format!("invalid number '{s}'")));
        }
        Ok(Token::Number(s))
    }

    fn read_identifier_or_keyword(&mut self) -> Token {
        let mut ident = String::new();
        while let Some(c) = self.chars.next_if(|c| is_ident_continue(*c) || *c == '.') {
            ident.push(c);
        }
        match ident.to_ascii_lowercase().as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "in" => Token::In,
            "like" => Token::Like,
            "is" => Token::Is,
            "null" => Token::Null,
            "between" => Token::Between,
            _ => Token::Identifier(ident),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
