//! Recursive-descent parser for the condition language.
//!
//! ```text
//! chain     := term (("AND" | "OR") term)*
//! term      := "(" chain ")" | predicate
//! predicate := FIELD op value
//!            | FIELD ("IN" | "NOT IN") (value | "(" value ("," value)* ")")
//!            | FIELD "IS" ["NOT"] "NULL"
//! value     := PLACEHOLDER | NUMBER | STRING
//! ```
//!
//! Joins are recorded in source order on the sibling chain; the parser does
//! not rebalance them.
//!
//! Parenthesized groups nest to any depth, and one level may hold several of
//! them. This is wider than a grammar allowing a single group per level, but
//! every expression such a grammar accepts parses to the same tree here.

use serde_json::Value;

use super::ast::{ConditionTree, JoinType, Operator, Predicate, ValueRef};
use super::lexer::{Lexer, Token};
use crate::error::{QueryError, QueryResult};

/// Parse a condition expression into a tree.
///
/// Fails with [`QueryError::Syntax`] when the text is blank, contains a
/// character or operator the language does not know, or has unbalanced
/// parentheses. A well-tokenized leaf that does not fit the predicate
/// grammar fails with [`QueryError::UnsupportedCondition`].
pub fn parse(expression: &str) -> QueryResult<ConditionTree> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(QueryError::syntax("empty expression"));
    }

    let tokens = Lexer::new(trimmed).tokenize()?;
    let mut parser = Parser::new(tokens);
    let tree = parser.parse_chain()?;
    match parser.peek() {
        Token::Eof => Ok(tree),
        Token::RParen => Err(QueryError::syntax("unbalanced parentheses: unexpected ')'")),
        other => Err(QueryError::syntax(format!("unexpected {other}"))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Source text of the leaf that starts at `start`, used in error messages.
    fn leaf_text(&self, start: usize) -> String {
        let mut depth = 0usize;
        let mut parts = Vec::new();
        for tok in &self.tokens[start.min(self.tokens.len())..] {
            match tok {
                Token::LParen => depth += 1,
                Token::RParen if depth > 0 => depth -= 1,
                t if depth == 0 && t.ends_term() => break,
                _ => {}
            }
            parts.push(tok.to_string());
        }
        parts.join(" ")
    }

    fn unsupported(&self, start: usize, reason: impl Into<String>) -> QueryError {
        QueryError::unsupported(self.leaf_text(start), reason)
    }
}

// ---------------------------------------------------------------------------
// Chains and groups
// ---------------------------------------------------------------------------

impl Parser {
    fn parse_chain(&mut self) -> QueryResult<ConditionTree> {
        let mut tree = self.parse_term()?;
        loop {
            let join = match self.peek() {
                Token::And => JoinType::And,
                Token::Or => JoinType::Or,
                _ => return Ok(tree),
            };
            self.advance();
            let next = self.parse_term()?;
            tree.append(join, next);
        }
    }

    fn parse_term(&mut self) -> QueryResult<ConditionTree> {
        if !self.eat(&Token::LParen) {
            return self.parse_predicate();
        }
        if self.peek() == &Token::RParen {
            return Err(QueryError::syntax("empty parenthesis group"));
        }
        let inner = self.parse_chain()?;
        if !self.eat(&Token::RParen) {
            return Err(match self.peek() {
                Token::Eof => QueryError::syntax("unbalanced parentheses: missing ')'"),
                other => QueryError::syntax(format!("unexpected {other} inside group")),
            });
        }
        Ok(ConditionTree::group(inner))
    }
}

// ---------------------------------------------------------------------------
// Leaf predicates
// ---------------------------------------------------------------------------

impl Parser {
    fn parse_predicate(&mut self) -> QueryResult<ConditionTree> {
        let start = self.pos;

        let field = match self.advance() {
            Token::Identifier(name) => name,
            tok if tok.ends_term() => {
                return Err(QueryError::syntax(format!("unexpected {tok}")));
            }
            _ => return Err(self.unsupported(start, "expected a field name")),
        };

        let (operator, value) = match self.advance() {
            Token::Eq => (Operator::Eq, Some(self.parse_value(start)?)),
            Token::Ne => (Operator::Ne, Some(self.parse_value(start)?)),
            Token::Lt => (Operator::Lt, Some(self.parse_value(start)?)),
            Token::Le => (Operator::Le, Some(self.parse_value(start)?)),
            Token::Gt => (Operator::Gt, Some(self.parse_value(start)?)),
            Token::Ge => (Operator::Ge, Some(self.parse_value(start)?)),
            Token::Like => (Operator::Like, Some(self.parse_value(start)?)),
            Token::In => (Operator::In, Some(self.parse_in_values(start)?)),
            Token::Not => {
                if !self.eat(&Token::In) {
                    return Err(self.unsupported(start, "NOT is only supported as NOT IN"));
                }
                (Operator::NotIn, Some(self.parse_in_values(start)?))
            }
            Token::Is => {
                let operator = if self.eat(&Token::Not) {
                    Operator::IsNotNull
                } else {
                    Operator::IsNull
                };
                if !self.eat(&Token::Null) {
                    return Err(self.unsupported(start, "IS must be followed by [NOT] NULL"));
                }
                (operator, None)
            }
            Token::Between => {
                return Err(self.unsupported(start, "BETWEEN is not supported, use >= and <="));
            }
            _ => return Err(self.unsupported(start, "expected a comparison operator")),
        };

        if !self.peek().ends_term() {
            return Err(self.unsupported(start, "unexpected trailing input"));
        }

        Ok(ConditionTree::leaf(Predicate {
            field,
            operator,
            value,
        }))
    }

    fn parse_value(&mut self, start: usize) -> QueryResult<ValueRef> {
        match self.advance() {
            Token::Placeholder(name) => Ok(ValueRef::Param(name)),
            Token::Str(s) => Ok(ValueRef::Literal(Value::String(s))),
            Token::Number(n) => n
                .parse::<serde_json::Number>()
                .map(|n| ValueRef::Literal(Value::Number(n)))
                .map_err(|_| QueryError::syntax(format!("invalid number '{n}'"))),
            _ => Err(self.unsupported(start, "expected a placeholder or literal value")),
        }
    }

    fn parse_in_values(&mut self, start: usize) -> QueryResult<ValueRef> {
        if !self.eat(&Token::LParen) {
            return self.parse_value(start);
        }
        let mut items = vec![self.parse_value(start)?];
        while self.eat(&Token::Comma) {
            items.push(self.parse_value(start)?);
        }
        if !self.eat(&Token::RParen) {
            return Err(self.unsupported(start, "unterminated IN list"));
        }
        Ok(ValueRef::List(items))
    }
}
