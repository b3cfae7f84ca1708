//! Condition language: tokenizer, parser and the shared condition tree.
//!
//! The pipeline is:
//!
//! 1. **Lexing**: tokenize the condition string.
//! 2. **Parsing**: build a [`ConditionTree`] by recursive descent.
//! 3. **Compiling**: handled by [`crate::compiler`], which walks the tree.

pub mod ast;
mod lexer;
pub mod parser;

pub use ast::{
    BoundParameters, ConditionNode, ConditionTree, JoinType, NodeKind, Operator, Predicate,
    ValueRef,
};
pub use parser::parse;
