//! Condition tree shared by both compilers.
//!
//! A [`ConditionTree`] is a flat, left-to-right chain of nodes joined by AND
//! or OR. Each node is either a single-field [`Predicate`] or a parenthesised
//! group holding a nested tree. Every node is owned by exactly one
//! predecessor (or by the tree itself for the root), so the chain is acyclic
//! by construction.
//!
//! The chain is read as a conjunction of OR-runs: an AND join starts a new
//! run while an OR join extends the current one. `a AND b OR c AND d` is
//! therefore `a AND (b OR c) AND d`.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::error::{QueryError, QueryResult};

/// Bound parameter values, keyed by placeholder name.
pub type BoundParameters = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Operators and values
// ---------------------------------------------------------------------------

/// How a node attaches to its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    /// Both sides must hold.
    And,
    /// Either side may hold.
    Or,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// Comparison operator of a leaf predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `IN`
    In,
    /// `NOT IN`
    NotIn,
    /// `LIKE` with `%` wildcards.
    Like,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
}

impl Operator {
    /// Whether the operator takes a right-hand value.
    #[must_use]
    pub fn takes_value(self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }

    /// Source spelling of the operator.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Like => "LIKE",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueRef {
    /// Reference into the bound parameters (`:name:`).
    Param(String),
    /// Literal written inline (number or quoted string).
    Literal(Value),
    /// Parenthesised value list, used by `IN` / `NOT IN`.
    List(Vec<ValueRef>),
}

impl ValueRef {
    /// Resolve against the bound parameters. Lists resolve to JSON arrays.
    pub fn resolve(&self, params: &BoundParameters) -> QueryResult<Value> {
        match self {
            Self::Param(name) => {
                params
                    .get(name)
                    .cloned()
                    .ok_or_else(|| QueryError::UnboundParameter { name: name.clone() })
            }
            Self::Literal(value) => Ok(value.clone()),
            Self::List(items) => items
                .iter()
                .map(|item| item.resolve(params))
                .collect::<QueryResult<Vec<_>>>()
                .map(Value::Array),
        }
    }
}

impl fmt::Display for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Param(name) => write!(f, ":{name}:"),
            Self::Literal(Value::String(s)) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Self::Literal(other) => write!(f, "{other}"),
            Self::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A single-field comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Field name, possibly a dotted path.
    pub field: String,
    /// Comparison operator.
    pub operator: Operator,
    /// Right-hand side; `None` only for `IS NULL` / `IS NOT NULL`.
    pub value: Option<ValueRef>,
}

impl Predicate {
    /// Build a predicate comparing `field` against a bound parameter.
    #[must_use]
    pub fn param(field: impl Into<String>, operator: Operator, name: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: Some(ValueRef::Param(name.into())),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.operator)?;
        if let Some(value) = &self.value {
            write!(f, " {value}")?;
        }
        Ok(())
    }
}

/// What a node holds: a leaf predicate or a nested group, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Leaf comparison.
    Predicate(Predicate),
    /// Parenthesised sub-expression.
    Group(Box<ConditionTree>),
}

/// Link from a node to its successor in the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// How the successor joins this node.
    pub join: JoinType,
    /// The successor, exclusively owned.
    pub node: Box<ConditionNode>,
}

/// One element of a sibling chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionNode {
    /// Leaf or group payload.
    pub kind: NodeKind,
    /// Next sibling, if any.
    pub next: Option<Link>,
}

impl ConditionNode {
    /// The predicate if this is a leaf.
    #[must_use]
    pub fn predicate(&self) -> Option<&Predicate> {
        match &self.kind {
            NodeKind::Predicate(p) => Some(p),
            NodeKind::Group(_) => None,
        }
    }

    /// The nested tree if this is a group.
    #[must_use]
    pub fn group(&self) -> Option<&ConditionTree> {
        match &self.kind {
            NodeKind::Group(tree) => Some(tree),
            NodeKind::Predicate(_) => None,
        }
    }

    fn append(&mut self, join: JoinType, tail: Box<ConditionNode>) {
        match self.next {
            Some(ref mut link) => link.node.append(join, tail),
            None => self.next = Some(Link { join, node: tail }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// A non-empty chain of condition nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionTree {
    root: ConditionNode,
}

impl ConditionTree {
    /// A single-leaf tree.
    #[must_use]
    pub fn leaf(predicate: Predicate) -> Self {
        Self {
            root: ConditionNode {
                kind: NodeKind::Predicate(predicate),
                next: None,
            },
        }
    }

    /// A tree whose only node is a group around `inner`.
    #[must_use]
    pub fn group(inner: ConditionTree) -> Self {
        Self {
            root: ConditionNode {
                kind: NodeKind::Group(Box::new(inner)),
                next: None,
            },
        }
    }

    /// The first node of the chain.
    #[must_use]
    pub fn root(&self) -> &ConditionNode {
        &self.root
    }

    /// Link `other`'s chain onto the end of this one.
    pub fn append(&mut self, join: JoinType, other: ConditionTree) {
        self.root.append(join, Box::new(other.root));
    }

    /// Whether the chain has a single node.
    #[must_use]
    pub fn is_single(&self) -> bool {
        self.root.next.is_none()
    }

    /// Walk the chain, yielding each node with the join that precedes it.
    #[must_use]
    pub fn iter(&self) -> ChainIter<'_> {
        ChainIter {
            next: Some((None, &self.root)),
        }
    }

    /// Whether every join in this chain, and in every nested group, is AND.
    #[must_use]
    pub fn is_conjunctive(&self) -> bool {
        self.iter().all(|(join, node)| {
            join != Some(JoinType::Or) && node.group().is_none_or(ConditionTree::is_conjunctive)
        })
    }

    /// Split the chain into OR-runs. Runs are implicitly AND-ed together.
    #[must_use]
    pub fn runs(&self) -> Vec<Vec<&ConditionNode>> {
        let mut runs: Vec<Vec<&ConditionNode>> = Vec::new();
        for (join, node) in self.iter() {
            match (join, runs.last_mut()) {
                (Some(JoinType::Or), Some(run)) => run.push(node),
                _ => runs.push(vec![node]),
            }
        }
        runs
    }

    /// Every leaf predicate, depth-first in source order.
    #[must_use]
    pub fn predicates(&self) -> Vec<&Predicate> {
        let mut out = Vec::new();
        for (_, node) in self.iter() {
            match &node.kind {
                NodeKind::Predicate(p) => out.push(p),
                NodeKind::Group(tree) => out.extend(tree.predicates()),
            }
        }
        out
    }
}

impl fmt::Display for ConditionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (join, node) in self.iter() {
            if let Some(join) = join {
                write!(f, " {join} ")?;
            }
            match &node.kind {
                NodeKind::Predicate(p) => write!(f, "{p}")?,
                NodeKind::Group(tree) => write!(f, "({tree})")?,
            }
        }
        Ok(())
    }
}

/// Iterator over a sibling chain.
#[derive(Debug)]
pub struct ChainIter<'a> {
    next: Option<(Option<JoinType>, &'a ConditionNode)>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = (Option<JoinType>, &'a ConditionNode);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current
            .1
            .next
            .as_ref()
            .map(|link| (Some(link.join), link.node.as_ref()));
        Some(current)
    }
}
