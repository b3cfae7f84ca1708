//! Fluent query builder.
//!
//! ```ignore
//! let shape = Select::new()
//!     .from("orders")
//!     .and_where("customer = :c:")
//!     .bind("c", "u42")
//!     .or_where_args("status = ?", ["open"])
//!     .or_where_args("status = ?", ["held"])
//!     .order_by("created", SortOrder::Desc)
//!     .limit(10, 0)
//!     .build()?;
//! ```
//!
//! Every `and_where` clause is spliced onto the root chain with AND. The
//! `or_where` clauses are chained with OR among themselves and the result
//! joins the root chain as one AND-ed group, so at least one of them must
//! hold.

use nosql_select_model::SortOrder;
use serde_json::Value;

use crate::compiler::{OrderBy, QueryShape};
use crate::error::{QueryError, QueryResult};
use crate::expression::{BoundParameters, ConditionTree, JoinType, parse};

#[derive(Debug, Clone, PartialEq)]
struct Clause {
    text: String,
    args: Vec<Value>,
}

/// Accumulates the parts of a query before compilation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    sources: Vec<String>,
    index: Option<String>,
    columns: Vec<String>,
    and_clauses: Vec<Clause>,
    or_clauses: Vec<Clause>,
    params: BoundParameters,
    order: Vec<OrderBy>,
    limit: usize,
    skip: usize,
}

impl Select {
    /// An empty builder that reads everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty builder with a default page size.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Add a source. For the key-value backend the first call names the
    /// table and the second the index; the search backend reads every named
    /// index.
    #[must_use]
    pub fn from(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }

    /// Select a key-value secondary index explicitly.
    #[must_use]
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Project the given fields. Empty means all.
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Require an expression to hold.
    #[must_use]
    pub fn and_where(self, expression: impl Into<String>) -> Self {
        self.and_where_args(expression, Vec::<Value>::new())
    }

    /// Require an expression with `?` placeholders filled from `args`.
    #[must_use]
    pub fn and_where_args<I, V>(mut self, expression: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.and_clauses.push(Clause {
            text: expression.into(),
            args: args.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Add an alternative: at least one `or_where` expression must hold.
    #[must_use]
    pub fn or_where(self, expression: impl Into<String>) -> Self {
        self.or_where_args(expression, Vec::<Value>::new())
    }

    /// Add an alternative with `?` placeholders filled from `args`.
    #[must_use]
    pub fn or_where_args<I, V>(mut self, expression: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.or_clauses.push(Clause {
            text: expression.into(),
            args: args.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Require `field` to equal one of `values`. The list is bound as
    /// `in_<field>`.
    #[must_use]
    pub fn in_where<I, V>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let name = format!(
            "in_{}",
            field.replace(|c: char| !c.is_ascii_alphanumeric(), "_")
        );
        let values = values.into_iter().map(Into::into).collect();
        self.params.insert(name.clone(), Value::Array(values));
        self.and_where(format!("{field} IN :{name}:"))
    }

    /// Bind a named placeholder.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Append an ordering entry.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.order.push(OrderBy {
            field: field.into(),
            order,
        });
        self
    }

    /// Set the page window. A `limit` of zero reads everything.
    #[must_use]
    pub fn limit(mut self, limit: usize, skip: usize) -> Self {
        self.limit = limit;
        self.skip = skip;
        self
    }

    /// Parse every clause and combine them into a compilable shape.
    pub fn build(&self) -> QueryResult<QueryShape> {
        let mut params = self.params.clone();
        let mut positional = 0;
        let mut parse_clause = |clause: &Clause| -> QueryResult<ConditionTree> {
            let text = bind_positional(clause, &mut positional, &mut params)?;
            parse(&text)
        };

        let mut condition: Option<ConditionTree> = None;
        for clause in &self.and_clauses {
            let tree = parse_clause(clause)?;
            match condition.as_mut() {
                Some(chain) => chain.append(JoinType::And, tree),
                None => condition = Some(tree),
            }
        }

        let mut alternatives: Option<ConditionTree> = None;
        for clause in &self.or_clauses {
            let mut tree = parse_clause(clause)?;
            if !tree.is_single() {
                tree = ConditionTree::group(tree);
            }
            match alternatives.as_mut() {
                Some(chain) => chain.append(JoinType::Or, tree),
                None => alternatives = Some(tree),
            }
        }

        if let Some(mut alternatives) = alternatives {
            condition = match condition {
                Some(mut chain) => {
                    if !alternatives.is_single() {
                        alternatives = ConditionTree::group(alternatives);
                    }
                    chain.append(JoinType::And, alternatives);
                    Some(chain)
                }
                None => Some(alternatives),
            };
        }

        Ok(QueryShape {
            sources: self.sources.clone(),
            index: self.index.clone(),
            condition,
            params,
            columns: self.columns.clone(),
            order: self.order.clone(),
            limit: self.limit,
            skip: self.skip,
        })
    }
}

/// Rewrite each `?` outside a quoted string to `:arg_<n>:` and bind the
/// matching argument. `n` counts across every clause of the builder.
fn bind_positional(
    clause: &Clause,
    counter: &mut usize,
    params: &mut BoundParameters,
) -> QueryResult<String> {
    let mut out = String::with_capacity(clause.text.len());
    let mut args = clause.args.iter();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in clause.text.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                out.push(c);
            }
            None if c == '?' => {
                let value = args.next().ok_or_else(|| {
                    QueryError::syntax(format!(
                        "more '?' placeholders than arguments in '{}'",
                        clause.text
                    ))
                })?;
                let name = format!("arg_{counter}");
                *counter += 1;
                out.push(':');
                out.push_str(&name);
                out.push(':');
                params.insert(name, value.clone());
            }
            None => {
                if c == '\'' || c == '"' {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
    }

    if args.next().is_some() {
        return Err(QueryError::syntax(format!(
            "more arguments than '?' placeholders in '{}'",
            clause.text
        )));
    }
    Ok(out)
}
