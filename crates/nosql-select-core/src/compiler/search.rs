//! Lowering into a search engine `bool` query.
//!
//! The search backend has no key/filter split, so every leaf maps to exactly
//! one clause. Single-member runs of the chain are required clauses; the
//! members of an OR-run are optional clauses of which at least one must hold.

use nosql_select_model::{
    BoolQuery, RangeBounds, SearchBody, SearchRequest, SearchTerm, SortClause,
};
use serde_json::Value;
use tracing::debug;

use super::{
    LikePattern, QueryMethod, QueryPlan, QueryShape, list_values, scalar_value, string_value,
};
use crate::error::{QueryError, QueryResult};
use crate::expression::{
    BoundParameters, ConditionNode, ConditionTree, NodeKind, Operator, Predicate,
};

/// Compile a query shape into a `_search` request.
pub fn compile(shape: &QueryShape) -> QueryResult<QueryPlan<SearchRequest>> {
    if shape.sources.is_empty() {
        return Err(QueryError::MissingSource);
    }

    let query = shape
        .condition
        .as_ref()
        .map(|tree| compile_chain(tree, &shape.params))
        .transpose()?;

    let request = SearchRequest {
        index: shape.sources.join(","),
        body: SearchBody {
            query,
            sort: shape
                .order
                .iter()
                .map(|o| SortClause {
                    field: o.field.clone(),
                    order: o.order,
                })
                .collect(),
            source: shape.columns.clone(),
            from: (shape.skip > 0).then_some(shape.skip),
            size: (shape.limit > 0).then_some(shape.limit),
        },
    };

    debug!(
        index = %request.index,
        from = ?request.body.from,
        size = ?request.body.size,
        "compiled search query"
    );

    Ok(QueryPlan {
        method: QueryMethod::Search,
        native_params: request,
    })
}

fn compile_chain(tree: &ConditionTree, params: &BoundParameters) -> QueryResult<SearchTerm> {
    let runs = tree.runs();
    let or_runs = runs.iter().filter(|run| run.len() > 1).count();
    let mut query = BoolQuery::default();

    for run in &runs {
        if let [node] = run.as_slice() {
            let (term, negated) = compile_node(node, params)?;
            if negated {
                query.must_not.push(term);
            } else {
                query.must.push(term);
            }
            continue;
        }

        let members = run
            .iter()
            .map(|node| {
                compile_node(node, params).map(|(term, negated)| optional(term, negated))
            })
            .collect::<QueryResult<Vec<_>>>()?;
        if or_runs == 1 {
            query.should.extend(members);
        } else {
            query.must.push(SearchTerm::Bool(BoolQuery {
                should: members,
                ..BoolQuery::default()
            }));
        }
    }

    Ok(SearchTerm::Bool(query))
}

/// Negated clauses cannot sit in `should` directly, so they are wrapped.
fn optional(term: SearchTerm, negated: bool) -> SearchTerm {
    if negated {
        SearchTerm::Bool(BoolQuery {
            must_not: vec![term],
            ..BoolQuery::default()
        })
    } else {
        term
    }
}

fn compile_node(
    node: &ConditionNode,
    params: &BoundParameters,
) -> QueryResult<(SearchTerm, bool)> {
    match &node.kind {
        NodeKind::Predicate(p) => compile_leaf(p, params),
        NodeKind::Group(group) => Ok((compile_chain(group, params)?, false)),
    }
}

/// Map one predicate to a clause, and whether it must be negated.
fn compile_leaf(p: &Predicate, params: &BoundParameters) -> QueryResult<(SearchTerm, bool)> {
    let field = p.field.clone();
    let term = |value: Value| SearchTerm::Term {
        field: p.field.clone(),
        value,
    };
    let range = |bounds: RangeBounds| SearchTerm::Range {
        field: p.field.clone(),
        bounds,
    };

    Ok(match p.operator {
        Operator::Eq => (term(scalar_value(p, params)?), false),
        Operator::Ne => (term(scalar_value(p, params)?), true),
        Operator::Gt => (
            range(RangeBounds {
                gt: Some(scalar_value(p, params)?),
                ..RangeBounds::default()
            }),
            false,
        ),
        Operator::Ge => (
            range(RangeBounds {
                gte: Some(scalar_value(p, params)?),
                ..RangeBounds::default()
            }),
            false,
        ),
        Operator::Lt => (
            range(RangeBounds {
                lt: Some(scalar_value(p, params)?),
                ..RangeBounds::default()
            }),
            false,
        ),
        Operator::Le => (
            range(RangeBounds {
                lte: Some(scalar_value(p, params)?),
                ..RangeBounds::default()
            }),
            false,
        ),
        Operator::In | Operator::NotIn => (
            SearchTerm::Terms {
                field,
                values: list_values(p, params)?,
            },
            p.operator == Operator::NotIn,
        ),
        Operator::IsNotNull => (SearchTerm::Exists { field }, false),
        Operator::IsNull => (SearchTerm::Exists { field }, true),
        Operator::Like => {
            let pattern = string_value(p, params)?;
            match LikePattern::classify(&pattern) {
                LikePattern::Exact(value) => (term(Value::String(value)), false),
                LikePattern::Prefix(_) | LikePattern::Contains(_) | LikePattern::Other(_) => (
                    SearchTerm::Wildcard {
                        field,
                        pattern: pattern.replace('%', "*"),
                    },
                    false,
                ),
            }
        }
    })
}
