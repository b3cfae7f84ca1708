//! Lowering into key-value `Query` / `Scan` parameters.
//!
//! Every OR-run of the condition chain is classified on its own. A run that
//! is a single key-eligible leaf, or a single AND-only group made entirely of
//! key-eligible leaves, feeds the key condition. Everything else becomes part
//! of the filter. Runs are AND-ed, so moving a run between the two
//! expressions does not change the result set.

use std::collections::HashMap;

use nosql_select_model::{AttributeValue, QueryInput, ScanInput, SortOrder};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    LikePattern, QueryMethod, QueryPlan, QueryShape, list_values, scalar_value, string_value,
};
use crate::backend::PageCursor;
use crate::error::{QueryError, QueryResult};
use crate::expression::{
    BoundParameters, ConditionNode, ConditionTree, NodeKind, Operator, Predicate, ValueRef,
};
use crate::schema::{KeySchema, SchemaInfo};

/// Native key-value request parameters shared by `Query` and `Scan`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyValueParams {
    /// Table to read.
    pub table_name: String,
    /// Secondary index to read, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    /// Key condition; set only for indexed queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_condition_expression: Option<String>,
    /// Post-read filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,
    /// Projected attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    /// Attribute name aliases.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,
    /// Attribute value placeholders.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
    /// Sort key direction; set only for ordered indexed queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_index_forward: Option<bool>,
    /// Requested page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
    /// Strongly consistent read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistent_read: Option<bool>,
    /// Attributes making up a last-evaluated key for this read: the table's
    /// primary key plus the selected index's key.
    #[serde(skip)]
    pub key_fields: Vec<String>,
}

impl KeyValueParams {
    /// Build a `Query` request for one round.
    #[must_use]
    pub fn to_query_input(&self, limit: Option<i32>, start: Option<PageCursor>) -> QueryInput {
        QueryInput {
            table_name: self.table_name.clone(),
            index_name: self.index_name.clone(),
            key_condition_expression: self.key_condition_expression.clone(),
            filter_expression: self.filter_expression.clone(),
            projection_expression: self.projection_expression.clone(),
            expression_attribute_names: self.expression_attribute_names.clone(),
            expression_attribute_values: self.expression_attribute_values.clone(),
            scan_index_forward: self.scan_index_forward,
            limit: limit.or(self.limit),
            exclusive_start_key: start.map(PageCursor::into_start_key).unwrap_or_default(),
            consistent_read: self.consistent_read,
        }
    }

    /// Build a `Scan` request for one round.
    #[must_use]
    pub fn to_scan_input(&self, limit: Option<i32>, start: Option<PageCursor>) -> ScanInput {
        ScanInput {
            table_name: self.table_name.clone(),
            index_name: self.index_name.clone(),
            filter_expression: self.filter_expression.clone(),
            projection_expression: self.projection_expression.clone(),
            expression_attribute_names: self.expression_attribute_names.clone(),
            expression_attribute_values: self.expression_attribute_values.clone(),
            limit: limit.or(self.limit),
            exclusive_start_key: start.map(PageCursor::into_start_key).unwrap_or_default(),
            consistent_read: self.consistent_read,
        }
    }
}

/// Compile a query shape against the table's live key schema.
pub fn compile(
    shape: &QueryShape,
    schema: &SchemaInfo,
    consistent_read: bool,
) -> QueryResult<QueryPlan<KeyValueParams>> {
    let table = shape.table()?;
    let index = shape.key_value_index();
    let keys = schema.key_schema_for(index)?;

    let mut ctx = ExpressionContext::new(&shape.params);
    let mut parts = Vec::new();
    if let Some(tree) = &shape.condition {
        classify_chain(tree, keys, &mut ctx, &mut parts)?;
    }

    let has_partition = parts
        .iter()
        .any(|p| p.key_field.as_deref() == Some(keys.partition_key.as_str()));
    if !has_partition {
        if let Some(index) = index {
            return Err(QueryError::MissingIndexKeyCondition {
                index: index.to_owned(),
            });
        }
        for part in &mut parts {
            part.key_field = None;
        }
    }

    let (key_parts, filter_parts): (Vec<_>, Vec<_>) =
        parts.into_iter().partition(|p| p.key_field.is_some());
    let key_condition = join_parts(key_parts);
    let filter = join_parts(filter_parts);
    let method = if key_condition.is_some() {
        QueryMethod::IndexedQuery
    } else {
        QueryMethod::FullScan
    };

    let scan_index_forward = resolve_order(shape, keys, method)?;

    let mut key_fields = schema.primary_key.fields();
    key_fields.extend(keys.fields());
    let key_fields: Vec<String> = key_fields.into_iter().map(str::to_owned).collect();

    // Key attributes are always projected so a truncated page can be resumed
    // from its last item.
    let projection_expression = (!shape.columns.is_empty()).then(|| {
        let missing = key_fields.iter().filter(|k| !shape.columns.contains(k));
        shape
            .columns
            .iter()
            .chain(missing)
            .map(|c| ctx.alias(c))
            .collect::<Vec<_>>()
            .join(", ")
    });

    debug!(
        table,
        index,
        method = ?method,
        key_condition = key_condition.as_deref().unwrap_or(""),
        filter = filter.as_deref().unwrap_or(""),
        "compiled key-value query"
    );

    Ok(QueryPlan {
        method,
        native_params: KeyValueParams {
            table_name: table.to_owned(),
            index_name: index.map(str::to_owned),
            key_condition_expression: key_condition,
            filter_expression: filter,
            projection_expression,
            expression_attribute_names: ctx.names,
            expression_attribute_values: ctx.values,
            scan_index_forward,
            limit: (shape.limit > 0).then(|| i32::try_from(shape.limit).unwrap_or(i32::MAX)),
            consistent_read: Some(consistent_read),
            key_fields,
        },
    })
}

fn resolve_order(
    shape: &QueryShape,
    keys: &KeySchema,
    method: QueryMethod,
) -> QueryResult<Option<bool>> {
    let Some(first) = shape.order.first() else {
        return Ok(None);
    };
    match keys.sort_key.as_deref() {
        Some(sort_key) if sort_key == first.field => {}
        Some(sort_key) => {
            return Err(QueryError::UnsupportedOrder {
                message: format!(
                    "can only order by sort key '{sort_key}', not '{}'",
                    first.field
                ),
            });
        }
        None => {
            return Err(QueryError::UnsupportedOrder {
                message: format!("no sort key to order '{}' by", first.field),
            });
        }
    }
    if shape.order.len() > 1 {
        warn!(ignored = shape.order.len() - 1, "only the first order entry is applied");
    }
    if method == QueryMethod::FullScan {
        warn!(field = %first.field, "scan results are unordered, dropping order");
        return Ok(None);
    }
    Ok(Some(first.order == SortOrder::Asc))
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// A rendered conjunct, tagged with the key attribute it constrains when it
/// is a key-condition candidate.
struct Part {
    text: String,
    key_field: Option<String>,
    compound: bool,
}

fn join_parts(parts: Vec<Part>) -> Option<String> {
    if parts.is_empty() {
        return None;
    }
    let wrap = parts.len() > 1;
    Some(
        parts
            .into_iter()
            .map(|p| {
                if wrap && p.compound {
                    format!("({})", p.text)
                } else {
                    p.text
                }
            })
            .collect::<Vec<_>>()
            .join(" AND "),
    )
}

fn classify_chain(
    tree: &ConditionTree,
    keys: &KeySchema,
    ctx: &mut ExpressionContext<'_>,
    parts: &mut Vec<Part>,
) -> QueryResult<()> {
    for run in tree.runs() {
        if let [node] = run.as_slice() {
            match &node.kind {
                NodeKind::Predicate(p) => {
                    let seen: Vec<&Part> = parts.iter().collect();
                    let claim = key_claim(p, keys, ctx.params, &seen)?;
                    parts.push(Part {
                        text: ctx.render_predicate(p)?,
                        key_field: claim,
                        compound: false,
                    });
                }
                NodeKind::Group(group) => classify_group(group, keys, ctx, parts)?,
            }
        } else {
            parts.push(Part {
                text: ctx.render_run(&run)?,
                key_field: None,
                compound: true,
            });
        }
    }
    Ok(())
}

/// A group feeds the key condition only when it is AND-only and every leaf
/// claims a distinct, unclaimed key attribute. Otherwise it is filtered as a
/// whole.
fn classify_group(
    group: &ConditionTree,
    keys: &KeySchema,
    ctx: &mut ExpressionContext<'_>,
    parts: &mut Vec<Part>,
) -> QueryResult<()> {
    if group.is_conjunctive() {
        let leaves = group.predicates();
        let mut claimed: Vec<Part> = Vec::with_capacity(leaves.len());
        let mut eligible = true;
        for leaf in &leaves {
            let mut seen: Vec<&Part> = parts.iter().collect();
            seen.extend(claimed.iter());
            match key_claim(leaf, keys, ctx.params, &seen)? {
                Some(field) => claimed.push(Part {
                    text: String::new(),
                    key_field: Some(field),
                    compound: false,
                }),
                None => {
                    eligible = false;
                    break;
                }
            }
        }
        if eligible {
            for (leaf, part) in leaves.iter().zip(claimed.iter_mut()) {
                part.text = ctx.render_predicate(leaf)?;
            }
            parts.extend(claimed);
            return Ok(());
        }
    }
    parts.push(Part {
        text: ctx.render_chain(group)?,
        key_field: None,
        compound: !group.is_single(),
    });
    Ok(())
}

/// The key attribute `p` can constrain natively, if it is still unclaimed.
fn key_claim(
    p: &Predicate,
    keys: &KeySchema,
    params: &BoundParameters,
    seen: &[&Part],
) -> QueryResult<Option<String>> {
    if !keys.contains(&p.field) {
        return Ok(None);
    }
    let eligible = if p.field == keys.partition_key {
        p.operator == Operator::Eq
    } else if keys.sort_key.as_deref() == Some(p.field.as_str()) {
        match p.operator {
            Operator::Eq | Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => true,
            Operator::Like => matches!(
                LikePattern::classify(&string_value(p, params)?),
                LikePattern::Exact(_) | LikePattern::Prefix(_)
            ),
            _ => false,
        }
    } else {
        false
    };
    let taken = seen
        .iter()
        .any(|part| part.key_field.as_deref() == Some(p.field.as_str()));
    Ok((eligible && !taken).then(|| p.field.clone()))
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Alias and placeholder tables accumulated while rendering.
struct ExpressionContext<'a> {
    params: &'a BoundParameters,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
    literals: usize,
}

impl<'a> ExpressionContext<'a> {
    fn new(params: &'a BoundParameters) -> Self {
        Self {
            params,
            names: HashMap::new(),
            values: HashMap::new(),
            literals: 0,
        }
    }

    /// Escape a possibly dotted field path through the name alias table.
    fn alias(&mut self, field: &str) -> String {
        field
            .split('.')
            .map(|segment| self.alias_segment(segment))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Alias one path segment, reusing its existing alias and suffixing when
    /// a different name sanitizes to the same one.
    fn alias_segment(&mut self, segment: &str) -> String {
        let base = format!("#{}", sanitize(segment));
        let mut candidate = base.clone();
        let mut n = 0;
        loop {
            match self.names.get(&candidate) {
                None => {
                    self.names.insert(candidate.clone(), segment.to_owned());
                    return candidate;
                }
                Some(existing) if existing == segment => return candidate,
                Some(_) => {
                    n += 1;
                    candidate = format!("{base}_{n}");
                }
            }
        }
    }

    /// Register a value under a placeholder derived from `hint`, reusing an
    /// identical binding and suffixing on conflict.
    fn bind(&mut self, hint: &str, value: &Value) -> String {
        let value = AttributeValue::from_json(value);
        let base = format!(":{}", sanitize(hint));
        let mut candidate = base.clone();
        let mut n = 0;
        loop {
            match self.values.get(&candidate) {
                None => {
                    self.values.insert(candidate.clone(), value);
                    return candidate;
                }
                Some(existing) if *existing == value => return candidate,
                Some(_) => {
                    n += 1;
                    candidate = format!("{base}_{n}");
                }
            }
        }
    }

    fn hint(&mut self, p: &Predicate) -> String {
        match &p.value {
            Some(ValueRef::Param(name)) => name.clone(),
            _ => {
                self.literals += 1;
                format!("lit{}", self.literals)
            }
        }
    }

    fn render_predicate(&mut self, p: &Predicate) -> QueryResult<String> {
        let field = self.alias(&p.field);
        let text = match p.operator {
            Operator::Eq
            | Operator::Ne
            | Operator::Lt
            | Operator::Le
            | Operator::Gt
            | Operator::Ge => {
                let value = scalar_value(p, self.params)?;
                let hint = self.hint(p);
                let placeholder = self.bind(&hint, &value);
                let op = if p.operator == Operator::Ne {
                    "<>"
                } else {
                    p.operator.as_str()
                };
                format!("{field} {op} {placeholder}")
            }
            Operator::In | Operator::NotIn => {
                let values = list_values(p, self.params)?;
                let hint = self.hint(p);
                let placeholders = values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| self.bind(&format!("{hint}_{i}"), v))
                    .collect::<Vec<_>>()
                    .join(", ");
                if p.operator == Operator::In {
                    format!("{field} IN ({placeholders})")
                } else {
                    format!("NOT ({field} IN ({placeholders}))")
                }
            }
            Operator::Like => {
                let pattern = string_value(p, self.params)?;
                let hint = self.hint(p);
                match LikePattern::classify(&pattern) {
                    LikePattern::Exact(v) => {
                        format!("{field} = {}", self.bind(&hint, &Value::String(v)))
                    }
                    LikePattern::Prefix(v) => {
                        format!("begins_with({field}, {})", self.bind(&hint, &Value::String(v)))
                    }
                    LikePattern::Contains(v) => {
                        format!("contains({field}, {})", self.bind(&hint, &Value::String(v)))
                    }
                    LikePattern::Other(_) => {
                        return Err(QueryError::unsupported(
                            p.to_string(),
                            "only 'x%', '%x%' and wildcard-free LIKE patterns are supported",
                        ));
                    }
                }
            }
            Operator::IsNull => format!("attribute_not_exists({field})"),
            Operator::IsNotNull => format!("attribute_exists({field})"),
        };
        Ok(text)
    }

    fn render_node(&mut self, node: &ConditionNode) -> QueryResult<String> {
        match &node.kind {
            NodeKind::Predicate(p) => self.render_predicate(p),
            NodeKind::Group(group) => {
                let inner = self.render_chain(group)?;
                Ok(if group.is_single() {
                    inner
                } else {
                    format!("({inner})")
                })
            }
        }
    }

    fn render_run(&mut self, run: &[&ConditionNode]) -> QueryResult<String> {
        let members = run
            .iter()
            .map(|node| self.render_node(node))
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(members.join(" OR "))
    }

    /// Render a chain with explicit parentheses around multi-member OR-runs,
    /// since the backend binds AND tighter than OR.
    fn render_chain(&mut self, tree: &ConditionTree) -> QueryResult<String> {
        let runs = tree.runs();
        let wrap = runs.len() > 1;
        let mut rendered = Vec::with_capacity(runs.len());
        for run in &runs {
            let text = self.render_run(run)?;
            rendered.push(if wrap && run.len() > 1 {
                format!("({text})")
            } else {
                text
            });
        }
        Ok(rendered.join(" AND "))
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
