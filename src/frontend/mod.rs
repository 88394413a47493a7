// SQL front-end - turns a SQL string into an algebra tree
//
// Recognises single-statement SELECT (with JOIN/ON, comma FROM, WHERE,
// ORDER BY, LIMIT) and UPDATE. Every alias reference in conditions,
// projections and sort keys is rewritten to `relation.attr` before the
// tree is built, so the rewrite rules never see an alias they cannot
// resolve. The root of a SELECT plan is always PROJECT.

use crate::algebra::{PlanNode, SortKey, UpdateSpec};
use crate::condition::Condition;
use crate::error::{OptimizerError, Result};
use regex::Regex;
use sqlparser::ast::{
    Assignment, AssignmentTarget, BinaryOperator, Expr, GroupByExpr, JoinConstraint,
    JoinOperator, LimitClause, OrderByKind, Query, SelectItem, SetExpr, Statement, TableFactor,
    TableWithJoins,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::collections::HashMap;
use std::fmt;

/// A parsed SQL query: the original text, its algebra tree, and the
/// base relations in tree order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub query: String,
    pub tree: PlanNode,
    pub tables: Vec<String>,
}

impl ParsedQuery {
    pub fn new(query: impl Into<String>, tree: PlanNode) -> Self {
        let tables = tree.tables();
        Self {
            query: query.into(),
            tree,
            tables,
        }
    }

    pub fn render(&self) -> String {
        self.tree.render()
    }
}

impl fmt::Display for ParsedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tree)
    }
}

/// Parse one SQL statement into a validated algebra tree.
pub fn parse_query(sql: &str) -> Result<ParsedQuery> {
    let mut statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|e| OptimizerError::InvalidSyntax(e.to_string()))?;
    if statements.len() != 1 {
        return Err(OptimizerError::InvalidSyntax(format!(
            "expected exactly one statement, found {}",
            statements.len()
        )));
    }

    let tree = match statements.remove(0) {
        Statement::Query(query) => build_query_tree(*query)?,
        Statement::Update {
            table,
            assignments,
            from,
            selection,
            ..
        } => {
            if from.is_some() {
                return Err(OptimizerError::InvalidSyntax(
                    "UPDATE ... FROM is not supported".to_string(),
                ));
            }
            build_update_tree(table, assignments, selection)?
        }
        other => {
            return Err(OptimizerError::InvalidSyntax(format!(
                "unsupported statement: {other}"
            )));
        }
    };

    tree.validate()?;
    Ok(ParsedQuery::new(sql, tree))
}

/// Rewrites `alias.attr` references to `relation.attr` inside rendered
/// expression text.
struct AliasResolver {
    map: HashMap<String, String>,
    patterns: Vec<(Regex, String)>,
}

impl AliasResolver {
    fn new(map: HashMap<String, String>) -> Result<Self> {
        let mut patterns = Vec::with_capacity(map.len());
        for (alias, relation) in &map {
            if alias == relation {
                continue;
            }
            let pattern = Regex::new(&format!(r"\b{}\.", regex::escape(alias)))
                .map_err(|e| OptimizerError::Internal(format!("alias pattern: {e}")))?;
            patterns.push((pattern, format!("{relation}.")));
        }
        Ok(Self { map, patterns })
    }

    fn resolve(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (pattern, replacement) in &self.patterns {
            out = pattern.replace_all(&out, replacement.as_str()).into_owned();
        }
        out
    }

    fn relation_of(&self, qualifier: &str) -> Option<&str> {
        self.map.get(qualifier).map(String::as_str)
    }
}

fn build_query_tree(query: Query) -> Result<PlanNode> {
    let Query {
        body,
        order_by,
        limit_clause,
        ..
    } = query;

    let select = match *body {
        SetExpr::Select(select) => *select,
        _ => {
            return Err(OptimizerError::InvalidSyntax(
                "only plain SELECT queries are supported".to_string(),
            ));
        }
    };

    if select.distinct.is_some() {
        return Err(OptimizerError::InvalidSyntax(
            "SELECT DISTINCT is not supported".to_string(),
        ));
    }
    if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
        if !exprs.is_empty() {
            return Err(OptimizerError::InvalidSyntax(
                "GROUP BY is not supported".to_string(),
            ));
        }
    }
    if select.having.is_some() {
        return Err(OptimizerError::InvalidSyntax(
            "HAVING is not supported".to_string(),
        ));
    }

    let resolver = AliasResolver::new(collect_aliases(&select.from)?)?;

    // FROM: explicit joins build left-deep; comma-separated items become
    // a left-deep cartesian chain.
    let mut items = select.from.iter();
    let Some(first) = items.next() else {
        return Err(OptimizerError::InvalidSyntax(
            "missing FROM clause".to_string(),
        ));
    };
    let mut tree = build_table_with_joins(first, &resolver)?;
    for item in items {
        let right = build_table_with_joins(item, &resolver)?;
        tree = PlanNode::cartesian_product(tree, right);
    }

    if let Some(selection) = &select.selection {
        tree = PlanNode::select(convert_condition(selection, &resolver), tree);
    }

    if let Some(order_by) = order_by {
        let keys = match order_by.kind {
            OrderByKind::Expressions(exprs) => exprs
                .into_iter()
                .map(|item| SortKey {
                    attribute: resolver.resolve(&item.expr.to_string()),
                    ascending: item.options.asc.unwrap_or(true),
                })
                .collect::<Vec<_>>(),
            _ => {
                return Err(OptimizerError::InvalidSyntax(
                    "unsupported ORDER BY form".to_string(),
                ));
            }
        };
        tree = PlanNode::OrderBy {
            keys,
            input: Box::new(tree),
        };
    }

    if let Some(clause) = limit_clause {
        let limit_expr = match clause {
            LimitClause::LimitOffset {
                limit,
                offset: None,
                limit_by,
            } if limit_by.is_empty() => limit,
            _ => {
                return Err(OptimizerError::InvalidSyntax(
                    "only a plain LIMIT is supported".to_string(),
                ));
            }
        };
        if let Some(expr) = limit_expr {
            let count = expr.to_string().parse::<u64>().map_err(|_| {
                OptimizerError::InvalidSyntax(format!("LIMIT must be an integer: {expr}"))
            })?;
            tree = PlanNode::Limit {
                count,
                input: Box::new(tree),
            };
        }
    }

    let attributes = convert_projection(&select.projection, &resolver)?;
    Ok(PlanNode::project(attributes, tree))
}

fn collect_aliases(from: &[TableWithJoins]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for item in from {
        collect_factor_alias(&item.relation, &mut map)?;
        for join in &item.joins {
            collect_factor_alias(&join.relation, &mut map)?;
        }
    }
    Ok(map)
}

fn collect_factor_alias(
    factor: &TableFactor,
    map: &mut HashMap<String, String>,
) -> Result<()> {
    match factor {
        TableFactor::Table { name, alias, .. } => {
            if let Some(alias) = alias {
                map.insert(alias.name.to_string(), name.to_string());
            }
            Ok(())
        }
        _ => Err(OptimizerError::InvalidSyntax(
            "only plain tables are supported in FROM".to_string(),
        )),
    }
}

fn build_table_with_joins(item: &TableWithJoins, resolver: &AliasResolver) -> Result<PlanNode> {
    let mut tree = build_table_factor(&item.relation)?;
    for join in &item.joins {
        let right = build_table_factor(&join.relation)?;
        tree = match &join.join_operator {
            JoinOperator::Join(constraint)
            | JoinOperator::Inner(constraint)
            | JoinOperator::Left(constraint)
            | JoinOperator::LeftOuter(constraint)
            | JoinOperator::Right(constraint)
            | JoinOperator::RightOuter(constraint)
            | JoinOperator::FullOuter(constraint) => match constraint {
                JoinConstraint::On(expr) => {
                    PlanNode::join(convert_condition(expr, resolver), tree, right)
                }
                JoinConstraint::Natural => PlanNode::natural_join(tree, right),
                JoinConstraint::None => PlanNode::cartesian_product(tree, right),
                JoinConstraint::Using(_) => {
                    return Err(OptimizerError::InvalidSyntax(
                        "JOIN USING is not supported".to_string(),
                    ));
                }
            },
            JoinOperator::CrossJoin(JoinConstraint::None) => {
                PlanNode::cartesian_product(tree, right)
            }
            other => {
                return Err(OptimizerError::InvalidSyntax(format!(
                    "unsupported join type: {other:?}"
                )));
            }
        };
    }
    Ok(tree)
}

fn build_table_factor(factor: &TableFactor) -> Result<PlanNode> {
    match factor {
        TableFactor::Table { name, alias, .. } => Ok(PlanNode::table(
            name.to_string(),
            alias.as_ref().map(|a| a.name.to_string()),
        )),
        _ => Err(OptimizerError::InvalidSyntax(
            "only plain tables are supported in FROM".to_string(),
        )),
    }
}

/// AND/OR structure is kept; everything else becomes a leaf with its
/// aliases resolved.
fn convert_condition(expr: &Expr, resolver: &AliasResolver) -> Condition {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => Condition::and(
            convert_condition(left, resolver),
            convert_condition(right, resolver),
        ),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Or,
            right,
        } => Condition::or(
            convert_condition(left, resolver),
            convert_condition(right, resolver),
        ),
        Expr::Nested(inner) => convert_condition(inner, resolver),
        other => Condition::leaf(resolver.resolve(&other.to_string())),
    }
}

fn convert_projection(
    projection: &[SelectItem],
    resolver: &AliasResolver,
) -> Result<Vec<String>> {
    let mut attributes = Vec::with_capacity(projection.len());
    for item in projection {
        match item {
            SelectItem::UnnamedExpr(expr) => {
                attributes.push(resolver.resolve(&expr.to_string()));
            }
            SelectItem::ExprWithAlias { expr, .. } => {
                attributes.push(resolver.resolve(&expr.to_string()));
            }
            SelectItem::Wildcard(_) => attributes.push("*".to_string()),
            SelectItem::QualifiedWildcard(kind, _) => {
                let qualifier = kind.to_string();
                let relation = resolver
                    .relation_of(&qualifier)
                    .unwrap_or(qualifier.as_str());
                attributes.push(format!("{relation}.*"));
            }
        }
    }
    if attributes.is_empty() {
        return Err(OptimizerError::InvalidSyntax(
            "empty projection list".to_string(),
        ));
    }
    Ok(attributes)
}

fn build_update_tree(
    table: TableWithJoins,
    assignments: Vec<Assignment>,
    selection: Option<Expr>,
) -> Result<PlanNode> {
    if !table.joins.is_empty() {
        return Err(OptimizerError::InvalidSyntax(
            "UPDATE with joins is not supported".to_string(),
        ));
    }
    let (relation, alias) = match &table.relation {
        TableFactor::Table { name, alias, .. } => {
            (name.to_string(), alias.as_ref().map(|a| a.name.to_string()))
        }
        _ => {
            return Err(OptimizerError::InvalidSyntax(
                "UPDATE target must be a plain table".to_string(),
            ));
        }
    };

    let mut map = HashMap::new();
    if let Some(alias) = &alias {
        map.insert(alias.clone(), relation.clone());
    }
    let resolver = AliasResolver::new(map)?;

    let mut resolved_assignments = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let column = match assignment.target {
            AssignmentTarget::ColumnName(name) => resolver.resolve(&name.to_string()),
            AssignmentTarget::Tuple(_) => {
                return Err(OptimizerError::InvalidSyntax(
                    "tuple assignments are not supported".to_string(),
                ));
            }
        };
        resolved_assignments.push((column, resolver.resolve(&assignment.value.to_string())));
    }

    let mut tree = PlanNode::table(relation.clone(), alias);
    if let Some(selection) = &selection {
        tree = PlanNode::select(convert_condition(selection, &resolver), tree);
    }
    Ok(PlanNode::Update {
        spec: UpdateSpec {
            relation,
            assignments: resolved_assignments,
        },
        input: Box::new(tree),
    })
}
