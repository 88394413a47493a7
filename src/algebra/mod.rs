// Algebra trees - the logical query plan
//
// Nodes are typed by operator; the payload and child count of every
// variant is fixed by its tag, so arity violations are unrepresentable.
// Trees are owned top-down with no sharing: every rewrite produces a
// fresh root and never aliases its input.

use crate::condition::Condition;
use crate::error::{OptimizerError, Result};
use std::collections::HashSet;
use std::fmt;

/// A sort key of an ORDER-BY node.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub attribute: String,
    pub ascending: bool,
}

/// The payload of an UPDATE node: target relation and `column = value`
/// assignments, both kept as resolved text.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSpec {
    pub relation: String,
    pub assignments: Vec<(String, String)>,
}

/// One node of a logical plan. Children are boxed and owned; subtree
/// identity is positional.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    /// Base relation with an optional alias from the FROM clause.
    Table {
        relation: String,
        alias: Option<String>,
    },
    /// Filter (sigma).
    Select {
        condition: Condition,
        input: Box<PlanNode>,
    },
    /// Projection (pi) over an ordered attribute list.
    Project {
        attributes: Vec<String>,
        input: Box<PlanNode>,
    },
    /// Inner theta-join.
    Join {
        condition: Condition,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
    },
    NaturalJoin {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
    },
    /// Physical hint: theta-join to be executed as a hash join.
    HashJoin {
        condition: Condition,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
    },
    CartesianProduct {
        left: Box<PlanNode>,
        right: Box<PlanNode>,
    },
    OrderBy {
        keys: Vec<SortKey>,
        input: Box<PlanNode>,
    },
    Limit {
        count: u64,
        input: Box<PlanNode>,
    },
    Update {
        spec: UpdateSpec,
        input: Box<PlanNode>,
    },
}

impl PlanNode {
    pub fn table(relation: impl Into<String>, alias: Option<String>) -> Self {
        PlanNode::Table {
            relation: relation.into(),
            alias,
        }
    }

    pub fn select(condition: Condition, input: PlanNode) -> Self {
        PlanNode::Select {
            condition,
            input: Box::new(input),
        }
    }

    pub fn project(attributes: Vec<String>, input: PlanNode) -> Self {
        PlanNode::Project {
            attributes,
            input: Box::new(input),
        }
    }

    pub fn join(condition: Condition, left: PlanNode, right: PlanNode) -> Self {
        PlanNode::Join {
            condition,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn natural_join(left: PlanNode, right: PlanNode) -> Self {
        PlanNode::NaturalJoin {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn cartesian_product(left: PlanNode, right: PlanNode) -> Self {
        PlanNode::CartesianProduct {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Operator tag as rendered by `print_tree`.
    pub fn tag(&self) -> &'static str {
        match self {
            PlanNode::Table { .. } => "TABLE",
            PlanNode::Select { .. } => "SELECT",
            PlanNode::Project { .. } => "PROJECT",
            PlanNode::Join { .. } => "JOIN",
            PlanNode::NaturalJoin { .. } => "NATURAL-JOIN",
            PlanNode::HashJoin { .. } => "HASH-JOIN",
            PlanNode::CartesianProduct { .. } => "CARTESIAN-PRODUCT",
            PlanNode::OrderBy { .. } => "ORDER-BY",
            PlanNode::Limit { .. } => "LIMIT",
            PlanNode::Update { .. } => "UPDATE",
        }
    }

    /// Direct children, left to right.
    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::Table { .. } => vec![],
            PlanNode::Select { input, .. }
            | PlanNode::Project { input, .. }
            | PlanNode::OrderBy { input, .. }
            | PlanNode::Limit { input, .. }
            | PlanNode::Update { input, .. } => vec![input],
            PlanNode::Join { left, right, .. }
            | PlanNode::NaturalJoin { left, right }
            | PlanNode::HashJoin { left, right, .. }
            | PlanNode::CartesianProduct { left, right } => vec![left, right],
        }
    }

    /// Rebuild this node with `f` applied to each direct child. Not
    /// recursive; rules drive their own traversal with it.
    pub fn map_inputs(self, f: &mut impl FnMut(PlanNode) -> PlanNode) -> PlanNode {
        match self {
            PlanNode::Table { .. } => self,
            PlanNode::Select { condition, input } => PlanNode::Select {
                condition,
                input: Box::new(f(*input)),
            },
            PlanNode::Project { attributes, input } => PlanNode::Project {
                attributes,
                input: Box::new(f(*input)),
            },
            PlanNode::Join {
                condition,
                left,
                right,
            } => PlanNode::Join {
                condition,
                left: Box::new(f(*left)),
                right: Box::new(f(*right)),
            },
            PlanNode::NaturalJoin { left, right } => PlanNode::NaturalJoin {
                left: Box::new(f(*left)),
                right: Box::new(f(*right)),
            },
            PlanNode::HashJoin {
                condition,
                left,
                right,
            } => PlanNode::HashJoin {
                condition,
                left: Box::new(f(*left)),
                right: Box::new(f(*right)),
            },
            PlanNode::CartesianProduct { left, right } => PlanNode::CartesianProduct {
                left: Box::new(f(*left)),
                right: Box::new(f(*right)),
            },
            PlanNode::OrderBy { keys, input } => PlanNode::OrderBy {
                keys,
                input: Box::new(f(*input)),
            },
            PlanNode::Limit { count, input } => PlanNode::Limit {
                count,
                input: Box::new(f(*input)),
            },
            PlanNode::Update { spec, input } => PlanNode::Update {
                spec,
                input: Box::new(f(*input)),
            },
        }
    }

    /// Base relation names in left-to-right order. A relation joined
    /// twice appears twice.
    pub fn tables(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_tables(&mut names);
        names
    }

    fn collect_tables(&self, names: &mut Vec<String>) {
        if let PlanNode::Table { relation, .. } = self {
            names.push(relation.clone());
        }
        for child in self.children() {
            child.collect_tables(names);
        }
    }

    /// Lower-cased relation names and aliases reachable in this subtree.
    /// Used to decide which side of a join an attribute qualifier names.
    pub fn name_scope(&self) -> HashSet<String> {
        let mut scope = HashSet::new();
        self.collect_scope(&mut scope);
        scope
    }

    fn collect_scope(&self, scope: &mut HashSet<String>) {
        if let PlanNode::Table { relation, alias } = self {
            scope.insert(relation.to_lowercase());
            if let Some(alias) = alias {
                scope.insert(alias.to_lowercase());
            }
        }
        for child in self.children() {
            child.collect_scope(scope);
        }
    }

    /// Value of the node as rendered by `print_tree`.
    fn value_string(&self) -> String {
        match self {
            PlanNode::Table { relation, .. } => relation.clone(),
            PlanNode::Select { condition, .. } => condition.to_string(),
            PlanNode::Project { attributes, .. } => attributes.join(", "),
            PlanNode::Join { condition, .. } | PlanNode::HashJoin { condition, .. } => {
                condition.to_string()
            }
            PlanNode::NaturalJoin { .. } | PlanNode::CartesianProduct { .. } => String::new(),
            PlanNode::OrderBy { keys, .. } => keys
                .iter()
                .map(|k| {
                    format!(
                        "{} {}",
                        k.attribute,
                        if k.ascending { "ASC" } else { "DESC" }
                    )
                })
                .collect::<Vec<_>>()
                .join(", "),
            PlanNode::Limit { count, .. } => count.to_string(),
            PlanNode::Update { spec, .. } => {
                let assigns = spec
                    .assignments
                    .iter()
                    .map(|(col, val)| format!("{col} = {val}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{} SET {assigns}", spec.relation)
            }
        }
    }

    /// Multi-line rendering; indentation shows depth, each node printed
    /// as `TAG: value`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        let value = self.value_string();
        if value.is_empty() {
            out.push_str(self.tag());
        } else {
            out.push_str(&format!("{}: {}", self.tag(), value));
        }
        out.push('\n');
        for child in self.children() {
            child.render_into(out, depth + 1);
        }
    }

    /// Structural validation: every payload the type system cannot rule
    /// out is checked here.
    pub fn validate(&self) -> Result<()> {
        match self {
            PlanNode::Table { relation, .. } if relation.is_empty() => {
                return Err(OptimizerError::Validation(
                    "table node with empty relation name".to_string(),
                ));
            }
            PlanNode::Project { attributes, .. } if attributes.is_empty() => {
                return Err(OptimizerError::Validation(
                    "projection with empty attribute list".to_string(),
                ));
            }
            PlanNode::OrderBy { keys, .. } if keys.is_empty() => {
                return Err(OptimizerError::Validation(
                    "order-by with no sort keys".to_string(),
                ));
            }
            PlanNode::Update { spec, .. } if spec.assignments.is_empty() => {
                return Err(OptimizerError::Validation(
                    "update with no assignments".to_string(),
                ));
            }
            _ => {}
        }
        for child in self.children() {
            child.validate()?;
        }
        Ok(())
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render().trim_end())
    }
}
