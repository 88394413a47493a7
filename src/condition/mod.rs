// Condition expressions - predicate trees over opaque comparison atoms
//
// A predicate is either a leaf carrying a single comparison as text
// (e.g. `employees.salary > 80000`) or an AND/OR node with exactly two
// sub-expressions. Structural equality is derived; no literal
// normalisation is performed.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Qualified attribute references of the form `relation.attr`.
static QUALIFIED_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z_][A-Za-z0-9_]*\.[A-Za-z_][A-Za-z0-9_]*").expect("valid regex")
});

static LIKE_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bLIKE\b").expect("valid regex"));

/// A boolean predicate over comparison atoms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// A single comparison, kept as text.
    Leaf(String),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

/// Comparison operator recognised inside a leaf, used by the
/// selectivity model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    Like,
}

impl Condition {
    pub fn leaf(text: impl Into<String>) -> Self {
        Condition::Leaf(text.into())
    }

    pub fn and(left: Condition, right: Condition) -> Self {
        Condition::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Condition, right: Condition) -> Self {
        Condition::Or(Box::new(left), Box::new(right))
    }

    /// In-order flattening of the AND spine. Leaves and OR sub-trees are
    /// returned as indivisible atoms.
    pub fn conjuncts(&self) -> Vec<&Condition> {
        let mut atoms = Vec::new();
        self.collect_conjuncts(&mut atoms);
        atoms
    }

    fn collect_conjuncts<'a>(&'a self, atoms: &mut Vec<&'a Condition>) {
        match self {
            Condition::And(left, right) => {
                left.collect_conjuncts(atoms);
                right.collect_conjuncts(atoms);
            }
            other => atoms.push(other),
        }
    }

    /// Rebuild a conjunction from atoms as a right-leaning AND chain.
    /// Returns `None` for an empty slice.
    pub fn conjoin(atoms: Vec<Condition>) -> Option<Condition> {
        let mut iter = atoms.into_iter().rev();
        let last = iter.next()?;
        Some(iter.fold(last, |acc, atom| Condition::and(atom, acc)))
    }

    /// Qualified `relation.attr` references in this expression, first
    /// occurrence order, deduplicated.
    pub fn attributes(&self) -> Vec<String> {
        let mut attrs = Vec::new();
        self.collect_attributes(&mut attrs);
        attrs
    }

    fn collect_attributes(&self, attrs: &mut Vec<String>) {
        match self {
            Condition::Leaf(text) => {
                for m in QUALIFIED_ATTR.find_iter(text) {
                    let found = m.as_str().to_string();
                    if !attrs.contains(&found) {
                        attrs.push(found);
                    }
                }
            }
            Condition::And(left, right) | Condition::Or(left, right) => {
                left.collect_attributes(attrs);
                right.collect_attributes(attrs);
            }
        }
    }

    /// The comparison operator of a leaf, if one is recognised. Operator
    /// nodes have no comparison.
    pub fn comparison(&self) -> Option<ComparisonOp> {
        let Condition::Leaf(text) = self else {
            return None;
        };
        if text.contains("<>") || text.contains("!=") {
            Some(ComparisonOp::Ne)
        } else if text.contains("<=") {
            Some(ComparisonOp::Le)
        } else if text.contains(">=") {
            Some(ComparisonOp::Ge)
        } else if LIKE_KEYWORD.is_match(text) {
            Some(ComparisonOp::Like)
        } else if text.contains('=') {
            Some(ComparisonOp::Eq)
        } else if text.contains('<') {
            Some(ComparisonOp::Lt)
        } else if text.contains('>') {
            Some(ComparisonOp::Gt)
        } else {
            None
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_operand(f: &mut fmt::Formatter<'_>, cond: &Condition) -> fmt::Result {
            match cond {
                Condition::Leaf(text) => write!(f, "{text}"),
                nested => write!(f, "({nested})"),
            }
        }

        match self {
            Condition::Leaf(text) => write!(f, "{text}"),
            Condition::And(left, right) => {
                write_operand(f, left)?;
                write!(f, " AND ")?;
                write_operand(f, right)
            }
            Condition::Or(left, right) => {
                write_operand(f, left)?;
                write!(f, " OR ")?;
                write_operand(f, right)
            }
        }
    }
}
