// Cost estimation - scores an algebra tree bottom-up
//
// Cost is a dimensionless score. Base relations cost their block count;
// every other operator combines child costs with a fixed formula. A
// selectivity model over condition trees scales SELECT costs, with a
// distinct-value refinement for equality atoms when `V(a, r)` is known.

use crate::algebra::PlanNode;
use crate::condition::{ComparisonOp, Condition};
use crate::stats::StatisticsProvider;

/// Baseline selectivity per recognised comparison; unrecognised leaves
/// fall back to 0.5.
pub fn baseline_selectivity(op: Option<ComparisonOp>) -> f64 {
    match op {
        Some(ComparisonOp::Eq) => 0.10,
        Some(ComparisonOp::Ne) => 0.90,
        Some(ComparisonOp::Le) | Some(ComparisonOp::Ge) => 0.40,
        Some(ComparisonOp::Lt) | Some(ComparisonOp::Gt) => 0.30,
        Some(ComparisonOp::Like) => 0.20,
        None => 0.50,
    }
}

/// Recursive cost estimator over an injected statistics provider.
pub struct CostEstimator<S> {
    stats: S,
}

impl<S: StatisticsProvider> CostEstimator<S> {
    pub fn new(stats: S) -> Self {
        Self { stats }
    }

    /// Cost of the whole tree rooted at `node`.
    pub fn estimate(&self, node: &PlanNode) -> f64 {
        match node {
            PlanNode::Table { relation, .. } => {
                self.stats.get_table_statistics(relation).num_blocks as f64
            }
            PlanNode::Select { condition, input } => {
                self.estimate(input) * self.selectivity(condition)
            }
            PlanNode::Project { input, .. } => self.estimate(input) * 1.10,
            PlanNode::Join { left, right, .. } => {
                // Nested-loop: product plus half the scan of both sides.
                let left = self.estimate(left);
                let right = self.estimate(right);
                left * right + 0.5 * (left + right)
            }
            PlanNode::NaturalJoin { left, right } => {
                // Sort-merge.
                (self.estimate(left) + self.estimate(right)) * 1.30
            }
            PlanNode::HashJoin { left, right, .. } => {
                (self.estimate(left) + self.estimate(right)) * 1.20
            }
            PlanNode::CartesianProduct { left, right } => {
                self.estimate(left) * self.estimate(right)
            }
            PlanNode::OrderBy { input, .. } => {
                let child = self.estimate(input);
                let tuples = child * 100.0;
                child + tuples * tuples.max(1.0).log2()
            }
            PlanNode::Limit { count, input } => {
                self.estimate(input) * (*count as f64 / 1000.0).min(1.0)
            }
            PlanNode::Update { input, .. } => self.estimate(input) * 2.50,
        }
    }

    /// Selectivity of a condition tree in [0, 1]. AND multiplies under
    /// an independence assumption; OR is inclusion-exclusion.
    pub fn selectivity(&self, condition: &Condition) -> f64 {
        match condition {
            Condition::Leaf(_) => self.leaf_selectivity(condition),
            Condition::And(left, right) => self.selectivity(left) * self.selectivity(right),
            Condition::Or(left, right) => {
                let l = self.selectivity(left);
                let r = self.selectivity(right);
                l + r - l * r
            }
        }
    }

    fn leaf_selectivity(&self, leaf: &Condition) -> f64 {
        let op = leaf.comparison();

        // Equality on a single resolvable attribute with a recorded
        // histogram: 1 / V(a, r). Everything else uses the baseline.
        if op == Some(ComparisonOp::Eq) {
            let attrs = leaf.attributes();
            if let [attr] = attrs.as_slice() {
                if let Some((relation, column)) = attr.split_once('.') {
                    if self.stats.has_statistics(relation) {
                        let stats = self.stats.get_table_statistics(relation);
                        if let Some(&v) = stats.distinct_values.get(column) {
                            if v > 0 {
                                return 1.0 / v as f64;
                            }
                        }
                    }
                }
            }
        }

        baseline_selectivity(op)
    }
}
