// Plan enumeration - heuristic strategy ensemble
//
// Runs six fixed strategies, each a deterministic rule sequence over an
// independent copy of the input tree, scores every candidate, and keeps
// the cheapest. Ties break toward the earlier strategy. The enumerator
// never returns a plan costing more than its input.

pub mod genetic;

use crate::algebra::PlanNode;
use crate::cost::CostEstimator;
use crate::rules::RuleId;
use crate::stats::StatisticsProvider;
use RuleId::*;

/// A named, deterministic sequence of rule applications.
#[derive(Debug, Clone, Copy)]
pub struct Strategy {
    pub name: &'static str,
    pub rules: &'static [RuleId],
}

/// The fixed strategy ensemble, tried in order.
pub const STRATEGIES: [Strategy; 6] = [
    Strategy {
        name: "selection-first",
        rules: &[
            DecomposeSelections,
            SwapSelections,
            CombineSelections,
            PushProjections,
            PushSelections,
            PushProjections,
            CartesianToJoin,
            CommuteJoins,
            AssociateJoins,
        ],
    },
    Strategy {
        name: "projection-first",
        rules: &[
            PushProjections,
            PushProjections,
            DecomposeSelections,
            CombineSelections,
            PushSelections,
            CartesianToJoin,
            CommuteJoins,
            AssociateJoins,
        ],
    },
    Strategy {
        name: "balanced",
        rules: &[
            DecomposeSelections,
            SwapSelections,
            PushProjections,
            PushSelections,
            PushProjections,
            CombineSelections,
            CartesianToJoin,
            CommuteJoins,
            AssociateJoins,
        ],
    },
    Strategy {
        name: "aggressive",
        rules: &[
            DecomposeSelections,
            PushProjections,
            CombineSelections,
            DecomposeSelections,
            PushProjections,
            CombineSelections,
            PushSelections,
            PushProjections,
            CartesianToJoin,
            CommuteJoins,
            AssociateJoins,
        ],
    },
    Strategy {
        name: "conservative",
        rules: &[DecomposeSelections, CombineSelections, CartesianToJoin],
    },
    Strategy {
        name: "swap-optimized",
        rules: &[
            DecomposeSelections,
            SwapSelections,
            CombineSelections,
            PushProjections,
            PushSelections,
            PushProjections,
            CartesianToJoin,
            CommuteJoins,
            AssociateJoins,
        ],
    },
];

/// Cost of one candidate plan.
#[derive(Debug, Clone)]
pub struct CandidateReport {
    pub strategy: &'static str,
    pub cost: f64,
}

/// Outcome of one enumeration run.
#[derive(Debug, Clone)]
pub struct OptimizationReport {
    pub input_cost: f64,
    pub candidates: Vec<CandidateReport>,
    /// Index into `candidates` of the winner, or `None` when every
    /// candidate lost to the input tree.
    pub selected: Option<usize>,
}

/// Heuristic plan enumerator over an injected statistics provider.
pub struct PlanEnumerator<S> {
    cost: CostEstimator<S>,
}

impl<S: StatisticsProvider> PlanEnumerator<S> {
    pub fn new(cost: CostEstimator<S>) -> Self {
        Self { cost }
    }

    pub fn cost_estimator(&self) -> &CostEstimator<S> {
        &self.cost
    }

    /// Run every strategy over an independent copy of `tree` and return
    /// the cheapest result. When no candidate beats the input, the input
    /// comes back unchanged.
    pub fn optimize(&self, tree: &PlanNode) -> (PlanNode, OptimizationReport) {
        let input_cost = self.cost.estimate(tree);
        let expected_tables = sorted_tables(tree);

        let mut candidates = Vec::with_capacity(STRATEGIES.len());
        let mut best: Option<(usize, PlanNode, f64)> = None;

        for (index, strategy) in STRATEGIES.iter().enumerate() {
            let candidate = apply_sequence(tree.clone(), strategy.rules);

            // A rewrite that loses or duplicates a base relation is not
            // equivalence-preserving; such a candidate is discarded.
            if sorted_tables(&candidate) != expected_tables {
                tracing::warn!(
                    strategy = strategy.name,
                    "candidate dropped: base relation set changed"
                );
                continue;
            }

            let cost = self.cost.estimate(&candidate);
            tracing::debug!(strategy = strategy.name, cost, "candidate plan scored");
            candidates.push(CandidateReport {
                strategy: strategy.name,
                cost,
            });

            let beats = match &best {
                Some((_, _, best_cost)) => cost < *best_cost,
                None => true,
            };
            if beats {
                best = Some((candidates.len() - 1, candidate, cost));
            }
        }

        match best {
            Some((index, plan, cost)) if cost <= input_cost => {
                tracing::debug!(
                    strategy = candidates[index].strategy,
                    cost,
                    input_cost,
                    "plan selected"
                );
                (
                    plan,
                    OptimizationReport {
                        input_cost,
                        candidates,
                        selected: Some(index),
                    },
                )
            }
            _ => (
                tree.clone(),
                OptimizationReport {
                    input_cost,
                    candidates,
                    selected: None,
                },
            ),
        }
    }
}

/// Apply a rule sequence left to right.
pub fn apply_sequence(tree: PlanNode, rules: &[RuleId]) -> PlanNode {
    rules.iter().fold(tree, |tree, rule| rule.apply(tree))
}

fn sorted_tables(tree: &PlanNode) -> Vec<String> {
    let mut tables = tree.tables();
    tables.sort();
    tables
}
