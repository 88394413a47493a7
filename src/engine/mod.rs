// Optimization engine - the public facade
//
// Wires the front-end, the statistics catalog, the cost estimator and
// the plan enumerator together. Parsing and validation errors propagate
// to the caller; optimization itself never fails, it returns the input
// plan when nothing cheaper is found.

use crate::cost::CostEstimator;
use crate::error::Result;
use crate::frontend::{self, ParsedQuery};
use crate::planner::genetic::{self, GeneticConfig};
use crate::planner::{OptimizationReport, PlanEnumerator};
use crate::stats::StatsCatalog;
use rand::Rng;

/// Query optimizer over an injected statistics catalog.
pub struct OptimizationEngine {
    stats: StatsCatalog,
}

impl OptimizationEngine {
    pub fn new() -> Self {
        Self {
            stats: StatsCatalog::new(),
        }
    }

    pub fn with_statistics(stats: StatsCatalog) -> Self {
        Self { stats }
    }

    pub fn statistics(&self) -> &StatsCatalog {
        &self.stats
    }

    /// Parse a SQL string into a validated algebra tree.
    pub fn parse_query(&self, sql: &str) -> Result<ParsedQuery> {
        frontend::parse_query(sql)
    }

    /// Run the heuristic strategy ensemble and keep the cheapest plan.
    pub fn optimize_query(&self, parsed: &ParsedQuery) -> ParsedQuery {
        self.optimize_query_with_report(parsed).0
    }

    /// Same as [`optimize_query`](Self::optimize_query) but also returns
    /// the per-strategy cost report.
    pub fn optimize_query_with_report(
        &self,
        parsed: &ParsedQuery,
    ) -> (ParsedQuery, OptimizationReport) {
        let enumerator = PlanEnumerator::new(self.cost_estimator());
        let (tree, report) = enumerator.optimize(&parsed.tree);
        (ParsedQuery::new(parsed.query.clone(), tree), report)
    }

    /// Optimize by genetic search over rule sequences, seeded from the
    /// thread RNG.
    pub fn optimize_query_with_genetic_algorithm(
        &self,
        parsed: &ParsedQuery,
        population_size: usize,
        generations: usize,
        mutation_rate: f64,
    ) -> ParsedQuery {
        let config = GeneticConfig {
            population_size,
            generations,
            mutation_rate,
            ..GeneticConfig::default()
        };
        self.optimize_query_genetic(parsed, &config, &mut rand::rng())
    }

    /// Genetic search with an injected configuration and randomness
    /// source; tests pass a seeded RNG for reproducibility.
    pub fn optimize_query_genetic<R: Rng>(
        &self,
        parsed: &ParsedQuery,
        config: &GeneticConfig,
        rng: &mut R,
    ) -> ParsedQuery {
        let cost = self.cost_estimator();
        let outcome = genetic::evolve(&parsed.tree, &cost, config, rng);
        ParsedQuery::new(parsed.query.clone(), outcome.tree)
    }

    /// Cost of a parsed query under the engine's statistics.
    pub fn get_cost(&self, parsed: &ParsedQuery) -> f64 {
        self.cost_estimator().estimate(&parsed.tree)
    }

    /// Print the algebra tree; indentation shows depth, each node as
    /// `TAG: value`.
    pub fn print_tree(&self, parsed: &ParsedQuery) {
        print!("{}", parsed.render());
    }

    fn cost_estimator(&self) -> CostEstimator<StatsCatalog> {
        CostEstimator::new(self.stats.clone())
    }
}

impl Default for OptimizationEngine {
    fn default() -> Self {
        Self::new()
    }
}
