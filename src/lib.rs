// RelOpt - Heuristic and cost-based relational algebra query optimizer
//
// Pipeline: SQL string -> front-end -> algebra tree -> plan enumerator
// {rewrite rules + cost estimator over table statistics} -> best tree.

pub mod algebra;
pub mod condition;
pub mod cost;
pub mod engine;
pub mod error;
pub mod frontend;
pub mod planner;
pub mod rules;
pub mod stats;

pub use algebra::{PlanNode, SortKey, UpdateSpec};
pub use condition::Condition;
pub use engine::OptimizationEngine;
pub use error::{OptimizerError, Result};
pub use frontend::{parse_query, ParsedQuery};
pub use planner::genetic::GeneticConfig;
pub use stats::{StatisticsProvider, StatsCatalog, TableStatistics};
