// Relation statistics - per-relation counts and distinct-value maps
//
// Supplies the cost model with `(n_r, b_r, l_r, f_r, V(a, r))` per base
// relation. Relations the catalog does not know fall back to fixed
// defaults with a warning; the optimizer never fails over statistics.

use crate::error::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Statistics of one relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStatistics {
    /// Tuple count `n_r`.
    pub num_tuples: u64,
    /// Block count `b_r`.
    pub num_blocks: u64,
    /// Tuple length in bytes `l_r`.
    pub tuple_length: u64,
    /// Blocking factor `f_r` (tuples per block).
    pub blocking_factor: u64,
    /// Distinct value counts `V(a, r)` keyed by attribute name.
    pub distinct_values: HashMap<String, u64>,
}

impl TableStatistics {
    /// Build statistics, deriving what is missing: without `b_r`,
    /// `b_r = ceil(n_r / f_r)`; without both `b_r` and `f_r`, the
    /// blocking factor defaults to 100 before deriving.
    pub fn new(
        num_tuples: u64,
        tuple_length: u64,
        num_blocks: Option<u64>,
        blocking_factor: Option<u64>,
    ) -> Self {
        let (num_blocks, blocking_factor) = match (num_blocks, blocking_factor) {
            (Some(b), Some(f)) => (b, f),
            (None, Some(f)) => (num_tuples.div_ceil(f.max(1)), f),
            (None, None) => (num_tuples.div_ceil(100), 100),
            (Some(b), None) => (b, if b > 0 { num_tuples.div_ceil(b) } else { 1 }),
        };
        Self {
            num_tuples,
            num_blocks,
            tuple_length,
            blocking_factor,
            distinct_values: HashMap::new(),
        }
    }

    pub fn with_distinct(mut self, attribute: impl Into<String>, count: u64) -> Self {
        self.distinct_values.insert(attribute.into(), count);
        self
    }

    /// `V(a, r)`, falling back to `n_r / 10` when the attribute has no
    /// recorded histogram.
    pub fn distinct(&self, attribute: &str) -> u64 {
        self.distinct_values
            .get(attribute)
            .copied()
            .unwrap_or_else(|| (self.num_tuples / 10).max(1))
    }
}

impl Default for TableStatistics {
    /// Defaults used for relations the provider does not know:
    /// `(n_r, b_r, l_r, f_r) = (1000, 10, 100, 100)`, no histograms.
    fn default() -> Self {
        Self {
            num_tuples: 1000,
            num_blocks: 10,
            tuple_length: 100,
            blocking_factor: 100,
            distinct_values: HashMap::new(),
        }
    }
}

/// Read-only statistics lookup consumed by the cost estimator. Must be
/// total: unknown relations yield defaults, never an error.
pub trait StatisticsProvider {
    fn get_table_statistics(&self, relation: &str) -> TableStatistics;

    /// Whether the provider has real statistics for `relation` (as
    /// opposed to serving defaults).
    fn has_statistics(&self, relation: &str) -> bool;
}

/// On-disk statistics shape produced by the storage engine: `b_r` and
/// `f_r` may be absent and are then derived.
#[derive(Debug, Deserialize)]
struct RawStatistics {
    n_r: u64,
    l_r: u64,
    b_r: Option<u64>,
    f_r: Option<u64>,
    #[serde(default)]
    distinct_values: HashMap<String, u64>,
}

/// In-memory statistics catalog.
#[derive(Clone, Default)]
pub struct StatsCatalog {
    relations: Arc<RwLock<HashMap<String, TableStatistics>>>,
}

impl StatsCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, relation: impl Into<String>, stats: TableStatistics) {
        self.relations.write().insert(relation.into(), stats);
    }

    /// Record `V(a, r)` for an attribute of an already registered
    /// relation. Unknown relations are ignored.
    pub fn add_distinct_values(&self, relation: &str, attribute: &str, count: u64) {
        if let Some(stats) = self.relations.write().get_mut(relation) {
            stats
                .distinct_values
                .insert(attribute.to_string(), count);
        }
    }

    /// Load a statistics file: a JSON object keyed by relation name with
    /// `{n_r, l_r, b_r?, f_r?, distinct_values?}` values.
    pub fn load_json(&self, path: impl AsRef<Path>) -> Result<usize> {
        let text = std::fs::read_to_string(path)?;
        let raw: HashMap<String, RawStatistics> = serde_json::from_str(&text)?;
        let count = raw.len();

        let mut relations = self.relations.write();
        for (name, entry) in raw {
            let mut stats =
                TableStatistics::new(entry.n_r, entry.l_r, entry.b_r, entry.f_r);
            stats.distinct_values = entry.distinct_values;
            relations.insert(name, stats);
        }
        Ok(count)
    }

    pub fn relation_names(&self) -> Vec<String> {
        self.relations.read().keys().cloned().collect()
    }
}

impl StatisticsProvider for StatsCatalog {
    fn get_table_statistics(&self, relation: &str) -> TableStatistics {
        match self.relations.read().get(relation) {
            Some(stats) => stats.clone(),
            None => {
                tracing::warn!(relation, "no statistics recorded, using defaults");
                TableStatistics::default()
            }
        }
    }

    fn has_statistics(&self, relation: &str) -> bool {
        self.relations.read().contains_key(relation)
    }
}
