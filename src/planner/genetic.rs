// Genetic search over rule-application sequences
//
// A chromosome is a duplicate-free sequence of rule IDs (length 4-8);
// its fitness is the cost of the tree produced by applying the sequence
// to the original input. Evolution is elitist: the best individual
// survives each generation, the rest are bred by tournament selection,
// single-point crossover and mutation. The randomness source is
// injected so tests can seed it.

use crate::algebra::PlanNode;
use crate::cost::CostEstimator;
use crate::planner::apply_sequence;
use crate::rules::RuleId;
use crate::stats::StatisticsProvider;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const MIN_CHROMOSOME_LEN: usize = 4;
pub const MAX_CHROMOSOME_LEN: usize = 8;

/// Search parameters; the defaults match the reference setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneticConfig {
    pub population_size: usize,
    pub generations: usize,
    pub mutation_rate: f64,
    pub tournament_size: usize,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: 10,
            generations: 20,
            mutation_rate: 0.30,
            tournament_size: 3,
        }
    }
}

/// Best and average fitness of one generation.
#[derive(Debug, Clone, Copy)]
pub struct GenerationStats {
    pub generation: usize,
    pub best: f64,
    pub average: f64,
}

/// Result of a genetic run.
#[derive(Debug, Clone)]
pub struct GeneticOutcome {
    pub tree: PlanNode,
    pub cost: f64,
    /// Winning rule sequence; empty when the input tree was kept.
    pub chromosome: Vec<RuleId>,
    pub history: Vec<GenerationStats>,
}

#[derive(Clone)]
struct Individual {
    tree: PlanNode,
    fitness: f64,
    chromosome: Vec<RuleId>,
}

/// Evolve rule sequences against `tree` and return the cheapest result
/// found. The outcome never costs more than the input tree; if nothing
/// beat it, the input comes back unchanged.
pub fn evolve<S: StatisticsProvider, R: Rng>(
    tree: &PlanNode,
    cost: &CostEstimator<S>,
    config: &GeneticConfig,
    rng: &mut R,
) -> GeneticOutcome {
    let population_size = config.population_size.max(2);
    let input_cost = cost.estimate(tree);

    let mut population: Vec<Individual> = (0..population_size)
        .map(|_| {
            let chromosome = random_chromosome(rng);
            spawn(tree, cost, chromosome)
        })
        .collect();

    let mut history = Vec::with_capacity(config.generations);

    for generation in 0..config.generations {
        population.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));

        let best = population[0].fitness;
        let average =
            population.iter().map(|i| i.fitness).sum::<f64>() / population.len() as f64;
        history.push(GenerationStats {
            generation,
            best,
            average,
        });
        tracing::debug!(generation, best, average, "genetic generation scored");

        let mut next = vec![population[0].clone()];
        while next.len() < population_size {
            let parent1 = tournament(&population, config.tournament_size, rng);
            let parent2 = tournament(&population, config.tournament_size, rng);

            let (mut child1, mut child2) =
                crossover(&parent1.chromosome, &parent2.chromosome, rng);
            if rng.random::<f64>() < config.mutation_rate {
                mutate(&mut child1, rng);
            }
            if rng.random::<f64>() < config.mutation_rate {
                mutate(&mut child2, rng);
            }

            next.push(spawn(tree, cost, child1));
            if next.len() < population_size {
                next.push(spawn(tree, cost, child2));
            }
        }
        population = next;
    }

    population.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));
    let winner = population.into_iter().next().unwrap_or_else(|| Individual {
        tree: tree.clone(),
        fitness: input_cost,
        chromosome: Vec::new(),
    });

    if winner.fitness <= input_cost {
        tracing::debug!(
            cost = winner.fitness,
            chromosome = ?winner.chromosome.iter().map(|r| r.name()).collect::<Vec<_>>(),
            "genetic search finished"
        );
        GeneticOutcome {
            tree: winner.tree,
            cost: winner.fitness,
            chromosome: winner.chromosome,
            history,
        }
    } else {
        GeneticOutcome {
            tree: tree.clone(),
            cost: input_cost,
            chromosome: Vec::new(),
            history,
        }
    }
}

fn spawn<S: StatisticsProvider>(
    tree: &PlanNode,
    cost: &CostEstimator<S>,
    chromosome: Vec<RuleId>,
) -> Individual {
    let candidate = apply_sequence(tree.clone(), &chromosome);
    let fitness = cost.estimate(&candidate);
    Individual {
        tree: candidate,
        fitness,
        chromosome,
    }
}

/// A random duplicate-free rule sequence of length 4-8.
fn random_chromosome<R: Rng>(rng: &mut R) -> Vec<RuleId> {
    let mut rules = RuleId::ALL.to_vec();
    rules.shuffle(rng);
    let length = rng.random_range(MIN_CHROMOSOME_LEN..=MAX_CHROMOSOME_LEN);
    rules.truncate(length);
    rules
}

/// Pick the fittest of `size` distinct individuals.
fn tournament<'a, R: Rng>(
    population: &'a [Individual],
    size: usize,
    rng: &mut R,
) -> &'a Individual {
    let size = size.clamp(1, population.len());
    rand::seq::index::sample(rng, population.len(), size)
        .iter()
        .map(|i| &population[i])
        .min_by(|a, b| a.fitness.total_cmp(&b.fitness))
        .expect("tournament size is at least one")
}

/// Single-point crossover on the shorter parent, then de-duplication
/// preserving first occurrences.
fn crossover<R: Rng>(a: &[RuleId], b: &[RuleId], rng: &mut R) -> (Vec<RuleId>, Vec<RuleId>) {
    let min_len = a.len().min(b.len());
    if min_len <= 1 {
        return (a.to_vec(), b.to_vec());
    }
    let point = rng.random_range(1..min_len);

    let child1 = a[..point].iter().chain(&b[point..]).copied().collect();
    let child2 = b[..point].iter().chain(&a[point..]).copied().collect();
    (dedupe(child1), dedupe(child2))
}

fn dedupe(sequence: Vec<RuleId>) -> Vec<RuleId> {
    let mut out: Vec<RuleId> = Vec::with_capacity(sequence.len());
    for rule in sequence {
        if !out.contains(&rule) {
            out.push(rule);
        }
    }
    out
}

/// One of three mutations, chosen uniformly: swap two positions, delete
/// one rule, or insert an absent rule at a random position.
fn mutate<R: Rng>(sequence: &mut Vec<RuleId>, rng: &mut R) {
    if sequence.is_empty() {
        sequence.push(RuleId::ALL[rng.random_range(0..RuleId::ALL.len())]);
        return;
    }
    match rng.random_range(0..3u8) {
        0 => {
            if sequence.len() >= 2 {
                let first = rng.random_range(0..sequence.len());
                let mut second = rng.random_range(0..sequence.len() - 1);
                if second >= first {
                    second += 1;
                }
                sequence.swap(first, second);
            }
        }
        1 => {
            if sequence.len() > 1 {
                let index = rng.random_range(0..sequence.len());
                sequence.remove(index);
            }
        }
        _ => {
            if sequence.len() < MAX_CHROMOSOME_LEN {
                let absent: Vec<RuleId> = RuleId::ALL
                    .iter()
                    .copied()
                    .filter(|rule| !sequence.contains(rule))
                    .collect();
                if !absent.is_empty() {
                    let rule = absent[rng.random_range(0..absent.len())];
                    let position = rng.random_range(0..=sequence.len());
                    sequence.insert(position, rule);
                }
            }
        }
    }
}
