// Demo driver: parse a query, show the tree, optimize it both ways and
// report the costs. Pass a SQL string as the first argument or run with
// the built-in example.

use relopt::{OptimizationEngine, Result};

const EXAMPLE_QUERY: &str = "SELECT s.name, d.dept_name, p.project_name \
     FROM students s \
     JOIN departments d ON s.dept_id = d.id \
     JOIN projects p ON s.project_id = p.id \
     WHERE s.age > 20 AND d.budget > 100000";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let query = std::env::args().nth(1).unwrap_or_else(|| EXAMPLE_QUERY.to_string());
    let engine = OptimizationEngine::new();

    let parsed = engine.parse_query(&query)?;
    println!("Query: {}", parsed.query);
    println!("\nParsed tree:");
    engine.print_tree(&parsed);
    println!("\nOriginal cost: {:.2}", engine.get_cost(&parsed));

    let (optimized, report) = engine.optimize_query_with_report(&parsed);
    println!("\nCandidate plans:");
    for candidate in &report.candidates {
        println!("  {:20} cost {:.2}", candidate.strategy, candidate.cost);
    }
    println!("\nOptimized tree:");
    engine.print_tree(&optimized);
    println!("\nOptimized cost: {:.2}", engine.get_cost(&optimized));

    let genetic = engine.optimize_query_with_genetic_algorithm(&parsed, 10, 20, 0.30);
    println!("\nGenetic search cost: {:.2}", engine.get_cost(&genetic));

    Ok(())
}
