//! Sizes the nominal two-bar truss and a few variants.
//!
//! Run with: RUST_LOG=debug cargo run --example size_truss

use trussopt::prelude::*;
use tracing_subscriber::EnvFilter;

fn report(title: &str, config: &TrussConfig) -> OptimizerResult<()> {
    println!("{title}");
    println!("{}", "-".repeat(title.len()));

    let mut history = HistoryRecorder::new();
    let design = size_truss_with_callback(config, &SqpConfig::default(), &mut history)?;

    for record in &history.records {
        println!(
            "  iter {:>2}  H = {:>9.5}  d = {:>7.5}  cost = {:>9.5}  viol = {:.2e}",
            record.iteration, record.point[0], record.point[1], record.objective, record.max_violation
        );
    }
    println!("{design}\n");
    Ok(())
}

fn main() -> OptimizerResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    println!("Two-bar truss sizing");
    println!("====================\n");

    report("Nominal design from (30, 3)", &TrussConfig::default())?;
    report(
        "Nominal design from (10, 1)",
        &TrussConfig::default().with_start(10.0, 1.0),
    )?;
    report(
        "Height fixed at 20",
        &TrussConfig::default().with_fixed_height(20.0),
    )?;
    report(
        "Diameter fixed at 2",
        &TrussConfig::default().with_fixed_diameter(2.0),
    )?;

    let heavier = TrussParameters::default().with_load(99.0);
    report(
        "Load raised to 99 kips",
        &TrussConfig::default().with_parameters(heavier),
    )?;

    Ok(())
}
