//! Basic usage example for the mixed-anova library.
//!
//! Analyses a 2 (group, between) × 3 (session, within) design with unequal
//! group sizes and prints the source table. Run with
//! `RUST_LOG=mixed_anova=debug` to see the analysis trace.

use mixed_anova::{
    AnovaBuilder, Level, MultivariateTest, Observation, ObservationTable, SourceKind,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("Mixed ANOVA - Basic Usage Example\n");

    // (subject, group, [session 1, session 2, session 3])
    let scores = [
        (1, "control", [12.0, 13.5, 13.0]),
        (2, "control", [10.0, 11.0, 12.5]),
        (3, "control", [14.0, 14.5, 15.0]),
        (4, "control", [11.5, 12.0, 12.0]),
        (5, "training", [11.0, 14.0, 17.5]),
        (6, "training", [13.0, 16.5, 19.0]),
        (7, "training", [10.5, 13.0, 16.0]),
        (8, "training", [12.0, 15.5, 18.0]),
        (9, "training", [12.5, 14.0, 17.0]),
    ];

    let mut table = ObservationTable::new();
    for (subject, group, sessions) in scores {
        for (session, value) in (1..).zip(sessions) {
            let levels = [Level::from(group), Level::from(session)];
            table
                .push(Observation::new(subject, levels, value))
                .expect("well-formed row");
        }
    }
    println!("Observations: {}", table.len());

    let results = AnovaBuilder::new()
        .factor_names(["group", "session"])
        .multivariate_test(MultivariateTest::Rao)
        .analyze(&table)
        .expect("analysable design");

    println!();
    for factor in results.factors() {
        let kind = if factor.within_subjects {
            "within"
        } else {
            "between"
        };
        println!("  {:<8} {} levels ({kind})", factor.name, factor.level_count());
    }
    println!("  Subjects: {}", results.subject_count());
    println!();

    println!(
        "{:<14} {:>8} {:>10} {:>8} {:>8} {:>8}",
        "Source", "Kind", "SS", "df1", "df2", "F"
    );
    for r in &results {
        println!(
            "{:<14} {:>8} {:>10.3} {:>8.2} {:>8.2} {:>8.3}  p = {:.4}",
            r.label,
            r.kind.to_string(),
            r.ss,
            r.df_num,
            r.df_den,
            r.f,
            r.p
        );
        if let Some(lambda) = r.wilks_lambda {
            println!("{:<14} Wilks' Lambda = {lambda:.4}", "");
        }
        if let Some(reason) = r.degeneracy {
            println!("{:<14} degenerate: {reason}", "");
        }
    }

    // Cell means for the interaction
    if let Some(interaction) = results.iter().find(|r| r.kind == SourceKind::Mixed) {
        println!("\nCell means for {}:", interaction.label);
        for cell in &interaction.cells {
            let levels: Vec<String> = cell.levels.iter().map(ToString::to_string).collect();
            println!(
                "  ({}) mean = {:.3}, se = {:.3}, n = {}",
                levels.join(", "),
                cell.mean,
                cell.std_err,
                cell.n
            );
        }
    }
}
