//! The `adaptest simulate` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use comfy_table::{Cell, Table};

use adaptest_core::simulation::{
    examinee_grid, ExamineeOutcome, ProgressReporter, SimulationConfig, SimulationEngine,
    SimulationReport,
};
use adaptest_store::load_config_from;

use super::{catalog_path, load_bank, SessionLimits};

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_examinee_start(&self, _: &str) {}

    fn on_examinee_complete(&self, outcome: &ExamineeOutcome) {
        eprintln!(
            "  Done: {} true {:+.2} -> est {:+.2} in {} questions",
            outcome.examinee_id, outcome.true_ability, outcome.final_ability, outcome.questions_used
        );
    }

    fn on_examinee_error(&self, examinee_id: &str, error: &str) {
        eprintln!("  ERROR: {examinee_id}: {error}");
    }

    fn on_run_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {completed}/{total} succeeded, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(
    catalog: Option<PathBuf>,
    examinees: usize,
    parallelism: Option<usize>,
    limits: SessionLimits,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(examinees >= 1, "examinees must be at least 1");

    let config = load_config_from(config_path.as_deref())?;
    let bank = Arc::new(load_bank(&catalog_path(catalog, &config)?)?);

    let parallelism = parallelism.unwrap_or(config.parallelism);
    anyhow::ensure!(parallelism >= 1, "parallelism must be at least 1");

    let session = limits.apply(config.session.clone());
    session.validate(&bank)?;

    eprintln!(
        "adaptest v{}: simulating {examinees} examinees on {} ({} questions)\n",
        env!("CARGO_PKG_VERSION"),
        bank.name(),
        bank.len()
    );

    let engine = SimulationEngine::new(SimulationConfig {
        parallelism,
        session,
    });
    let report = engine
        .run(bank, &examinee_grid(examinees), &ConsoleReporter)
        .await?;

    print_summary(&report);

    if let Some(path) = output {
        report.save_json(&path)?;
        eprintln!("Results saved to: {}", path.display());
    }
    Ok(())
}

fn print_summary(report: &SimulationReport) {
    let mut table = Table::new();
    table.set_header(vec![
        "Examinee",
        "True θ",
        "Estimated θ",
        "SE",
        "Questions",
        "Readiness",
    ]);
    for o in &report.outcomes {
        table.add_row(vec![
            Cell::new(&o.examinee_id),
            Cell::new(format!("{:+.2}", o.true_ability)),
            Cell::new(format!("{:+.2}", o.final_ability)),
            Cell::new(format!("{:.2}", o.standard_error)),
            Cell::new(o.questions_used),
            Cell::new(o.readiness),
        ]);
    }
    println!("{table}");
    println!(
        "Mean absolute error: {:.3} | mean test length: {:.1}",
        report.mean_absolute_error, report.mean_test_length
    );
}
