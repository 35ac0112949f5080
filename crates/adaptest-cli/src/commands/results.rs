//! The `adaptest results` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};
use uuid::Uuid;

use adaptest_core::results::DiagnosticResults;
use adaptest_report::html::{generate_html, write_html_report};

use super::open_manager;

pub async fn execute(
    session_id: Uuid,
    format: String,
    output: Option<PathBuf>,
    catalog: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (_, manager) = open_manager(catalog, config_path)?;
    let results = manager.get_results(session_id).await?;

    match (format.as_str(), &output) {
        ("json", Some(path)) => {
            results.save_json(path)?;
            eprintln!("Results saved to: {}", path.display());
        }
        ("json", None) => super::print_json(&results)?,
        ("markdown" | "md", Some(path)) => {
            std::fs::write(path, results.to_markdown())
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Markdown report: {}", path.display());
        }
        ("markdown" | "md", None) => print!("{}", results.to_markdown()),
        ("html", Some(path)) => {
            write_html_report(&results, path)?;
            eprintln!("HTML report: {}", path.display());
        }
        ("html", None) => println!("{}", generate_html(&results)),
        ("text", _) => print_summary(&results),
        (other, _) => anyhow::bail!("unknown format: {other} (expected text, json, markdown, html)"),
    }
    Ok(())
}

/// Readiness line, domain table and recommendations.
pub fn print_summary(results: &DiagnosticResults) {
    println!(
        "Readiness: {} ({}/100). {}",
        results.readiness.level, results.readiness.score, results.readiness.message
    );
    println!(
        "Ability {:.2} (SE {:.2}), {}/{} correct ({:.1}%)",
        results.final_ability,
        results.standard_error,
        results.correct_answers,
        results.total_questions,
        results.accuracy * 100.0
    );

    if !results.domains.is_empty() {
        let mut table = Table::new();
        table.set_header(vec![
            "Domain",
            "Answered",
            "Accuracy",
            "Ability",
            "Recommendation",
        ]);
        for d in &results.domains {
            let name = if d.is_critical {
                format!("{} *", d.name)
            } else {
                d.name.clone()
            };
            table.add_row(vec![
                Cell::new(name),
                Cell::new(d.result.questions_answered),
                Cell::new(format!("{:.0}%", d.result.accuracy * 100.0)),
                Cell::new(format!("{:.2}", d.result.ability_estimate)),
                Cell::new(d.result.recommendation),
            ]);
        }
        println!("\n{table}");
    }

    if !results.recommendations.is_empty() {
        println!("\nRecommendations:");
        for r in &results.recommendations {
            println!("  [{}] {} ({})", r.priority, r.message, r.resources.join(", "));
        }
    }
}
