//! The `adaptest start`, `answer`, `complete` and `abandon` commands.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};
use uuid::Uuid;

use adaptest_core::model::{QuestionView, SessionType};

use super::{open_manager, print_json, SessionLimits};
use crate::commands::results::print_summary;

fn print_question(q: &QuestionView) {
    println!("[{}] {} (question {})", q.domain, q.stem, q.id);
    for (i, option) in q.options.iter().enumerate() {
        println!("    {i}) {option}");
    }
}

pub async fn start(
    user: String,
    session_type: String,
    focus: Option<String>,
    limits: SessionLimits,
    catalog: Option<PathBuf>,
    json: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (config, manager) = open_manager(catalog, config_path)?;

    let session_type: SessionType = session_type.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let mut options = limits.apply(config.session.clone());
    options.session_type = session_type;
    if let Some(focus) = focus {
        options.focus_domains = focus
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    let start = manager.start_session(&user, options).await?;

    if json {
        return print_json(&start);
    }

    println!("Session {} started for {}", start.session.id, user);
    println!(
        "Type: {} | min {} / max {} questions | target SE {:.2}",
        start.session.session_type,
        start.session.min_questions,
        start.session.max_questions,
        start.session.confidence_threshold
    );
    println!("\nStarting questions:");
    for q in &start.starting_questions {
        print_question(q);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn answer(
    session_id: Uuid,
    question_id: u32,
    answer: usize,
    response_time: f64,
    catalog: Option<PathBuf>,
    json: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (_, manager) = open_manager(catalog, config_path)?;
    let result = manager
        .submit_answer(session_id, question_id, answer, response_time)
        .await?;

    if json {
        return print_json(&result);
    }

    if result.is_correct {
        println!("Correct.");
    } else {
        println!(
            "Incorrect. The answer was option {}.",
            result.correct_answer_index
        );
    }
    if !result.explanation.is_empty() {
        println!("{}", result.explanation);
    }

    let p = &result.progress;
    let mut table = Table::new();
    table.set_header(vec!["Ability", "SE", "Answered", "Domains covered"]);
    table.add_row(vec![
        Cell::new(format!("{:.2}", result.current_ability)),
        Cell::new(format!("{:.2}", result.ability_standard_error)),
        Cell::new(format!("{} (min {}, max {})", p.answered, p.min_questions, p.max_questions)),
        Cell::new(format!(
            "{}/{} ({:.0}%)",
            p.domains_covered, p.domains_in_scope, p.coverage_percent
        )),
    ]);
    println!("{table}");

    if result.should_complete {
        println!("\nSession complete. Run `adaptest results --session {session_id}`.");
    } else if let Some(next) = &result.next_question {
        println!("\nNext question:");
        print_question(next);
    } else {
        println!("\nNo questions left. Run `adaptest complete --session {session_id}`.");
    }
    Ok(())
}

pub async fn complete(
    session_id: Uuid,
    catalog: Option<PathBuf>,
    json: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (_, manager) = open_manager(catalog, config_path)?;
    let results = manager.complete_session(session_id).await?;

    if json {
        return print_json(&results);
    }
    println!("Session {session_id} completed.");
    print_summary(&results);
    Ok(())
}

pub async fn abandon(
    session_id: Uuid,
    catalog: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (_, manager) = open_manager(catalog, config_path)?;
    let session = manager.abandon_session(session_id).await?;
    println!(
        "Session {} abandoned after {} answer(s).",
        session.id,
        session.total_answered()
    );
    Ok(())
}
