//! Monte Carlo style calibration runs.
//!
//! Simulated examinees with a known true ability answer deterministically
//! and are driven through the real session manager, so the report shows how
//! well the adaptive loop recovers ability and how long tests run.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::model::{Question, QuestionBank, ABILITY_MAX, ABILITY_MIN};
use crate::psychometrics::probability_correct;
use crate::results::ReadinessLevel;
use crate::session::{SessionManager, SessionOptions};
use crate::store::MemorySessionStore;

/// A simulated test taker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedExaminee {
    pub id: String,
    pub true_ability: f64,
    /// Reported for every answer.
    #[serde(default = "default_response_time")]
    pub response_time_seconds: f64,
}

fn default_response_time() -> f64 {
    45.0
}

impl SimulatedExaminee {
    pub fn new(id: impl Into<String>, true_ability: f64) -> Self {
        Self {
            id: id.into(),
            true_ability,
            response_time_seconds: default_response_time(),
        }
    }

    /// Correct iff the model gives at least even odds at the true ability;
    /// otherwise the next option after the key.
    pub fn respond(&self, question: &Question) -> usize {
        if probability_correct(self.true_ability, &question.irt_params) >= 0.5 {
            question.correct_answer_index
        } else {
            (question.correct_answer_index + 1) % question.options.len().max(1)
        }
    }
}

/// `count` examinees with true abilities evenly spaced over [-3, 3].
pub fn examinee_grid(count: usize) -> Vec<SimulatedExaminee> {
    match count {
        0 => Vec::new(),
        1 => vec![SimulatedExaminee::new("sim-001", 0.0)],
        n => {
            let step = (ABILITY_MAX - ABILITY_MIN) / (n - 1) as f64;
            (0..n)
                .map(|i| {
                    SimulatedExaminee::new(format!("sim-{:03}", i + 1), ABILITY_MIN + step * i as f64)
                })
                .collect()
        }
    }
}

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Maximum concurrently simulated examinees.
    pub parallelism: usize,
    /// Options every simulated session starts with.
    pub session: SessionOptions,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            session: SessionOptions::default(),
        }
    }
}

/// Outcome for one simulated examinee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamineeOutcome {
    pub examinee_id: String,
    pub session_id: Uuid,
    pub true_ability: f64,
    pub final_ability: f64,
    pub standard_error: f64,
    pub questions_used: usize,
    pub accuracy: f64,
    pub readiness: ReadinessLevel,
    /// False when the pool ran dry before the stopping rule fired.
    pub stopped_by_rule: bool,
}

impl ExamineeOutcome {
    pub fn absolute_error(&self) -> f64 {
        (self.final_ability - self.true_ability).abs()
    }
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_examinee_start(&self, examinee_id: &str);
    fn on_examinee_complete(&self, outcome: &ExamineeOutcome);
    fn on_examinee_error(&self, examinee_id: &str, error: &str);
    fn on_run_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_examinee_start(&self, _: &str) {}
    fn on_examinee_complete(&self, _: &ExamineeOutcome) {}
    fn on_examinee_error(&self, _: &str, _: &str) {}
    fn on_run_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// Aggregate of a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub catalog: String,
    pub outcomes: Vec<ExamineeOutcome>,
    pub failed: usize,
    pub mean_absolute_error: f64,
    pub mean_test_length: f64,
    pub duration_ms: u64,
}

impl SimulationReport {
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("failed to serialize simulation report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write simulation report to {}", path.display()))?;
        Ok(())
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Drives simulated examinees through adaptive sessions.
pub struct SimulationEngine {
    config: SimulationConfig,
}

impl SimulationEngine {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Run every examinee to completion against an in-process store.
    pub async fn run(
        &self,
        bank: Arc<QuestionBank>,
        examinees: &[SimulatedExaminee],
        progress: &dyn ProgressReporter,
    ) -> Result<SimulationReport> {
        let start = Instant::now();
        let manager = Arc::new(SessionManager::new(
            Arc::clone(&bank),
            Arc::new(MemorySessionStore::new()),
        ));
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));

        tracing::info!(
            examinees = examinees.len(),
            parallelism = self.config.parallelism,
            catalog = bank.name(),
            "simulation started"
        );

        let mut futures = FuturesUnordered::new();
        for examinee in examinees {
            let manager = Arc::clone(&manager);
            let semaphore = Arc::clone(&semaphore);
            let examinee = examinee.clone();
            let options = self.config.session.clone();

            futures.push(async move {
                let id = examinee.id.clone();
                let inner = async {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| anyhow::anyhow!("semaphore closed"))?;
                    progress.on_examinee_start(&examinee.id);
                    simulate_one(&manager, &examinee, options).await
                };
                (id, inner.await)
            });
        }

        let total = futures.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut failed = 0usize;

        while let Some((examinee_id, result)) = futures.next().await {
            match result {
                Ok(outcome) => {
                    progress.on_examinee_complete(&outcome);
                    outcomes.push(outcome);
                }
                Err(e) => {
                    tracing::error!("simulation failed for {examinee_id}: {e:#}");
                    progress.on_examinee_error(&examinee_id, &format!("{e:#}"));
                    failed += 1;
                }
            }
        }

        // Completion order depends on scheduling; report in a stable order.
        outcomes.sort_by(|a, b| {
            a.true_ability
                .total_cmp(&b.true_ability)
                .then_with(|| a.examinee_id.cmp(&b.examinee_id))
        });

        let elapsed = start.elapsed();
        progress.on_run_complete(total, outcomes.len(), failed, elapsed);

        let report = SimulationReport {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            catalog: bank.name().to_string(),
            mean_absolute_error: mean(outcomes.iter().map(|o| o.absolute_error())),
            mean_test_length: mean(outcomes.iter().map(|o| o.questions_used as f64)),
            outcomes,
            failed,
            duration_ms: elapsed.as_millis() as u64,
        };

        tracing::info!(
            completed = report.outcomes.len(),
            failed,
            mae = report.mean_absolute_error,
            mean_length = report.mean_test_length,
            "simulation finished"
        );
        Ok(report)
    }
}

async fn simulate_one(
    manager: &SessionManager,
    examinee: &SimulatedExaminee,
    options: SessionOptions,
) -> Result<ExamineeOutcome> {
    let start = manager.start_session(&examinee.id, options).await?;
    let session_id = start.session.id;
    let mut queue: VecDeque<u32> = start.starting_questions.iter().map(|q| q.id).collect();
    let mut next: Option<u32> = None;
    let mut stopped_by_rule = false;

    loop {
        let Some(question_id) = queue.pop_front().or_else(|| next.take()) else {
            break;
        };
        let question = manager
            .bank()
            .question(question_id)
            .with_context(|| format!("question {question_id} vanished from the bank"))?;

        let result = manager
            .submit_answer(
                session_id,
                question_id,
                examinee.respond(question),
                examinee.response_time_seconds,
            )
            .await?;

        if result.should_complete {
            stopped_by_rule = true;
            break;
        }
        next = result.next_question.map(|q| q.id);
    }

    let results = if stopped_by_rule {
        manager.get_results(session_id).await?
    } else {
        tracing::debug!(examinee = %examinee.id, "question pool exhausted before stopping rule");
        manager.complete_session(session_id).await?
    };

    Ok(ExamineeOutcome {
        examinee_id: examinee.id.clone(),
        session_id,
        true_ability: examinee.true_ability,
        final_ability: results.final_ability,
        standard_error: results.standard_error,
        questions_used: results.total_questions,
        accuracy: results.accuracy,
        readiness: results.readiness.level,
        stopped_by_rule,
    })
}
