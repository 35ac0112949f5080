//! Item selection: the starting batch and the adaptive next question.
//!
//! Selection is two-phase. Domains that have not yet reached their minimum
//! sample size are served first; within the candidate pool the item with
//! maximum Fisher information at the current ability estimate wins.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::{DiagnosticSession, Question, QuestionBank};
use crate::psychometrics::fisher_information;

/// Maximum size of the starting batch.
pub const STARTING_BATCH_SIZE: usize = 5;
/// Starting questions are chosen near this difficulty.
pub const STARTING_TARGET_DIFFICULTY: f64 = 1.0;
/// Only this difficulty tier is eligible for the starting batch.
pub const STARTING_DIFFICULTY_LEVEL: u8 = 2;

/// Pick up to five opening questions: one per critical domain, then one per
/// non-critical domain to backfill. Each pick is the tier-2 item closest to
/// the target difficulty, first in catalog order on ties.
///
/// `focus_domains` limits the eligible domains; an empty slice means all.
pub fn select_starting_questions<'a>(
    bank: &'a QuestionBank,
    focus_domains: &[String],
) -> Vec<&'a Question> {
    let in_scope = |code: &str| focus_domains.is_empty() || focus_domains.iter().any(|d| d == code);

    let critical = bank
        .domains()
        .iter()
        .filter(|d| d.is_critical && in_scope(&d.code));
    let non_critical = bank
        .domains()
        .iter()
        .filter(|d| !d.is_critical && in_scope(&d.code));

    let mut picked: Vec<&Question> = Vec::with_capacity(STARTING_BATCH_SIZE);
    let mut seen = HashSet::new();

    for domain in critical.chain(non_critical) {
        if picked.len() >= STARTING_BATCH_SIZE {
            break;
        }
        if let Some(question) = closest_to_target(bank, &domain.code) {
            if seen.insert(question.id) {
                picked.push(question);
            }
        }
    }

    picked
}

fn closest_to_target<'a>(bank: &'a QuestionBank, domain: &'a str) -> Option<&'a Question> {
    let mut best: Option<(&Question, f64)> = None;
    for question in bank
        .questions_in_domain(domain)
        .filter(|q| q.difficulty_level == STARTING_DIFFICULTY_LEVEL)
    {
        let distance = (question.irt_params.difficulty - STARTING_TARGET_DIFFICULTY).abs();
        match best {
            Some((_, best_distance)) if best_distance <= distance => {}
            _ => best = Some((question, distance)),
        }
    }
    best.map(|(question, _)| question)
}

/// Coverage of one domain within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainCoverage {
    pub domain: String,
    pub answered: usize,
    pub min_required: usize,
}

impl DomainCoverage {
    pub fn is_covered(&self) -> bool {
        self.answered >= self.min_required
    }
}

/// Coverage of every in-scope domain, in catalog order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub domains: Vec<DomainCoverage>,
}

impl CoverageSummary {
    pub fn covered_count(&self) -> usize {
        self.domains.iter().filter(|d| d.is_covered()).count()
    }

    pub fn in_scope_count(&self) -> usize {
        self.domains.len()
    }

    /// Percentage of in-scope domains that reached their minimum sample.
    pub fn coverage_percent(&self) -> f64 {
        if self.domains.is_empty() {
            return 0.0;
        }
        self.covered_count() as f64 / self.in_scope_count() as f64 * 100.0
    }

    pub fn under_covered(&self) -> impl Iterator<Item = &DomainCoverage> {
        self.domains.iter().filter(|d| !d.is_covered())
    }
}

/// Per-domain coverage for a session. A domain is in scope when the session
/// may ask it and the catalog holds at least one of its questions.
pub fn domain_coverage(session: &DiagnosticSession, bank: &QuestionBank) -> CoverageSummary {
    let domains = bank
        .domains()
        .iter()
        .filter(|d| session.includes_domain(&d.code))
        .filter(|d| bank.questions_in_domain(&d.code).next().is_some())
        .map(|d| DomainCoverage {
            domain: d.code.clone(),
            answered: session
                .answered_questions
                .iter()
                .filter(|a| a.domain == d.code)
                .count(),
            min_required: d.min_required_questions(),
        })
        .collect();

    CoverageSummary { domains }
}

/// Choose the next question, or `None` when the pool is exhausted.
pub fn select_next_question<'a>(
    session: &DiagnosticSession,
    bank: &'a QuestionBank,
) -> Option<&'a Question> {
    let answered = session.answered_ids();
    let available: Vec<&Question> = bank
        .questions()
        .iter()
        .filter(|q| !answered.contains(&q.id) && session.includes_domain(&q.domain))
        .collect();

    if available.is_empty() {
        return None;
    }

    let coverage = domain_coverage(session, bank);
    let under_covered: HashSet<&str> = coverage
        .under_covered()
        .map(|d| d.domain.as_str())
        .collect();

    let restricted: Vec<&Question> = available
        .iter()
        .copied()
        .filter(|q| under_covered.contains(q.domain.as_str()))
        .collect();

    // An under-covered domain may have no unanswered items left; fall back
    // to the full pool then.
    let candidates = if restricted.is_empty() {
        available
    } else {
        restricted
    };

    most_informative(candidates, session.current_ability_estimate)
}

/// Maximum-information item; the first encountered wins ties.
pub fn most_informative<'a, I>(candidates: I, ability: f64) -> Option<&'a Question>
where
    I: IntoIterator<Item = &'a Question>,
{
    let mut best: Option<&Question> = None;
    let mut best_info = f64::NEG_INFINITY;

    for question in candidates {
        let info = fisher_information(ability, &question.irt_params);
        if info > best_info || best.is_none() {
            best_info = info;
            best = Some(question);
        }
    }

    best
}
