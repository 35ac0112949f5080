//! Readiness assessment, study recommendations and the persisted results
//! document of a diagnostic session.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    DiagnosticSession, DomainRecommendation, DomainResult, QuestionBank, SessionStatus,
    SessionType,
};

/// Overall readiness tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessLevel {
    High,
    Medium,
    Low,
}

impl fmt::Display for ReadinessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessLevel::High => write!(f, "high"),
            ReadinessLevel::Medium => write!(f, "medium"),
            ReadinessLevel::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Readiness {
    pub level: ReadinessLevel,
    /// 90, 70 or 40.
    pub score: u8,
    pub message: String,
}

/// Readiness from the overall ability estimate and accuracy.
pub fn assess_readiness(session: &DiagnosticSession) -> Readiness {
    let ability = session.current_ability_estimate;
    let accuracy = session.accuracy_rate();

    if ability >= 1.5 && accuracy >= 0.8 {
        Readiness {
            level: ReadinessLevel::High,
            score: 90,
            message: "Strong performance across the assessed domains. You are well prepared."
                .into(),
        }
    } else if ability >= 0.5 && accuracy >= 0.6 {
        Readiness {
            level: ReadinessLevel::Medium,
            score: 70,
            message: "Solid foundation. Targeted review of weaker domains is recommended.".into(),
        }
    } else {
        Readiness {
            level: ReadinessLevel::Low,
            score: 40,
            message: "Significant gaps remain. Focused study is needed before the exam.".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
        }
    }
}

/// A study recommendation for one weak domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub domain: String,
    pub domain_name: String,
    pub priority: Priority,
    pub message: String,
    pub resources: Vec<String>,
}

fn resources_for(priority: Priority) -> Vec<String> {
    let categories: &[&str] = match priority {
        Priority::High => &["textbook review", "video lectures", "practice questions"],
        Priority::Medium => &["practice questions", "flashcards"],
    };
    categories.iter().map(|c| c.to_string()).collect()
}

/// Recommendations for domains rated `study_required` or
/// `practice_recommended`, high priority first, then by domain weight
/// (heaviest first), then by domain code.
pub fn generate_recommendations(
    session: &DiagnosticSession,
    bank: &QuestionBank,
) -> Vec<Recommendation> {
    let mut ranked: Vec<(f64, Recommendation)> = session
        .domain_results
        .iter()
        .filter_map(|(code, result)| {
            let priority = match result.recommendation {
                DomainRecommendation::StudyRequired => Priority::High,
                DomainRecommendation::PracticeRecommended => Priority::Medium,
                _ => return None,
            };
            let domain = bank.domain(code);
            let domain_name = domain
                .map(|d| d.display_name().to_string())
                .unwrap_or_else(|| code.clone());
            let weight = domain.map(|d| d.weight).unwrap_or(1.0);
            let message = match priority {
                Priority::High => format!(
                    "Study {domain_name}: {:.0}% accuracy over {} questions.",
                    result.accuracy * 100.0,
                    result.questions_answered
                ),
                Priority::Medium => format!(
                    "Practice {domain_name} to consolidate ({:.0}% accuracy).",
                    result.accuracy * 100.0
                ),
            };
            Some((
                weight,
                Recommendation {
                    domain: code.clone(),
                    domain_name,
                    priority,
                    message,
                    resources: resources_for(priority),
                },
            ))
        })
        .collect();

    ranked.sort_by(|(wa, a), (wb, b)| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| wb.total_cmp(wa))
            .then_with(|| a.domain.cmp(&b.domain))
    });
    ranked.into_iter().map(|(_, r)| r).collect()
}

/// One domain's row in the results document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainSummary {
    pub code: String,
    pub name: String,
    pub is_critical: bool,
    #[serde(flatten)]
    pub result: DomainResult,
}

/// The complete outcome of a diagnostic session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticResults {
    pub session_id: Uuid,
    pub user_id: String,
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub catalog: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub final_ability: f64,
    pub standard_error: f64,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub accuracy: f64,
    /// Sorted by domain code.
    pub domains: Vec<DomainSummary>,
    pub readiness: Readiness,
    pub recommendations: Vec<Recommendation>,
    pub ability_trajectory: Vec<f64>,
}

impl DiagnosticResults {
    pub fn from_session(session: &DiagnosticSession, bank: &QuestionBank) -> Self {
        let domains = session
            .domain_results
            .iter()
            .map(|(code, result)| {
                let domain = bank.domain(code);
                DomainSummary {
                    code: code.clone(),
                    name: domain
                        .map(|d| d.display_name().to_string())
                        .unwrap_or_else(|| code.clone()),
                    is_critical: domain.is_some_and(|d| d.is_critical),
                    result: result.clone(),
                }
            })
            .collect();

        Self {
            session_id: session.id,
            user_id: session.user_id.clone(),
            session_type: session.session_type,
            status: session.status,
            catalog: session.catalog.clone(),
            started_at: session.started_at,
            completed_at: session.completed_at,
            final_ability: session.current_ability_estimate,
            standard_error: session.ability_standard_error,
            total_questions: session.total_answered(),
            correct_answers: session.correct_count(),
            accuracy: session.accuracy_rate(),
            domains,
            readiness: assess_readiness(session),
            recommendations: generate_recommendations(session, bank),
            ability_trajectory: session.ability_trajectory(),
        }
    }

    /// Save the results as pretty JSON, creating parent directories.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize results")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write results to {}", path.display()))?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read results from {}", path.display()))?;
        serde_json::from_str(&content).context("failed to parse results JSON")
    }

    /// Render a Markdown summary.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str("# Diagnostic Results\n\n");
        md.push_str(&format!("**Session:** {}\n", self.session_id));
        md.push_str(&format!("**User:** {}\n", self.user_id));
        md.push_str(&format!("**Type:** {}\n", self.session_type));
        md.push_str(&format!("**Catalog:** {}\n", self.catalog));
        md.push_str(&format!(
            "**Started:** {}\n",
            self.started_at.format("%Y-%m-%d %H:%M UTC")
        ));
        if let Some(done) = self.completed_at {
            md.push_str(&format!(
                "**Completed:** {}\n",
                done.format("%Y-%m-%d %H:%M UTC")
            ));
        }
        md.push('\n');

        md.push_str("## Summary\n\n");
        md.push_str(&format!(
            "- Readiness: **{}** ({}/100)\n",
            self.readiness.level, self.readiness.score
        ));
        md.push_str(&format!(
            "- Ability: {:.2} (SE {:.2})\n",
            self.final_ability, self.standard_error
        ));
        md.push_str(&format!(
            "- Accuracy: {}/{} ({:.1}%)\n\n",
            self.correct_answers,
            self.total_questions,
            self.accuracy * 100.0
        ));
        md.push_str(&format!("{}\n\n", self.readiness.message));

        if !self.domains.is_empty() {
            md.push_str("## Domains\n\n");
            md.push_str("| Domain | Answered | Correct | Accuracy | Ability | Recommendation |\n");
            md.push_str("|--------|----------|---------|----------|---------|----------------|\n");
            for d in &self.domains {
                let marker = if d.is_critical { " *" } else { "" };
                md.push_str(&format!(
                    "| {}{} | {} | {} | {:.0}% | {:.2} | {} |\n",
                    d.name,
                    marker,
                    d.result.questions_answered,
                    d.result.correct_answers,
                    d.result.accuracy * 100.0,
                    d.result.ability_estimate,
                    d.result.recommendation
                ));
            }
            md.push_str("\n\\* critical domain\n\n");
        }

        if !self.recommendations.is_empty() {
            md.push_str("## Recommendations\n\n");
            for r in &self.recommendations {
                md.push_str(&format!(
                    "- **[{}]** {} Resources: {}.\n",
                    r.priority,
                    r.message,
                    r.resources.join(", ")
                ));
            }
            md.push('\n');
        }

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnswerRecord;
    use crate::session::update_domain_results;
    use crate::testing::{blank_session, sample_bank};

    fn answer(question_id: u32, domain: &str, correct: bool, ability_after: f64) -> AnswerRecord {
        AnswerRecord {
            question_id,
            domain: domain.into(),
            user_answer: if correct { 0 } else { 1 },
            is_correct: correct,
            response_time_seconds: 30.0,
            ability_before: 0.0,
            ability_after,
            question_difficulty: 1.0,
            timestamp: Utc::now(),
        }
    }

    fn session_with(answers: Vec<AnswerRecord>, ability: f64) -> DiagnosticSession {
        let mut s = blank_session("user-1");
        s.domain_results = update_domain_results(&answers);
        s.answered_questions = answers;
        s.current_ability_estimate = ability;
        s.status = SessionStatus::Completed;
        s.completed_at = Some(Utc::now());
        s
    }

    #[test]
    fn readiness_tiers() {
        let all_right = (1..=5).map(|i| answer(i, "ANATOMY", true, 1.0)).collect();
        let r = assess_readiness(&session_with(all_right, 1.6));
        assert_eq!((r.level, r.score), (ReadinessLevel::High, 90));

        let mixed: Vec<_> = (1..=5)
            .map(|i| answer(i, "ANATOMY", i <= 3, 0.5))
            .collect();
        let r = assess_readiness(&session_with(mixed.clone(), 0.6));
        assert_eq!((r.level, r.score), (ReadinessLevel::Medium, 70));

        // High ability alone is not enough.
        let r = assess_readiness(&session_with(mixed, 2.0));
        assert_eq!(r.level, ReadinessLevel::Medium);

        let r = assess_readiness(&session_with(vec![], 0.0));
        assert_eq!((r.level, r.score), (ReadinessLevel::Low, 40));
    }

    #[test]
    fn recommendations_cover_weak_domains_in_priority_order() {
        let bank = sample_bank();
        let answers = vec![
            // RADIOLOGY: practice_recommended (ability 0, accuracy 0.5)
            answer(9, "RADIOLOGY", true, 0.0),
            answer(10, "RADIOLOGY", false, 0.0),
            // ETHICS: study_required
            answer(13, "ETHICS", false, -1.0),
            // ANATOMY: study_required
            answer(5, "ANATOMY", false, -1.0),
            // PHARMACOLOGY: advanced, no recommendation
            answer(1, "PHARMACOLOGY", true, 2.0),
        ];
        let session = session_with(answers, 0.0);
        let recs = generate_recommendations(&session, &bank);

        let order: Vec<(&str, Priority)> =
            recs.iter().map(|r| (r.domain.as_str(), r.priority)).collect();
        assert_eq!(
            order,
            vec![
                ("ANATOMY", Priority::High),
                ("ETHICS", Priority::High),
                ("RADIOLOGY", Priority::Medium),
            ]
        );
        assert!(recs.iter().all(|r| !r.resources.is_empty()));
    }

    #[test]
    fn heavier_domains_rank_first_within_priority() {
        let sample = sample_bank();
        let mut domains = sample.domains().to_vec();
        for d in &mut domains {
            if d.code == "ETHICS" {
                d.weight = 3.0;
            }
        }
        let weighted = crate::testing::bank(domains, sample.questions().to_vec());

        let answers = vec![
            answer(5, "ANATOMY", false, -1.0),
            answer(13, "ETHICS", false, -1.0),
        ];
        let recs = generate_recommendations(&session_with(answers, -1.0), &weighted);
        assert_eq!(recs[0].domain, "ETHICS");
        assert_eq!(recs[1].domain, "ANATOMY");
    }

    #[test]
    fn results_document_round_trips_and_renders() {
        let bank = sample_bank();
        let answers = vec![
            answer(1, "PHARMACOLOGY", true, 0.2),
            answer(5, "ANATOMY", false, 0.05),
        ];
        let session = session_with(answers, 0.05);
        let results = DiagnosticResults::from_session(&session, &bank);

        assert_eq!(results.total_questions, 2);
        assert_eq!(results.correct_answers, 1);
        assert_eq!(results.ability_trajectory.len(), 3);
        let codes: Vec<_> = results.domains.iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["ANATOMY", "PHARMACOLOGY"]);
        assert!(results.domains.iter().all(|d| d.is_critical));

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out").join("results.json");
        results.save_json(&path).unwrap();
        let loaded = DiagnosticResults::load_json(&path).unwrap();
        assert_eq!(loaded.session_id, results.session_id);
        assert_eq!(loaded.domains.len(), 2);
        assert_eq!(loaded.readiness, results.readiness);

        let md = results.to_markdown();
        assert!(md.contains("# Diagnostic Results"));
        assert!(md.contains("| Domain |"));
        assert!(md.contains("Readiness: **low**"));
    }

    #[test]
    fn load_json_reports_missing_file() {
        let err = DiagnosticResults::load_json(Path::new("/nonexistent/results.json")).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read results"));
    }
}
