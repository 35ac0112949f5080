//! Core data model types for adaptest.
//!
//! The question catalog is immutable reference data; `DiagnosticSession` is
//! the only mutable record and is written exclusively by the session manager.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of answer options every question carries.
pub const OPTION_COUNT: usize = 5;

/// Lower bound of the ability (theta) scale.
pub const ABILITY_MIN: f64 = -3.0;
/// Upper bound of the ability (theta) scale.
pub const ABILITY_MAX: f64 = 3.0;

/// 3PL item parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrtParams {
    /// Location `b`, documented range [0, 2].
    pub difficulty: f64,
    /// Slope `a`, documented range [1, 3].
    pub discrimination: f64,
    /// Lower asymptote `c`, documented range [0.1, 0.3].
    pub guessing: f64,
}

/// A calibrated multiple-choice item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier within the catalog.
    pub id: u32,
    /// Domain code this question belongs to.
    pub domain: String,
    /// Question text.
    #[serde(default)]
    pub stem: String,
    /// Answer options, exactly five in a valid catalog.
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub correct_answer_index: usize,
    /// Shown to the examinee after answering.
    #[serde(default)]
    pub explanation: String,
    /// Calibrated IRT parameters.
    pub irt_params: IrtParams,
    /// Coarse tier (1-3), only used to pick starting questions.
    #[serde(default = "default_difficulty_level")]
    pub difficulty_level: u8,
}

fn default_difficulty_level() -> u8 {
    2
}

impl Question {
    /// The examinee-facing view, without the answer key.
    pub fn to_view(&self) -> QuestionView {
        QuestionView {
            id: self.id,
            domain: self.domain.clone(),
            stem: self.stem.clone(),
            options: self.options.clone(),
            difficulty_level: self.difficulty_level,
        }
    }
}

/// A question as presented to the examinee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: u32,
    pub domain: String,
    pub stem: String,
    pub options: Vec<String>,
    pub difficulty_level: u8,
}

/// A content area of the exam blueprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    /// Short code, e.g. `PHARMACOLOGY`.
    pub code: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Relative importance on the exam.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Critical domains must be sampled early and more often.
    #[serde(default)]
    pub is_critical: bool,
}

fn default_weight() -> f64 {
    1.0
}

impl Domain {
    /// Minimum number of answers before the domain counts as covered.
    pub fn min_required_questions(&self) -> usize {
        if self.is_critical {
            3
        } else {
            1
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.code
        } else {
            &self.name
        }
    }
}

/// The on-disk catalog shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub domains: Vec<Domain>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// Immutable, indexed question catalog shared by the selector and the
/// session manager.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    name: String,
    version: String,
    domains: Vec<Domain>,
    questions: Vec<Question>,
    question_index: HashMap<u32, usize>,
    domain_index: HashMap<String, usize>,
}

impl QuestionBank {
    /// Index a catalog. Fails on duplicate question ids, duplicate domain
    /// codes, questions that reference an unknown domain, and items the
    /// scoring model cannot use (see [`check_scorable`]). Documented-range
    /// violations are left to `parser::validate_catalog` as warnings.
    pub fn new(catalog: Catalog) -> Result<Self> {
        let mut domain_index = HashMap::with_capacity(catalog.domains.len());
        for (i, domain) in catalog.domains.iter().enumerate() {
            if domain_index.insert(domain.code.clone(), i).is_some() {
                anyhow::bail!("duplicate domain code: {}", domain.code);
            }
        }

        let mut question_index = HashMap::with_capacity(catalog.questions.len());
        for (i, question) in catalog.questions.iter().enumerate() {
            if !domain_index.contains_key(&question.domain) {
                anyhow::bail!(
                    "question {} references unknown domain: {}",
                    question.id,
                    question.domain
                );
            }
            if question_index.insert(question.id, i).is_some() {
                anyhow::bail!("duplicate question id: {}", question.id);
            }
            check_scorable(question)?;
        }

        Ok(Self {
            name: catalog.name,
            version: catalog.version,
            domains: catalog.domains,
            questions: catalog.questions,
            question_index,
            domain_index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// All questions in catalog order.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// All domains in catalog order.
    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    pub fn question(&self, id: u32) -> Option<&Question> {
        self.question_index.get(&id).map(|&i| &self.questions[i])
    }

    pub fn domain(&self, code: &str) -> Option<&Domain> {
        self.domain_index.get(code).map(|&i| &self.domains[i])
    }

    pub fn critical_domains(&self) -> impl Iterator<Item = &Domain> {
        self.domains.iter().filter(|d| d.is_critical)
    }

    pub fn questions_in_domain<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a Question> {
        self.questions.iter().filter(move |q| q.domain == code)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Hard requirements on a single item: finite parameters, positive
/// discrimination, guessing in [0, 1), exactly [`OPTION_COUNT`] options and
/// an answer key that points at one of them.
pub fn check_scorable(question: &Question) -> Result<()> {
    let id = question.id;
    let IrtParams {
        difficulty,
        discrimination,
        guessing,
    } = question.irt_params;

    if !(difficulty.is_finite() && discrimination.is_finite() && guessing.is_finite()) {
        anyhow::bail!("question {id}: IRT parameters must be finite");
    }
    if discrimination <= 0.0 {
        anyhow::bail!("question {id}: discrimination {discrimination} must be positive");
    }
    if !(0.0..1.0).contains(&guessing) {
        anyhow::bail!("question {id}: guessing {guessing} must be in [0, 1)");
    }
    if question.options.len() != OPTION_COUNT {
        anyhow::bail!(
            "question {id}: has {} options, expected {OPTION_COUNT}",
            question.options.len()
        );
    }
    if question.correct_answer_index >= question.options.len() {
        anyhow::bail!(
            "question {id}: correct_answer_index {} is out of range",
            question.correct_answer_index
        );
    }
    Ok(())
}

/// Kind of diagnostic session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    FullDiagnostic,
    DomainSpecific,
    AdaptivePractice,
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionType::FullDiagnostic => write!(f, "full_diagnostic"),
            SessionType::DomainSpecific => write!(f, "domain_specific"),
            SessionType::AdaptivePractice => write!(f, "adaptive_practice"),
        }
    }
}

impl FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "full_diagnostic" | "full" => Ok(SessionType::FullDiagnostic),
            "domain_specific" | "domain" => Ok(SessionType::DomainSpecific),
            "adaptive_practice" | "practice" => Ok(SessionType::AdaptivePractice),
            other => Err(format!("unknown session type: {other}")),
        }
    }
}

/// Lifecycle status. `Completed` and `Abandoned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::InProgress => write!(f, "in_progress"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Per-domain study recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainRecommendation {
    Advanced,
    Proficient,
    PracticeRecommended,
    StudyRequired,
}

impl fmt::Display for DomainRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainRecommendation::Advanced => write!(f, "advanced"),
            DomainRecommendation::Proficient => write!(f, "proficient"),
            DomainRecommendation::PracticeRecommended => write!(f, "practice_recommended"),
            DomainRecommendation::StudyRequired => write!(f, "study_required"),
        }
    }
}

/// One answered item, in presentation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: u32,
    pub domain: String,
    pub user_answer: usize,
    pub is_correct: bool,
    pub response_time_seconds: f64,
    pub ability_before: f64,
    pub ability_after: f64,
    pub question_difficulty: f64,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate over one domain's answers. Always derived from the answer
/// history, never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainResult {
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub accuracy: f64,
    pub avg_difficulty: f64,
    pub ability_estimate: f64,
    pub confidence_interval: f64,
    pub recommendation: DomainRecommendation,
}

/// A user's adaptive diagnostic session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticSession {
    pub id: Uuid,
    pub user_id: String,
    pub session_type: SessionType,
    /// Name of the catalog the session was started against.
    #[serde(default)]
    pub catalog: String,
    #[serde(default)]
    pub catalog_version: String,
    /// Domains a domain-specific session is limited to.
    #[serde(default)]
    pub focus_domains: Vec<String>,
    pub current_ability_estimate: f64,
    pub ability_standard_error: f64,
    #[serde(default)]
    pub answered_questions: Vec<AnswerRecord>,
    #[serde(default)]
    pub domain_results: BTreeMap<String, DomainResult>,
    pub status: SessionStatus,
    pub max_questions: u32,
    pub min_questions: u32,
    pub confidence_threshold: f64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl DiagnosticSession {
    pub fn total_answered(&self) -> usize {
        self.answered_questions.len()
    }

    pub fn correct_count(&self) -> usize {
        self.answered_questions.iter().filter(|a| a.is_correct).count()
    }

    /// Fraction of answers that were correct; 0 before the first answer.
    pub fn accuracy_rate(&self) -> f64 {
        if self.answered_questions.is_empty() {
            0.0
        } else {
            self.correct_count() as f64 / self.total_answered() as f64
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::InProgress
    }

    pub fn has_answered(&self, question_id: u32) -> bool {
        self.answered_questions
            .iter()
            .any(|a| a.question_id == question_id)
    }

    pub fn answered_ids(&self) -> HashSet<u32> {
        self.answered_questions.iter().map(|a| a.question_id).collect()
    }

    /// Whether questions of `domain` may be asked in this session.
    pub fn includes_domain(&self, domain: &str) -> bool {
        self.focus_domains.is_empty() || self.focus_domains.iter().any(|d| d == domain)
    }

    /// Ability after each answer, starting with the initial estimate.
    pub fn ability_trajectory(&self) -> Vec<f64> {
        let mut trajectory = Vec::with_capacity(self.answered_questions.len() + 1);
        trajectory.push(
            self.answered_questions
                .first()
                .map(|a| a.ability_before)
                .unwrap_or(self.current_ability_estimate),
        );
        trajectory.extend(self.answered_questions.iter().map(|a| a.ability_after));
        trajectory
    }
}
