//! Diagnostic session lifecycle.
//!
//! `SessionManager` is the only writer of `DiagnosticSession` state. Writes
//! to one session are serialized through a per-session lock; session starts
//! are serialized per user so the one-active-session rule holds under
//! concurrency. Different sessions never contend.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::{DiagnosticError, DiagnosticResult};
use crate::model::{
    AnswerRecord, DiagnosticSession, DomainRecommendation, DomainResult, QuestionBank,
    QuestionView, SessionStatus, SessionType,
};
use crate::psychometrics::{standard_error, update_ability};
use crate::results::DiagnosticResults;
use crate::selector::{domain_coverage, select_next_question, select_starting_questions};
use crate::store::SessionStore;

/// Domain coverage (percent) at which a session may stop early.
pub const COVERAGE_STOP_PERCENT: f64 = 80.0;

/// Parameters fixed when a session starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOptions {
    #[serde(default = "default_session_type")]
    pub session_type: SessionType,
    /// Hard ceiling on answered questions.
    #[serde(default = "default_max_questions")]
    pub max_questions: u32,
    /// Hard floor; no stopping rule fires below it.
    #[serde(default = "default_min_questions")]
    pub min_questions: u32,
    /// Stop once the ability standard error is at or below this.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Domains a domain-specific session is limited to.
    #[serde(default)]
    pub focus_domains: Vec<String>,
}

fn default_session_type() -> SessionType {
    SessionType::FullDiagnostic
}
fn default_max_questions() -> u32 {
    50
}
fn default_min_questions() -> u32 {
    10
}
fn default_confidence_threshold() -> f64 {
    0.3
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            session_type: default_session_type(),
            max_questions: default_max_questions(),
            min_questions: default_min_questions(),
            confidence_threshold: default_confidence_threshold(),
            focus_domains: Vec::new(),
        }
    }
}

impl SessionOptions {
    /// Check the stopping parameters and focus domains against the bank.
    pub fn validate(&self, bank: &QuestionBank) -> DiagnosticResult<()> {
        if self.min_questions == 0 {
            return Err(DiagnosticError::Validation(
                "min_questions must be at least 1".into(),
            ));
        }
        if self.min_questions > self.max_questions {
            return Err(DiagnosticError::Validation(format!(
                "min_questions ({}) exceeds max_questions ({})",
                self.min_questions, self.max_questions
            )));
        }
        if !self.confidence_threshold.is_finite() || self.confidence_threshold <= 0.0 {
            return Err(DiagnosticError::Validation(
                "confidence_threshold must be a positive number".into(),
            ));
        }
        if let Some(unknown) = self
            .focus_domains
            .iter()
            .find(|code| bank.domain(code).is_none())
        {
            return Err(DiagnosticError::Validation(format!(
                "unknown focus domain: {unknown}"
            )));
        }
        if self.session_type == SessionType::DomainSpecific && self.focus_domains.is_empty() {
            return Err(DiagnosticError::Validation(
                "domain_specific sessions need at least one focus domain".into(),
            ));
        }
        Ok(())
    }
}

/// A freshly started session and its opening questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStart {
    pub session: DiagnosticSession,
    pub starting_questions: Vec<QuestionView>,
}

/// Where a session stands after an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub answered: usize,
    pub min_questions: u32,
    pub max_questions: u32,
    pub percent_complete: f64,
    pub domains_covered: usize,
    pub domains_in_scope: usize,
    pub coverage_percent: f64,
}

/// Outcome of one submitted answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResult {
    pub is_correct: bool,
    pub correct_answer_index: usize,
    pub explanation: String,
    pub current_ability: f64,
    pub ability_standard_error: f64,
    /// `1 - SE`, clamped to [0, 1].
    pub ability_confidence: f64,
    /// `None` when the pool is exhausted or the session just completed.
    pub next_question: Option<QuestionView>,
    pub progress: Progress,
    pub should_complete: bool,
    pub session_status: SessionStatus,
}

/// Stopping rule, in precedence order: minimum floor, maximum ceiling,
/// precision reached, breadth reached.
pub fn should_complete_session(session: &DiagnosticSession, coverage_percent: f64) -> bool {
    let answered = session.total_answered();
    if answered < session.min_questions as usize {
        return false;
    }
    if answered >= session.max_questions as usize {
        return true;
    }
    if session.ability_standard_error <= session.confidence_threshold {
        return true;
    }
    coverage_percent >= COVERAGE_STOP_PERCENT
}

/// Weight of one answer in the domain ability average. Slow answers count
/// for less: 1 / (1 + t/60).
pub fn response_time_weight(response_time_seconds: f64) -> f64 {
    1.0 / (1.0 + response_time_seconds / 60.0)
}

/// Recommendation tier for an (ability, accuracy) pair.
pub fn domain_recommendation(ability: f64, accuracy: f64) -> DomainRecommendation {
    if ability >= 1.5 && accuracy >= 0.8 {
        DomainRecommendation::Advanced
    } else if ability >= 0.5 && accuracy >= 0.6 {
        DomainRecommendation::Proficient
    } else if ability >= -0.5 && accuracy >= 0.4 {
        DomainRecommendation::PracticeRecommended
    } else {
        DomainRecommendation::StudyRequired
    }
}

/// Rebuild every domain aggregate from the answer history. The output is a
/// pure function of `answers`.
pub fn update_domain_results(answers: &[AnswerRecord]) -> BTreeMap<String, DomainResult> {
    let mut grouped: BTreeMap<&str, Vec<&AnswerRecord>> = BTreeMap::new();
    for answer in answers {
        grouped.entry(answer.domain.as_str()).or_default().push(answer);
    }

    grouped
        .into_iter()
        .map(|(domain, records)| {
            let n = records.len();
            let correct = records.iter().filter(|r| r.is_correct).count();
            let accuracy = correct as f64 / n as f64;
            let avg_difficulty =
                records.iter().map(|r| r.question_difficulty).sum::<f64>() / n as f64;

            let (weighted, total_weight) = records.iter().fold((0.0, 0.0), |(sum, w), r| {
                let weight = response_time_weight(r.response_time_seconds);
                (sum + r.ability_after * weight, w + weight)
            });
            let ability = if total_weight > 0.0 {
                weighted / total_weight
            } else {
                0.0
            };

            let result = DomainResult {
                questions_answered: n as u32,
                correct_answers: correct as u32,
                accuracy,
                avg_difficulty,
                ability_estimate: ability,
                confidence_interval: (1.0 / (n as f64).sqrt()).min(1.0),
                recommendation: domain_recommendation(ability, accuracy),
            };
            (domain.to_string(), result)
        })
        .collect()
}

/// Lazily created async locks keyed by session or user id.
struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Entries nobody holds or waits on only have the map's reference.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        lock.lock_owned().await
    }
}

/// Owns all mutation of diagnostic sessions.
pub struct SessionManager {
    bank: Arc<QuestionBank>,
    store: Arc<dyn SessionStore>,
    session_locks: KeyedLocks<Uuid>,
    user_locks: KeyedLocks<String>,
}

impl SessionManager {
    pub fn new(bank: Arc<QuestionBank>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            bank,
            store,
            session_locks: KeyedLocks::new(),
            user_locks: KeyedLocks::new(),
        }
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    /// Start a session. Fails with `Conflict` if the user already has one in
    /// progress.
    pub async fn start_session(
        &self,
        user_id: &str,
        options: SessionOptions,
    ) -> DiagnosticResult<SessionStart> {
        if user_id.trim().is_empty() {
            return Err(DiagnosticError::Validation("user_id is empty".into()));
        }
        options.validate(&self.bank)?;

        let _guard = self.user_locks.lock(&user_id.to_string()).await;

        if let Some(active) = self.store.find_active_for_user(user_id).await? {
            return Err(DiagnosticError::Conflict(format!(
                "user {user_id} already has session {} in progress",
                active.id
            )));
        }

        let now = Utc::now();
        let session = DiagnosticSession {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            session_type: options.session_type,
            catalog: self.bank.name().to_string(),
            catalog_version: self.bank.version().to_string(),
            focus_domains: options.focus_domains,
            current_ability_estimate: 0.0,
            ability_standard_error: 1.0,
            answered_questions: Vec::new(),
            domain_results: BTreeMap::new(),
            status: SessionStatus::InProgress,
            max_questions: options.max_questions,
            min_questions: options.min_questions,
            confidence_threshold: options.confidence_threshold,
            started_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.store.create(&session).await?;

        let starting_questions = select_starting_questions(&self.bank, &session.focus_domains)
            .into_iter()
            .map(|q| q.to_view())
            .collect::<Vec<_>>();

        tracing::info!(
            session_id = %session.id,
            user_id,
            session_type = %session.session_type,
            starting = starting_questions.len(),
            "diagnostic session started"
        );

        Ok(SessionStart {
            session,
            starting_questions,
        })
    }

    /// Score one answer, update the ability estimate and domain results,
    /// pick the next question and apply the stopping rule.
    pub async fn submit_answer(
        &self,
        session_id: Uuid,
        question_id: u32,
        user_answer: usize,
        response_time_seconds: f64,
    ) -> DiagnosticResult<AnswerResult> {
        let _guard = self.session_locks.lock(&session_id).await;

        let mut session = self.load(session_id).await?;
        ensure_in_progress(&session, "answer")?;
        self.ensure_same_catalog(&session)?;

        let question = self
            .bank
            .question(question_id)
            .ok_or_else(|| DiagnosticError::question_not_found(question_id))?;

        if user_answer >= question.options.len() {
            return Err(DiagnosticError::Validation(format!(
                "answer index {user_answer} out of range for {} options",
                question.options.len()
            )));
        }
        if !response_time_seconds.is_finite() || response_time_seconds < 0.0 {
            return Err(DiagnosticError::Validation(format!(
                "response time must be a non-negative number, got {response_time_seconds}"
            )));
        }
        if !session.includes_domain(&question.domain) {
            return Err(DiagnosticError::Validation(format!(
                "question {question_id} is outside this session's focus domains"
            )));
        }
        if session.has_answered(question_id) {
            return Err(DiagnosticError::Validation(format!(
                "question {question_id} was already answered in this session"
            )));
        }

        let is_correct = user_answer == question.correct_answer_index;
        let ability_before = session.current_ability_estimate;
        let ability_after = update_ability(ability_before, is_correct, &question.irt_params);
        let now = Utc::now();

        session.answered_questions.push(AnswerRecord {
            question_id,
            domain: question.domain.clone(),
            user_answer,
            is_correct,
            response_time_seconds,
            ability_before,
            ability_after,
            question_difficulty: question.irt_params.difficulty,
            timestamp: now,
        });
        session.current_ability_estimate = ability_after;
        session.ability_standard_error = self.recompute_standard_error(&session)?;
        session.domain_results = update_domain_results(&session.answered_questions);
        session.updated_at = now;

        let coverage = domain_coverage(&session, &self.bank);
        let should_complete = should_complete_session(&session, coverage.coverage_percent());

        let next_question = if should_complete {
            session.status = SessionStatus::Completed;
            session.completed_at = Some(now);
            None
        } else {
            select_next_question(&session, &self.bank).map(|q| q.to_view())
        };

        self.store.save(&session).await?;

        tracing::debug!(
            session_id = %session_id,
            question_id,
            is_correct,
            ability = ability_after,
            se = session.ability_standard_error,
            "answer recorded"
        );
        if should_complete {
            tracing::info!(
                session_id = %session_id,
                answered = session.total_answered(),
                ability = ability_after,
                "stopping rule reached, session completed"
            );
        }

        let answered = session.total_answered();
        Ok(AnswerResult {
            is_correct,
            correct_answer_index: question.correct_answer_index,
            explanation: question.explanation.clone(),
            current_ability: ability_after,
            ability_standard_error: session.ability_standard_error,
            ability_confidence: (1.0 - session.ability_standard_error).clamp(0.0, 1.0),
            next_question,
            progress: Progress {
                answered,
                min_questions: session.min_questions,
                max_questions: session.max_questions,
                percent_complete: (answered as f64 / session.max_questions as f64 * 100.0)
                    .min(100.0),
                domains_covered: coverage.covered_count(),
                domains_in_scope: coverage.in_scope_count(),
                coverage_percent: coverage.coverage_percent(),
            },
            should_complete,
            session_status: session.status,
        })
    }

    /// Complete an in-progress session on request and return its results.
    pub async fn complete_session(&self, session_id: Uuid) -> DiagnosticResult<DiagnosticResults> {
        let _guard = self.session_locks.lock(&session_id).await;

        let mut session = self.load(session_id).await?;
        ensure_in_progress(&session, "complete")?;
        self.ensure_same_catalog(&session)?;

        let now = Utc::now();
        session.domain_results = update_domain_results(&session.answered_questions);
        session.ability_standard_error = self.recompute_standard_error(&session)?;
        session.status = SessionStatus::Completed;
        session.completed_at = Some(now);
        session.updated_at = now;
        self.store.save(&session).await?;

        tracing::info!(
            session_id = %session_id,
            answered = session.total_answered(),
            "session completed on request"
        );

        Ok(DiagnosticResults::from_session(&session, &self.bank))
    }

    /// Mark an in-progress session as abandoned.
    pub async fn abandon_session(&self, session_id: Uuid) -> DiagnosticResult<DiagnosticSession> {
        let _guard = self.session_locks.lock(&session_id).await;

        let mut session = self.load(session_id).await?;
        ensure_in_progress(&session, "abandon")?;

        session.status = SessionStatus::Abandoned;
        session.updated_at = Utc::now();
        self.store.save(&session).await?;

        tracing::info!(session_id = %session_id, "session abandoned");
        Ok(session)
    }

    pub async fn get_session(&self, session_id: Uuid) -> DiagnosticResult<DiagnosticSession> {
        self.load(session_id).await
    }

    /// Results of a completed session.
    pub async fn get_results(&self, session_id: Uuid) -> DiagnosticResult<DiagnosticResults> {
        let session = self.load(session_id).await?;
        if session.status != SessionStatus::Completed {
            return Err(DiagnosticError::State {
                session_id,
                status: session.status,
                operation: "fetch results for",
            });
        }
        self.ensure_same_catalog(&session)?;
        Ok(DiagnosticResults::from_session(&session, &self.bank))
    }

    async fn load(&self, session_id: Uuid) -> DiagnosticResult<DiagnosticSession> {
        self.store
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| DiagnosticError::session_not_found(session_id))
    }

    /// Sessions are bound to the catalog (name and version) they started
    /// against; scoring one against another bank would mix item parameters.
    fn ensure_same_catalog(&self, session: &DiagnosticSession) -> DiagnosticResult<()> {
        if session.catalog == self.bank.name() && session.catalog_version == self.bank.version()
        {
            return Ok(());
        }
        Err(DiagnosticError::Validation(format!(
            "session {} belongs to catalog {} (version {}), but {} (version {}) is loaded",
            session.id,
            session.catalog,
            session.catalog_version,
            self.bank.name(),
            self.bank.version()
        )))
    }

    fn recompute_standard_error(&self, session: &DiagnosticSession) -> DiagnosticResult<f64> {
        let items = session
            .answered_questions
            .iter()
            .map(|a| {
                self.bank
                    .question(a.question_id)
                    .map(|q| (a.ability_after, &q.irt_params))
                    .ok_or_else(|| {
                        DiagnosticError::Validation(format!(
                            "answered question {} is missing from catalog {}",
                            a.question_id,
                            self.bank.name()
                        ))
                    })
            })
            .collect::<DiagnosticResult<Vec<_>>>()?;
        Ok(standard_error(items))
    }
}

fn ensure_in_progress(session: &DiagnosticSession, operation: &'static str) -> DiagnosticResult<()> {
    if session.is_active() {
        Ok(())
    } else {
        Err(DiagnosticError::State {
            session_id: session.id,
            status: session.status,
            operation,
        })
    }
}
