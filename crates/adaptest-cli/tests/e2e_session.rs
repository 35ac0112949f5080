//! End-to-end session flows over the sample catalog and the JSON directory
//! store, driven through the library API.

use std::path::Path;
use std::sync::Arc;

use adaptest_core::error::DiagnosticError;
use adaptest_core::model::{SessionStatus, SessionType};
use adaptest_core::parser::{parse_catalog, validate_catalog};
use adaptest_core::results::{Priority, ReadinessLevel};
use adaptest_core::session::update_domain_results;
use adaptest_core::{QuestionBank, SessionManager, SessionOptions};
use adaptest_store::JsonDirSessionStore;

const SAMPLE_CATALOG: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../catalogs/dental-sample.json"
);

fn sample_bank() -> Arc<QuestionBank> {
    let catalog = parse_catalog(Path::new(SAMPLE_CATALOG)).unwrap();
    assert!(validate_catalog(&catalog).is_empty());
    Arc::new(QuestionBank::new(catalog).unwrap())
}

fn manager(bank: &Arc<QuestionBank>, dir: &Path) -> SessionManager {
    SessionManager::new(
        Arc::clone(bank),
        Arc::new(JsonDirSessionStore::new(dir).unwrap()),
    )
}

/// Answer every served question with `pick` until the session ends.
/// Returns the number of answers given.
async fn drive(
    manager: &SessionManager,
    bank: &QuestionBank,
    session_id: uuid::Uuid,
    first: u32,
    pick: impl Fn(&adaptest_core::Question) -> usize,
) -> usize {
    let mut next = Some(first);
    let mut answered = 0;
    while let Some(id) = next {
        let question = bank.question(id).unwrap();
        let result = manager
            .submit_answer(session_id, id, pick(question), 20.0)
            .await
            .unwrap();
        answered += 1;
        if result.should_complete {
            assert_eq!(result.session_status, SessionStatus::Completed);
            assert!(result.next_question.is_none());
            return answered;
        }
        next = result.next_question.map(|q| q.id);
    }
    answered
}

#[tokio::test]
async fn strong_examinee_reaches_completion() {
    let bank = sample_bank();
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(&bank, dir.path());

    let start = manager
        .start_session("strong", SessionOptions::default())
        .await
        .unwrap();
    let first = start.starting_questions[0].id;
    let answered = drive(&manager, &bank, start.session.id, first, |q| {
        q.correct_answer_index
    })
    .await;
    // Coverage completes at the floor: 3 + 3 + 1 + 1 + 1 + 1 answers.
    assert_eq!(answered, 10);

    let session = manager.get_session(start.session.id).await.unwrap();
    assert!(!session.is_active());
    assert_eq!(session.accuracy_rate(), 1.0);
    for pair in session.answered_questions.windows(2) {
        assert!(pair[1].ability_after >= pair[0].ability_after);
    }
    assert_eq!(
        session.domain_results,
        update_domain_results(&session.answered_questions)
    );

    // Critical domains were sampled to their minimum.
    for code in ["PHARMACOLOGY", "ANATOMY"] {
        assert!(session.domain_results[code].questions_answered >= 3, "{code}");
    }

    let results = manager.get_results(start.session.id).await.unwrap();
    assert!(results.final_ability > 0.0);
    assert_ne!(results.readiness.level, ReadinessLevel::Low);
    assert!(results
        .recommendations
        .iter()
        .all(|r| r.priority == Priority::Medium));
}

#[tokio::test]
async fn weak_examinee_gets_study_plan() {
    let bank = sample_bank();
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(&bank, dir.path());

    let start = manager
        .start_session("weak", SessionOptions::default())
        .await
        .unwrap();
    let first = start.starting_questions[0].id;
    drive(&manager, &bank, start.session.id, first, |q| {
        (q.correct_answer_index + 1) % q.options.len()
    })
    .await;

    let session = manager.get_session(start.session.id).await.unwrap();
    if session.is_active() {
        manager.complete_session(start.session.id).await.unwrap();
    }
    let results = manager.get_results(start.session.id).await.unwrap();
    assert_eq!(results.readiness.level, ReadinessLevel::Low);
    assert!(results.final_ability < 0.0);
    assert!(!results.recommendations.is_empty());
    assert_eq!(results.recommendations[0].priority, Priority::High);
}

#[tokio::test]
async fn sessions_survive_a_new_manager() {
    let bank = sample_bank();
    let dir = tempfile::tempdir().unwrap();

    let session_id = {
        let first = manager(&bank, dir.path());
        let start = first
            .start_session("erin", SessionOptions::default())
            .await
            .unwrap();
        first
            .submit_answer(start.session.id, start.starting_questions[0].id, 0, 12.0)
            .await
            .unwrap();
        start.session.id
    };

    let second = manager(&bank, dir.path());
    let session = second.get_session(session_id).await.unwrap();
    assert_eq!(session.total_answered(), 1);

    let err = second
        .start_session("erin", SessionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DiagnosticError::Conflict(_)));
}

#[tokio::test]
async fn focus_session_never_leaves_its_domains() {
    let bank = sample_bank();
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(&bank, dir.path());

    let options = SessionOptions {
        session_type: SessionType::DomainSpecific,
        focus_domains: vec!["PERIODONTICS".into(), "ETHICS".into()],
        min_questions: 8,
        max_questions: 8,
        confidence_threshold: 1e-6,
    };
    let start = manager.start_session("fran", options).await.unwrap();
    assert!(start
        .starting_questions
        .iter()
        .all(|q| q.domain == "PERIODONTICS" || q.domain == "ETHICS"));

    let first = start.starting_questions[0].id;
    let answered = drive(&manager, &bank, start.session.id, first, |q| {
        q.correct_answer_index
    })
    .await;
    assert_eq!(answered, 8);

    let session = manager.get_session(start.session.id).await.unwrap();
    assert!(session
        .answered_questions
        .iter()
        .all(|a| a.domain == "PERIODONTICS" || a.domain == "ETHICS"));
    assert_eq!(session.status, SessionStatus::Completed);
}

#[tokio::test]
async fn concurrent_starts_for_one_user_admit_one() {
    let bank = sample_bank();
    let dir = tempfile::tempdir().unwrap();
    let manager = Arc::new(manager(&bank, dir.path()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager
                .start_session("gale", SessionOptions::default())
                .await
        }));
    }

    let mut started = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => started += 1,
            Err(DiagnosticError::Conflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(started, 1);
    assert_eq!(conflicts, 7);
}
