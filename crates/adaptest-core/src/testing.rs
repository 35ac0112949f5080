//! Small synthetic catalogs shared by unit tests.

use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use crate::model::{
    Catalog, DiagnosticSession, Domain, IrtParams, Question, QuestionBank, SessionStatus,
    SessionType, OPTION_COUNT,
};

pub(crate) fn params(difficulty: f64, discrimination: f64, guessing: f64) -> IrtParams {
    IrtParams {
        difficulty,
        discrimination,
        guessing,
    }
}

pub(crate) fn question(id: u32, domain: &str) -> Question {
    question_with(id, domain, params(1.0, 1.5, 0.2), 2)
}

pub(crate) fn question_with(id: u32, domain: &str, irt: IrtParams, level: u8) -> Question {
    Question {
        id,
        domain: domain.into(),
        stem: format!("Question {id}"),
        options: (0..OPTION_COUNT).map(|i| format!("option {i}")).collect(),
        correct_answer_index: 0,
        explanation: format!("Explanation for {id}"),
        irt_params: irt,
        difficulty_level: level,
    }
}

pub(crate) fn domain(code: &str, is_critical: bool) -> Domain {
    Domain {
        code: code.into(),
        name: String::new(),
        weight: 1.0,
        is_critical,
    }
}

pub(crate) fn bank(domains: Vec<Domain>, questions: Vec<Question>) -> QuestionBank {
    QuestionBank::new(Catalog {
        name: "test".into(),
        version: "1".into(),
        domains,
        questions,
    })
    .unwrap()
}

/// Two critical and two non-critical domains, four questions each.
pub(crate) fn sample_bank() -> QuestionBank {
    let domains = vec![
        domain("PHARMACOLOGY", true),
        domain("ANATOMY", true),
        domain("RADIOLOGY", false),
        domain("ETHICS", false),
    ];
    let mut questions = Vec::new();
    let mut id = 1;
    for d in &domains {
        for (difficulty, level) in [(0.3, 1), (0.9, 2), (1.2, 2), (1.8, 3)] {
            questions.push(question_with(id, &d.code, params(difficulty, 1.5, 0.2), level));
            id += 1;
        }
    }
    bank(domains, questions)
}

/// An empty in-progress full diagnostic (min 10, max 50, threshold 0.3).
pub(crate) fn blank_session(user_id: &str) -> DiagnosticSession {
    DiagnosticSession {
        id: Uuid::new_v4(),
        user_id: user_id.into(),
        session_type: SessionType::FullDiagnostic,
        catalog: "test".into(),
        catalog_version: "1".into(),
        focus_domains: vec![],
        current_ability_estimate: 0.0,
        ability_standard_error: 1.0,
        answered_questions: vec![],
        domain_results: BTreeMap::new(),
        status: SessionStatus::InProgress,
        max_questions: 50,
        min_questions: 10,
        confidence_threshold: 0.3,
        started_at: Utc::now(),
        updated_at: Utc::now(),
        completed_at: None,
    }
}
