//! Question catalog loading.
//!
//! Catalogs are JSON or TOML documents with a `domains` list and a
//! `questions` list. Structural errors fail the parse; suspicious but
//! loadable content is reported by `validate_catalog`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::{Catalog, OPTION_COUNT};

/// On-disk encoding of a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    Json,
    Toml,
}

impl CatalogFormat {
    /// Pick the format from a file extension; anything but `.toml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        if path.extension().is_some_and(|ext| ext == "toml") {
            CatalogFormat::Toml
        } else {
            CatalogFormat::Json
        }
    }
}

/// Read and parse a catalog file.
pub fn parse_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file: {}", path.display()))?;

    let catalog = parse_catalog_str(&content, CatalogFormat::from_path(path))
        .with_context(|| format!("failed to parse catalog: {}", path.display()))?;

    tracing::debug!(
        path = %path.display(),
        domains = catalog.domains.len(),
        questions = catalog.questions.len(),
        "catalog parsed"
    );
    Ok(catalog)
}

/// Parse catalog text in the given format.
pub fn parse_catalog_str(content: &str, format: CatalogFormat) -> Result<Catalog> {
    match format {
        CatalogFormat::Json => serde_json::from_str(content).context("invalid catalog JSON"),
        CatalogFormat::Toml => toml::from_str(content).context("invalid catalog TOML"),
    }
}

/// A catalog issue that does not prevent loading.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    /// The question id, if the warning is about one question.
    pub question_id: Option<u32>,
    /// The domain code, if the warning is about a domain.
    pub domain: Option<String>,
    pub message: String,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.question_id, &self.domain) {
            (Some(id), _) => write!(f, "question {id}: {}", self.message),
            (None, Some(domain)) => write!(f, "domain {domain}: {}", self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

fn question_warning(id: u32, message: String) -> ValidationWarning {
    ValidationWarning {
        question_id: Some(id),
        domain: None,
        message,
    }
}

fn domain_warning(code: &str, message: String) -> ValidationWarning {
    ValidationWarning {
        question_id: None,
        domain: Some(code.to_string()),
        message,
    }
}

/// Check a catalog against the documented content ranges.
pub fn validate_catalog(catalog: &Catalog) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_domains = HashSet::new();
    for domain in &catalog.domains {
        if !seen_domains.insert(domain.code.as_str()) {
            warnings.push(domain_warning(&domain.code, "duplicate domain code".into()));
        }
        if !(domain.weight.is_finite() && domain.weight > 0.0) {
            warnings.push(domain_warning(
                &domain.code,
                format!("weight {} should be a positive number", domain.weight),
            ));
        }
    }

    let mut seen_ids = HashSet::new();
    let mut per_domain: HashMap<&str, usize> = HashMap::new();

    for q in &catalog.questions {
        if !seen_ids.insert(q.id) {
            warnings.push(question_warning(q.id, "duplicate question id".into()));
        }
        if !seen_domains.contains(q.domain.as_str()) {
            warnings.push(question_warning(
                q.id,
                format!("unknown domain: {}", q.domain),
            ));
        }
        *per_domain.entry(q.domain.as_str()).or_default() += 1;

        if q.stem.trim().is_empty() {
            warnings.push(question_warning(q.id, "stem is empty".into()));
        }
        if q.options.len() != OPTION_COUNT {
            warnings.push(question_warning(
                q.id,
                format!("has {} options, expected {OPTION_COUNT}", q.options.len()),
            ));
        }
        if q.correct_answer_index >= q.options.len() {
            warnings.push(question_warning(
                q.id,
                format!(
                    "correct_answer_index {} is out of range",
                    q.correct_answer_index
                ),
            ));
        }
        if !(1..=3).contains(&q.difficulty_level) {
            warnings.push(question_warning(
                q.id,
                format!("difficulty_level {} is outside 1-3", q.difficulty_level),
            ));
        }

        let p = &q.irt_params;
        if !(0.0..=2.0).contains(&p.difficulty) {
            warnings.push(question_warning(
                q.id,
                format!("difficulty {} is outside [0, 2]", p.difficulty),
            ));
        }
        if !(1.0..=3.0).contains(&p.discrimination) {
            warnings.push(question_warning(
                q.id,
                format!("discrimination {} is outside [1, 3]", p.discrimination),
            ));
        }
        if p.guessing >= 1.0 || p.guessing.is_nan() {
            warnings.push(question_warning(
                q.id,
                format!("guessing {} must be below 1", p.guessing),
            ));
        } else if !(0.1..=0.3).contains(&p.guessing) {
            warnings.push(question_warning(
                q.id,
                format!("guessing {} is outside [0.1, 0.3]", p.guessing),
            ));
        }
    }

    for domain in &catalog.domains {
        let count = per_domain.get(domain.code.as_str()).copied().unwrap_or(0);
        if count == 0 {
            warnings.push(domain_warning(&domain.code, "has no questions".into()));
        } else if domain.is_critical && count < domain.min_required_questions() {
            warnings.push(domain_warning(
                &domain.code,
                format!(
                    "critical domain has {count} questions, fewer than the {} needed for coverage",
                    domain.min_required_questions()
                ),
            ));
        }
    }

    warnings
}
