//! HTML results page.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use anyhow::{Context, Result};
use std::path::Path;

use adaptest_core::model::DomainRecommendation;
use adaptest_core::results::{DiagnosticResults, DomainSummary, Priority, ReadinessLevel};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn readiness_class(level: ReadinessLevel) -> &'static str {
    match level {
        ReadinessLevel::High => "pass",
        ReadinessLevel::Medium => "warn",
        ReadinessLevel::Low => "fail",
    }
}

fn recommendation_class(rec: DomainRecommendation) -> &'static str {
    match rec {
        DomainRecommendation::Advanced | DomainRecommendation::Proficient => "pass",
        DomainRecommendation::PracticeRecommended => "warn",
        DomainRecommendation::StudyRequired => "fail",
    }
}

/// Generate an HTML page from diagnostic results.
pub fn generate_html(results: &DiagnosticResults) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>adaptest results: {}</title>\n",
        html_escape(&results.user_id)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    html.push_str("<header>\n");
    html.push_str("<h1>Diagnostic results</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">User: <strong>{}</strong> | {} | catalog {} | started {}</p>\n",
        html_escape(&results.user_id),
        results.session_type,
        html_escape(&results.catalog),
        results.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Readiness</h2>\n");
    html.push_str(&format!(
        "<p class=\"readiness {}\"><span class=\"score\">{}</span> {} readiness</p>\n",
        readiness_class(results.readiness.level),
        results.readiness.score,
        results.readiness.level
    ));
    html.push_str(&format!(
        "<p>{}</p>\n",
        html_escape(&results.readiness.message)
    ));
    html.push_str("<table class=\"summary\">\n<tbody>\n");
    html.push_str(&format!(
        "<tr><th>Ability</th><td>{:.2}</td></tr>\n<tr><th>Standard error</th><td>{:.2}</td></tr>\n",
        results.final_ability, results.standard_error
    ));
    html.push_str(&format!(
        "<tr><th>Accuracy</th><td>{}/{} ({:.1}%)</td></tr>\n",
        results.correct_answers,
        results.total_questions,
        results.accuracy * 100.0
    ));
    html.push_str("</tbody></table>\n");
    if results.ability_trajectory.len() > 1 {
        html.push_str("<h3>Ability trajectory</h3>\n");
        html.push_str(&generate_trajectory_chart(&results.ability_trajectory));
    }
    html.push_str("</section>\n");

    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Domains</h2>\n");
    if !results.domains.is_empty() {
        html.push_str(&generate_bar_chart(&results.domains));
    }
    html.push_str("<table class=\"results-table\" id=\"domains\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable(0)\">Domain</th><th onclick=\"sortTable(1)\">Answered</th><th onclick=\"sortTable(2)\">Accuracy</th><th onclick=\"sortTable(3)\">Ability</th><th onclick=\"sortTable(4)\">Recommendation</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for d in &results.domains {
        let class = recommendation_class(d.result.recommendation);
        let critical = if d.is_critical { " <em>(critical)</em>" } else { "" };
        html.push_str(&format!(
            "<tr><td>{}{}</td><td>{}</td><td>{:.0}%</td><td>{:.2}</td><td class=\"{}\">{}</td></tr>\n",
            html_escape(&d.name),
            critical,
            d.result.questions_answered,
            d.result.accuracy * 100.0,
            d.result.ability_estimate,
            class,
            d.result.recommendation
        ));
    }
    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    if !results.recommendations.is_empty() {
        html.push_str("<section class=\"recommendations\">\n");
        html.push_str("<h2>Study plan</h2>\n<ul>\n");
        for r in &results.recommendations {
            let class = match r.priority {
                Priority::High => "fail",
                Priority::Medium => "warn",
            };
            html.push_str(&format!(
                "<li><span class=\"tag {}\">{}</span> {} <span class=\"meta\">{}</span></li>\n",
                class,
                r.priority,
                html_escape(&r.message),
                html_escape(&r.resources.join(", "))
            ));
        }
        html.push_str("</ul>\n</section>\n");
    }

    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(results).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write the HTML page to a file, creating parent directories.
pub fn write_html_report(results: &DiagnosticResults, path: &Path) -> Result<()> {
    let html = generate_html(results);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report to {}", path.display()))?;
    Ok(())
}

fn generate_bar_chart(domains: &[DomainSummary]) -> String {
    let bar_height = 26;
    let max_width = 400;
    let padding = 8;
    let label_width = 200;

    let total_height = domains.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 60,
        total_height
    );

    for (i, d) in domains.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let accuracy = d.result.accuracy.clamp(0.0, 1.0);
        let width = (accuracy * max_width as f64) as usize;

        let color = if accuracy >= 0.8 {
            "#22c55e"
        } else if accuracy >= 0.6 {
            "#eab308"
        } else {
            "#ef4444"
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(&d.name)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" rx=\"4\"/>\n",
            label_width, y, width, bar_height, color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{:.0}%</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            accuracy * 100.0
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

/// Polyline of ability after each answer on a fixed [-3, 3] axis.
fn generate_trajectory_chart(trajectory: &[f64]) -> String {
    let width = 600.0;
    let height = 200.0;
    let margin = 20.0;
    let steps = (trajectory.len() - 1).max(1) as f64;

    let x = |i: usize| margin + (width - 2.0 * margin) * i as f64 / steps;
    let y = |theta: f64| {
        let t = (theta.clamp(-3.0, 3.0) + 3.0) / 6.0;
        height - margin - (height - 2.0 * margin) * t
    };

    let points = trajectory
        .iter()
        .enumerate()
        .map(|(i, theta)| format!("{:.1},{:.1}", x(i), y(*theta)))
        .collect::<Vec<_>>()
        .join(" ");

    let mut svg = format!(
        "<svg width=\"{width}\" height=\"{height}\" xmlns=\"http://www.w3.org/2000/svg\">\n"
    );
    svg.push_str(&format!(
        "  <line x1=\"{margin}\" y1=\"{0:.1}\" x2=\"{1:.1}\" y2=\"{0:.1}\" stroke=\"currentColor\" stroke-dasharray=\"4\" opacity=\"0.4\"/>\n",
        y(0.0),
        width - margin
    ));
    svg.push_str(&format!(
        "  <polyline points=\"{points}\" fill=\"none\" stroke=\"#3b82f6\" stroke-width=\"2\"/>\n"
    ));
    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --warn: #fef9c3; --fail: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --warn: #713f12; --fail: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); }
.results-table th { cursor: pointer; }
.pass { background: var(--pass); }
.warn { background: var(--warn); }
.fail { background: var(--fail); }
.readiness { padding: 1rem; border-radius: 8px; font-size: 1.2rem; }
.score { font-size: 2rem; font-weight: bold; margin-right: 0.5rem; }
.tag { padding: 0.1rem 0.5rem; border-radius: 4px; font-size: 0.8rem; text-transform: uppercase; }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('domains');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    return asc ? va.localeCompare(vb, undefined, {numeric: true}) : vb.localeCompare(va, undefined, {numeric: true});
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;
