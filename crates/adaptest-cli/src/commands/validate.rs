//! The `adaptest validate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use adaptest_core::parser::{parse_catalog, validate_catalog};
use adaptest_core::QuestionBank;

pub fn execute(catalog_path: PathBuf) -> Result<()> {
    let catalog = parse_catalog(&catalog_path)?;

    println!(
        "Catalog: {} ({} domains, {} questions)",
        if catalog.name.is_empty() {
            "<unnamed>"
        } else {
            catalog.name.as_str()
        },
        catalog.domains.len(),
        catalog.questions.len()
    );

    let warnings = validate_catalog(&catalog);
    for w in &warnings {
        println!("  WARNING: {w}");
    }

    // Structural problems make the catalog unusable, not just suspicious.
    QuestionBank::new(catalog)
        .with_context(|| format!("catalog cannot be loaded: {}", catalog_path.display()))?;

    if warnings.is_empty() {
        println!("Catalog valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
