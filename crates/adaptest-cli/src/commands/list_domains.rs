//! The `adaptest list-domains` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use adaptest_store::load_config_from;

use super::{catalog_path, load_bank};

pub fn execute(catalog: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let bank = load_bank(&catalog_path(catalog, &config)?)?;

    let mut table = Table::new();
    table.set_header(vec!["Code", "Name", "Weight", "Critical", "Questions"]);

    for domain in bank.domains() {
        table.add_row(vec![
            Cell::new(&domain.code),
            Cell::new(domain.display_name()),
            Cell::new(format!("{:.2}", domain.weight)),
            Cell::new(if domain.is_critical { "yes" } else { "" }),
            Cell::new(bank.questions_in_domain(&domain.code).count()),
        ]);
    }

    println!("{} ({} questions)", bank.name(), bank.len());
    println!("{table}");
    Ok(())
}
