//! The `adaptest init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    if Path::new("adaptest.toml").exists() {
        println!("adaptest.toml already exists, skipping.");
    } else {
        std::fs::write("adaptest.toml", SAMPLE_CONFIG)?;
        println!("Created adaptest.toml");
    }

    std::fs::create_dir_all("catalogs")?;
    let catalog_path = Path::new("catalogs/sample.json");
    if catalog_path.exists() {
        println!("catalogs/sample.json already exists, skipping.");
    } else {
        std::fs::write(catalog_path, SAMPLE_CATALOG)?;
        println!("Created catalogs/sample.json");
    }

    println!("\nNext steps:");
    println!("  1. Run: adaptest validate --catalog catalogs/sample.json");
    println!("  2. Run: adaptest start --user alice");
    println!("  3. Run: adaptest simulate --examinees 25");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# adaptest configuration

catalog = "catalogs/sample.json"
parallelism = 4

[store]
type = "json_dir"
path = "./adaptest-sessions"

[session]
max_questions = 50
min_questions = 10
confidence_threshold = 0.3
"#;

const SAMPLE_CATALOG: &str = include_str!("../../../../catalogs/dental-sample.json");
