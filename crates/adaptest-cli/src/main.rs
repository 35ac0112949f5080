//! adaptest CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(name = "adaptest", version, about = "IRT adaptive diagnostic engine")]
struct Cli {
    /// Config file path (default: ./adaptest.toml, then ~/.config/adaptest/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a question catalog
    Validate {
        /// Catalog file (.json or .toml)
        #[arg(long)]
        catalog: PathBuf,
    },

    /// List the domains of a catalog
    ListDomains {
        /// Catalog file (default: from config)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Simulate examinees across the ability range
    Simulate {
        /// Catalog file (default: from config)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Number of simulated examinees, spread evenly over [-3, 3]
        #[arg(long, default_value = "25")]
        examinees: usize,

        /// Max concurrent sessions (default: from config)
        #[arg(long)]
        parallelism: Option<usize>,

        #[command(flatten)]
        limits: commands::SessionLimits,

        /// Write the full report as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Create a starter config and sample catalog
    Init,

    /// Start a diagnostic session
    Start {
        /// Examinee identifier
        #[arg(long)]
        user: String,

        /// Session type: full, domain, practice
        #[arg(long = "type", default_value = "full")]
        session_type: String,

        /// Focus domains (comma-separated codes)
        #[arg(long)]
        focus: Option<String>,

        #[command(flatten)]
        limits: commands::SessionLimits,

        /// Catalog file (default: from config)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Submit an answer
    Answer {
        #[arg(long)]
        session: Uuid,

        /// Question id
        #[arg(long)]
        question: u32,

        /// Zero-based option index
        #[arg(long)]
        answer: usize,

        /// Response time in seconds
        #[arg(long, default_value = "30")]
        time: f64,

        /// Catalog file (default: from config)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Complete a session now
    Complete {
        #[arg(long)]
        session: Uuid,

        /// Catalog file (default: from config)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Abandon a session
    Abandon {
        #[arg(long)]
        session: Uuid,

        /// Catalog file (default: from config)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Show the results of a completed session
    Results {
        #[arg(long)]
        session: Uuid,

        /// Output format: text, json, markdown, html
        #[arg(long, default_value = "text")]
        format: String,

        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Catalog file (default: from config)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "adaptest=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Validate { catalog } => commands::validate::execute(catalog),
        Commands::ListDomains { catalog } => commands::list_domains::execute(catalog, config),
        Commands::Simulate {
            catalog,
            examinees,
            parallelism,
            limits,
            output,
        } => {
            commands::simulate::execute(catalog, examinees, parallelism, limits, output, config)
                .await
        }
        Commands::Init => commands::init::execute(),
        Commands::Start {
            user,
            session_type,
            focus,
            limits,
            catalog,
            json,
        } => {
            commands::session::start(user, session_type, focus, limits, catalog, json, config)
                .await
        }
        Commands::Answer {
            session,
            question,
            answer,
            time,
            catalog,
            json,
        } => commands::session::answer(session, question, answer, time, catalog, json, config).await,
        Commands::Complete {
            session,
            catalog,
            json,
        } => commands::session::complete(session, catalog, json, config).await,
        Commands::Abandon { session, catalog } => {
            commands::session::abandon(session, catalog, config).await
        }
        Commands::Results {
            session,
            format,
            output,
            catalog,
        } => commands::results::execute(session, format, output, catalog, config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
