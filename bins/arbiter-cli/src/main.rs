mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arbiter-cli")]
#[command(about = "Arbiter CLI - Run code and validate problems against an execution engine", long_about = None)]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for values normally read from the environment
#[derive(Args, Debug, Default)]
pub struct EngineArgs {
    /// Engine base URL (overrides JUDGE0_API_URL)
    #[arg(long, global = true)]
    pub engine_url: Option<String>,

    /// Engine auth token (overrides JUDGE0_AUTH_TOKEN)
    #[arg(long, global = true)]
    pub auth_token: Option<String>,

    /// Give up polling after this many milliseconds (overrides POLL_DEADLINE_MS)
    #[arg(long, global = true)]
    pub deadline_ms: Option<u64>,

    /// Initial poll interval in milliseconds (overrides POLL_INTERVAL_MS)
    #[arg(long, global = true)]
    pub poll_interval_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a source file against a JSON list of {input, output} test cases
    Run {
        /// Language name (e.g., PYTHON, JAVA, CPP)
        #[arg(short, long)]
        language: String,

        /// Path to the source file
        #[arg(short, long)]
        source: String,

        /// Path to the test cases JSON file
        #[arg(short, long)]
        tests: String,
    },

    /// Validate every reference solution of a problem definition
    Validate {
        /// Path to the problem JSON file
        #[arg(short, long)]
        problem: String,
    },

    /// List supported languages
    Languages,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let passed = match cli.command {
        Commands::Run {
            language,
            source,
            tests,
        } => commands::run_code(&cli.engine, &language, &source, &tests).await?,
        Commands::Validate { problem } => {
            commands::validate_problem(&cli.engine, &problem).await?
        }
        Commands::Languages => {
            commands::list_languages();
            true
        }
    };

    if !passed {
        std::process::exit(1);
    }

    Ok(())
}
