mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "polyglot-cli")]
#[command(about = "Polyglot CLI - Run and evaluate code submissions locally", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a source file once
    Run {
        /// Language (python, java, javascript, c, cpp, sql)
        #[arg(short, long)]
        lang: String,

        /// Source file to execute
        #[arg(short, long)]
        file: PathBuf,

        /// Literal stdin for the program
        #[arg(short, long, conflicts_with = "input_file")]
        input: Option<String>,

        /// File whose contents become stdin
        #[arg(long)]
        input_file: Option<PathBuf>,

        /// SQL run before the submission (sql only)
        #[arg(long)]
        sql_setup: Option<PathBuf>,
    },

    /// Evaluate a submission described by an evaluation request JSON file
    Evaluate {
        /// Path to the request JSON (question_text, code, language, test_cases, ...)
        #[arg(short, long)]
        request: PathBuf,

        /// Override the request's code with this source file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Show which local toolchains were found
    Toolchains,

    /// List languages from the language table
    ListLangs,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            lang,
            file,
            input,
            input_file,
            sql_setup,
        } => {
            commands::run_file(
                &lang,
                &file,
                input,
                input_file.as_deref(),
                sql_setup.as_deref(),
            )
            .await?;
        }
        Commands::Evaluate { request, file } => {
            commands::evaluate(&request, file.as_deref()).await?;
        }
        Commands::Toolchains => {
            commands::list_toolchains()?;
        }
        Commands::ListLangs => {
            commands::list_languages()?;
        }
    }

    Ok(())
}
