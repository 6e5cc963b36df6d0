use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueHint};
use tracing_subscriber::EnvFilter;

use quizgen::commands::{generate, provider, settings, usage};
use quizgen::config::AppConfig;
use quizgen::crud::DB;
use quizgen::generation::{Difficulty, GenerationRequest, QuestionType};
use quizgen::llm::ProviderKind;

#[derive(Parser, Debug)]
#[command(
    name = "quizgen",
    version,
    about = "AI-assisted multiple-choice question generation.",
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true,
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate questions with the active AI provider
    Generate {
        /// Account the generation is charged to
        #[arg(long, value_name = "ID")]
        requester: i64,
        /// School grade, 1 to 12
        #[arg(long)]
        grade: u8,
        #[arg(long, value_enum, default_value_t = Difficulty::Medium)]
        difficulty: Difficulty,
        /// Number of questions, 1 to 20
        #[arg(long, default_value_t = 5)]
        count: u8,
        #[arg(long = "type", value_enum, default_value_t = QuestionType::General)]
        question_type: QuestionType,
        /// Narrow general questions to a topic
        #[arg(long)]
        topic: Option<String>,
        #[arg(long, value_name = "ID")]
        subject_id: Option<i64>,
        /// Subject name used in the prompt
        #[arg(long, value_name = "NAME")]
        subject: Option<String>,
        /// Reading passage for passage-based questions
        #[arg(long, conflicts_with = "passage_file")]
        passage: Option<String>,
        /// Read the reading passage from a file
        #[arg(long, value_name = "PATH", value_hint = ValueHint::FilePath)]
        passage_file: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Manage AI provider configurations
    Provider {
        #[command(subcommand)]
        action: ProviderAction,
    },
    /// Show a requester's monthly allowance and spend
    Usage {
        #[arg(long, value_name = "ID")]
        requester: i64,
        /// Number of recent attempts to list
        #[arg(long, value_name = "COUNT", default_value_t = 10)]
        recent: u32,
    },
    /// Show or change generation settings
    Settings {
        /// Successful generations allowed per requester per calendar month
        #[arg(long, value_name = "COUNT")]
        monthly_limit: Option<u32>,
        /// Turn AI generation on or off
        #[arg(long, value_name = "BOOL")]
        ai_enabled: Option<bool>,
    },
}

#[derive(Subcommand, Debug)]
enum ProviderAction {
    /// Store a new provider config; the API key is encrypted before it is saved
    Add {
        #[arg(long, value_enum)]
        provider: ProviderKind,
        #[arg(long)]
        model: String,
        #[arg(long, default_value_t = 0.7)]
        temperature: f64,
        #[arg(long, default_value_t = 2000)]
        max_tokens: u32,
        /// Override the vendor endpoint, e.g. for a gateway
        #[arg(long, value_hint = ValueHint::Url)]
        base_url: Option<String>,
        /// API key; prompted for when omitted
        #[arg(long, value_name = "KEY")]
        api_key: Option<String>,
        /// Make this the active provider
        #[arg(long, default_value_t = false)]
        activate: bool,
    },
    /// List stored provider configs
    List,
    /// Make a provider config the only active one
    Activate { id: i64 },
    /// Delete a provider config
    Remove {
        id: i64,
        #[arg(long, short, default_value_t = false)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run_cli().await {
        eprintln!("{:?}", err);
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let db = DB::open(&config.db_path()).await?;

    match cli.command {
        Command::Generate {
            requester,
            grade,
            difficulty,
            count,
            question_type,
            topic,
            subject_id,
            subject,
            passage,
            passage_file,
            json,
        } => {
            let request = GenerationRequest {
                requester_id: requester,
                subject_id,
                subject_name: subject,
                grade,
                difficulty,
                count,
                question_type,
                topic,
                passage_text: passage,
            };
            generate::run(&db, &config, request, passage_file, json).await?;
        }
        Command::Provider { action } => match action {
            ProviderAction::Add {
                provider: kind,
                model,
                temperature,
                max_tokens,
                base_url,
                api_key,
                activate,
            } => {
                provider::add(
                    &db,
                    provider::AddProvider {
                        provider: kind,
                        model,
                        temperature,
                        max_tokens,
                        base_url,
                        api_key,
                        activate,
                    },
                )
                .await?
            }
            ProviderAction::List => provider::list(&db).await?,
            ProviderAction::Activate { id } => provider::activate(&db, id).await?,
            ProviderAction::Remove { id, yes } => provider::remove(&db, id, yes).await?,
        },
        Command::Usage { requester, recent } => usage::run(&db, requester, recent).await?,
        Command::Settings {
            monthly_limit,
            ai_enabled,
        } => settings::run(&db, monthly_limit, ai_enabled).await?,
    }

    Ok(())
}
