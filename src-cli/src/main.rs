use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use lex_ai::format;
use lex_ai::index::{IndexStatus, IndexStore};
use lex_ai::ollama::OllamaClient;
use lex_ai::pipeline::wiring::{build_index, orchestrator_from_config};
use lex_ai::{ArticleText, CancelToken, Orchestrator, PipelineResponse};
use lex_core::config::AppConfig;
use lex_core::error::{codes, AppError};
use lex_core::memory::{MemoryStore, UserMemory};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lexbot", version, about = "Answer civil-law questions from a local article corpus")]
struct Cli {
    /// JSON config file; `LEXBOT_*` environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of plain text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse, chunk and embed a corpus file, then persist the index.
    Index {
        #[arg(long)]
        corpus: PathBuf,
    },
    /// Show the persisted index status.
    Status,
    /// Check that the model endpoint answers.
    Health,
    /// Ask one question.
    Ask {
        #[arg(long, default_value = "cli")]
        user: String,
        question: String,
    },
    /// Read questions from stdin, one per line.
    Chat {
        #[arg(long, default_value = "cli")]
        user: String,
    },
    /// Print the verbatim text of one article.
    Article { id: String },
    /// Show (or clear) the stored conversation history of a user.
    History {
        #[arg(long)]
        user: String,
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Debug, Serialize)]
struct HealthReport {
    base_url: String,
    ok: bool,
}

#[derive(Debug, Serialize)]
struct ClearReport {
    user_id: String,
    cleared: bool,
}

fn main() -> ExitCode {
    if let Err(e) = init_tracing() {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("lexbot=info".parse()?)
                .add_directive("lex_ai=info".parse()?),
        )
        .init();
    Ok(())
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let cfg = AppConfig::load(cli.config.as_deref())?;
    match &cli.command {
        Command::Index { corpus } => {
            let status = index_corpus(&cfg, corpus)?;
            emit(cli.json, &status, || {
                format!(
                    "indexed {} articles in {} chunks with {}",
                    status.article_count,
                    status.chunk_count,
                    status.model.as_deref().unwrap_or("?")
                )
            })
        }
        Command::Status => {
            let status = index_status(&cfg)?;
            emit(cli.json, &status, || {
                if status.ready {
                    format!(
                        "ready: {} articles, {} chunks, model {}, built {}",
                        status.article_count,
                        status.chunk_count,
                        status.model.as_deref().unwrap_or("?"),
                        status.updated_at.as_deref().unwrap_or("?")
                    )
                } else {
                    "not ready: run `lexbot index --corpus <file>`".to_string()
                }
            })
        }
        Command::Health => {
            let report = health(&cfg)?;
            emit(cli.json, &report, || format!("{} ok", report.base_url))
        }
        Command::Ask { user, question } => {
            let orchestrator = orchestrator_from_config(&cfg)?;
            let response = ask(&orchestrator, user, question)?;
            emit(cli.json, &response, || response.text.clone())
        }
        Command::Chat { user } => chat(&orchestrator_from_config(&cfg)?, user, cli.json),
        Command::Article { id } => {
            let orchestrator = orchestrator_from_config(&cfg)?;
            match article(&orchestrator, id) {
                Ok(a) => emit(cli.json, &a, || format!("{}\n\n{}", a.heading, a.text)),
                Err(e) if e.is(codes::ARTICLE_NOT_FOUND) && !cli.json => {
                    println!("{}", format::not_found(orchestrator.settings().native, id));
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        Command::History { user, clear } => {
            let store = MemoryStore::open(&cfg.memory_db_path(), cfg.memory)?;
            if *clear {
                let report = clear_history(&store, user)?;
                emit(cli.json, &report, || {
                    if report.cleared {
                        format!("history of {} cleared", report.user_id)
                    } else {
                        format!("no history for {}", report.user_id)
                    }
                })
            } else {
                let memory = history(&store, user)?;
                emit(cli.json, &memory, || render_history(user, memory.as_ref()))
            }
        }
    }
}

fn index_corpus(cfg: &AppConfig, corpus: &std::path::Path) -> Result<IndexStatus, AppError> {
    info!(corpus = %corpus.display(), "indexing corpus");
    build_index(cfg, corpus)
}

fn index_status(cfg: &AppConfig) -> Result<IndexStatus, AppError> {
    IndexStore::open(cfg.index_dir()).status()
}

fn health(cfg: &AppConfig) -> Result<HealthReport, AppError> {
    let client = OllamaClient::from_config(&cfg.endpoint)?;
    client.health_check()?;
    Ok(HealthReport {
        base_url: client.base_url().to_string(),
        ok: true,
    })
}

fn ask(orchestrator: &Orchestrator, user: &str, question: &str) -> Result<PipelineResponse, AppError> {
    orchestrator.process(question, user, &CancelToken::new())
}

fn chat(orchestrator: &Orchestrator, user: &str, json: bool) -> Result<(), AppError> {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.map_err(|e| {
            AppError::new("CLI_STDIN_FAILED", "Failed to read from stdin").with_details(e.to_string())
        })?;
        if line.trim().is_empty() {
            continue;
        }
        match ask(orchestrator, user, &line) {
            Ok(response) => emit(json, &response, || response.text.clone())?,
            Err(e) => {
                warn!(user_id = user, error = %e, "chat request aborted");
                print_error(&e);
            }
        }
        io::stdout().flush().ok();
    }
    Ok(())
}

fn article(orchestrator: &Orchestrator, id: &str) -> Result<ArticleText, AppError> {
    orchestrator.get_article(id)
}

fn history(store: &MemoryStore, user: &str) -> Result<Option<UserMemory>, AppError> {
    store.read(user)
}

fn clear_history(store: &MemoryStore, user: &str) -> Result<ClearReport, AppError> {
    Ok(ClearReport {
        user_id: user.to_string(),
        cleared: store.clear(user)?,
    })
}

fn render_history(user: &str, memory: Option<&UserMemory>) -> String {
    let Some(memory) = memory else {
        return format!("no history for {user}");
    };
    let mut out = format!("{} since {}\n", memory.user_id, memory.first_interaction);
    for record in &memory.records {
        out.push_str(&format!("\n[{}]\n> {}\n{}\n", record.timestamp, record.query, record.truncated_response));
    }
    out
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<(), AppError> {
    if json {
        let raw = serde_json::to_string_pretty(value).map_err(|e| {
            AppError::new("CLI_OUTPUT_FAILED", "Failed to encode output").with_details(e.to_string())
        })?;
        println!("{raw}");
    } else {
        println!("{}", text());
    }
    Ok(())
}

fn print_error(e: &AppError) {
    match serde_json::to_string(e) {
        Ok(raw) => eprintln!("{raw}"),
        Err(_) => eprintln!("{e}"),
    }
}
