use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use techhub_support::api::{ApiState, api_routes};
use techhub_support::config::SupportConfig;
use techhub_support::error::ConfigError;
use techhub_support::eval::{CorrectnessEvaluator, EvalCase, run_dataset};
use techhub_support::llm::{LlmProvider, create_provider};
use techhub_support::responder::{SpecialistResponder, SupervisorResponder, TemplateResponder};
use techhub_support::store::{LibSqlBackend, SeedData};
use techhub_support::verification::{
    EmailExtractor, KeywordClassifier, LlmEmailExtractor, LlmQueryClassifier, QueryClassifier,
    RegexEmailExtractor, RetryPolicy, VerificationFlow,
};

#[derive(Parser)]
#[command(name = "techhub-support", version, about = "TechHub customer support desk")]
struct Cli {
    /// Database file (overrides TECHHUB_DB_PATH).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive conversation on stdin/stdout (default).
    Chat {
        /// Resume an existing thread.
        #[arg(long)]
        thread: Option<Uuid>,
    },
    /// Serve the HTTP API.
    Serve {
        /// Port (overrides TECHHUB_HTTP_PORT).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Load the demo catalog.
    Seed {
        /// Delete existing catalog rows first.
        #[arg(long)]
        reset: bool,
    },
    /// Judge answers for a JSON dataset of `{inputs, reference}` cases.
    Eval { dataset: PathBuf },
    /// Delete expired conversation checkpoints.
    Purge,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut config = SupportConfig::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let db = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );
    let llm = create_provider(&config)?;

    eprintln!("🛒 TechHub Support v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    match llm {
        Some(ref llm) => eprintln!("   Model: {}", llm.model_name()),
        None => eprintln!("   Model: none (offline rules; set ANTHROPIC_API_KEY for LLM mode)"),
    }

    match cli.command.unwrap_or(Command::Chat { thread: None }) {
        Command::Seed { reset } => {
            if reset {
                db.clear_catalog().await?;
            }
            SeedData::demo().load_into(&db).await?;
            for (table, count) in db.catalog_counts().await? {
                eprintln!("   {table}: {count}");
            }
        }
        Command::Purge => {
            let flow = build_flow(&config, db, llm)?;
            let purged = flow.purge_expired().await?;
            eprintln!("   Purged {purged} expired conversations");
        }
        Command::Serve { port } => {
            let port = port.unwrap_or(config.http_port);
            let flow = Arc::new(build_flow(&config, db, llm)?);
            let app = api_routes(ApiState { flow });
            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
                .await
                .with_context(|| format!("Failed to bind port {port}"))?;
            eprintln!("   API: http://0.0.0.0:{port}/api/threads");
            tracing::info!(port, "HTTP server started");
            axum::serve(listener, app).await?;
        }
        Command::Eval { dataset } => {
            let Some(judge) = llm.clone() else {
                anyhow::bail!("eval needs ANTHROPIC_API_KEY for the judge model");
            };
            let raw = tokio::fs::read_to_string(&dataset)
                .await
                .with_context(|| format!("Failed to read {}", dataset.display()))?;
            let cases: Vec<EvalCase> = serde_json::from_str(&raw)?;
            let flow = build_flow(&config, db, llm)?;
            let evaluator = CorrectnessEvaluator::new(judge)
                .with_retry(RetryPolicy::from(&config.flow.retry));
            let summary = run_dataset(&flow, &evaluator, &cases).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            eprintln!(
                "   Correct: {}/{} ({:.0}%)",
                summary.correct,
                summary.records.len(),
                summary.accuracy() * 100.0
            );
        }
        Command::Chat { thread } => {
            let flow = build_flow(&config, db, llm)?;
            chat(&flow, thread.unwrap_or_else(Uuid::new_v4)).await?;
        }
    }

    Ok(())
}

/// Wire oracles and responder: LLM-backed when a provider is configured,
/// rules and templates otherwise.
fn build_flow(
    config: &SupportConfig,
    db: Arc<LibSqlBackend>,
    llm: Option<Arc<dyn LlmProvider>>,
) -> anyhow::Result<VerificationFlow> {
    let retry = RetryPolicy::from(&config.flow.retry);

    let (classifier, extractor, responder): (
        Arc<dyn QueryClassifier>,
        Arc<dyn EmailExtractor>,
        Arc<dyn SpecialistResponder>,
    ) = match llm {
        Some(llm) => (
            Arc::new(LlmQueryClassifier::new(llm.clone())),
            Arc::new(LlmEmailExtractor::new(llm.clone())),
            Arc::new(
                SupervisorResponder::new(llm, db.clone(), retry).map_err(invalid_pattern)?,
            ),
        ),
        None => (
            Arc::new(KeywordClassifier::default_rules().map_err(invalid_pattern)?),
            Arc::new(RegexEmailExtractor::new().map_err(invalid_pattern)?),
            Arc::new(TemplateResponder::new(db.clone())),
        ),
    };

    Ok(
        VerificationFlow::new(db.clone(), db, classifier, extractor, responder)
            .with_config(config.flow.clone()),
    )
}

fn invalid_pattern(e: regex::Error) -> ConfigError {
    ConfigError::InvalidValue {
        key: "pattern".into(),
        message: e.to_string(),
    }
}

/// stdin/stdout REPL on one thread.
async fn chat(flow: &VerificationFlow, thread_id: Uuid) -> anyhow::Result<()> {
    eprintln!("   Thread: {thread_id}");
    eprintln!("   Type a message and press Enter. /quit to exit, /reset to start over.\n");

    if let Some(cp) = flow.conversation(thread_id).await?
        && let Some(prompt) = cp.prompt
    {
        println!("{prompt}");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprint!("> ");
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            "/quit" | "/exit" => break,
            "/reset" => {
                flow.reset(thread_id).await?;
                println!("Conversation cleared.");
            }
            text => match flow.handle_message(thread_id, text).await {
                Ok(outcome) => {
                    for msg in outcome.display_lines() {
                        println!("\n{msg}");
                    }
                    println!();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Turn failed");
                    println!("\n{}\n", e.user_message());
                }
            },
        }
        eprint!("> ");
    }
    Ok(())
}
