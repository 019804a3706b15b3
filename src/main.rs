//! Toolgate console REPL
//!
//! Thin shell over the router core: loads configuration, wires the
//! OpenAI-compatible providers, and pushes stdin turns into one session.

use anyhow::Result;
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use toolgate::agent::OpenAiAgentExecutor;
use toolgate::embedding::{EmbeddingProvider, HashedEmbeddings, OpenAiEmbeddings};
use toolgate::transport::HttpTransport;
use toolgate::{RouterConfig, SmartRouter};

#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"))]
#[command(about = env!("CARGO_PKG_DESCRIPTION"))]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = toolgate::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Override data directory path (metrics file location)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Session identifier for this REPL
    #[arg(long, default_value = "console")]
    session: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_missing = !cli.config.exists();
    let mut config = if config_missing {
        RouterConfig::default()
    } else {
        RouterConfig::load_file(&cli.config)?
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let level = if config.debug {
        "debug"
    } else {
        cli.log_level.as_str()
    };
    init_logging(level)?;

    info!("Starting toolgate v{}", toolgate::VERSION);
    if config_missing {
        warn!(
            "Config file '{}' not found, using defaults",
            cli.config.display()
        );
    }

    let api_key = std::env::var("OPENAI_API_KEY").ok();
    let embeddings: Arc<dyn EmbeddingProvider> = match &api_key {
        Some(key) => Arc::new(OpenAiEmbeddings::new(
            config.embedding_model.clone(),
            key.clone(),
        )?),
        None => {
            warn!("OPENAI_API_KEY not set, using deterministic fallback embeddings");
            Arc::new(HashedEmbeddings::default())
        }
    };

    let api_key = api_key.unwrap_or_default();
    let executor = Arc::new(OpenAiAgentExecutor::new(
        config.execution_model.clone(),
        api_key,
    )?);
    let transport = Arc::new(HttpTransport::new(Duration::from_secs(30))?);

    let router = SmartRouter::new(config, embeddings, transport, executor)?;
    router.initialize().await?;

    let cached = router.cache_contents().await;
    if !cached.is_empty() {
        println!("Preloaded servers: {}", cached.join(", "));
    }
    println!("Ready. Type a message, or 'exit' to quit.");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        match router.handle_turn(&cli.session, line).await {
            Ok(reply) => println!("{}", reply),
            Err(e) => {
                let hint = if e.is_recoverable() {
                    " (you can retry)"
                } else {
                    ""
                };
                eprintln!("Error: {}{}", e, hint);
            }
        }
    }

    router.shutdown().await;
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(env_filter)
        .init();

    Ok(())
}
