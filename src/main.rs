use anyhow::Context;
use clap::{Parser, Subcommand};
use env_logger::Env;
use newsroom::agent::llm::ModelProvider;
use newsroom::agent::Orchestrator;
use newsroom::aggregator::Aggregator;
use newsroom::cli::{render_turn, Session};
use newsroom::config::AppConfig;
use newsroom::server::{self, AppState};
use newsroom::speech::voice::Speaker;
use newsroom::speech::Transcriber;
use std::env;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "newsroom", version, about = "Conversational news assistant")]
struct Cli {
    /// Language model provider: groq or openai
    #[arg(long, global = true)]
    provider: Option<ModelProvider>,
    /// Conversation thread to use
    #[arg(long, global = true)]
    thread: Option<String>,
    /// Start every turn from an empty conversation
    #[arg(long, global = true)]
    no_memory: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive conversation (default)
    Chat,
    /// Ask a single question and print the answer
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse the specified (or default) .env file
    let dotenv_path = env::var("NEWSROOM_DOTENV_PATH").unwrap_or_else(|_| ".env".to_string());
    let dotenv_result = dotenvy::from_path(&dotenv_path);

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match dotenv_result {
        Ok(()) => log::info!("Loaded env from {}", dotenv_path),
        Err(err) => log::debug!("No .env loaded from {}: {}", dotenv_path, err),
    }

    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("Reading configuration")?;
    if let Some(provider) = cli.provider {
        config.llm.provider = Some(provider);
        config.llm.validate().context("Selecting model provider")?;
    }
    if cli.no_memory {
        config.agent.memory_enabled = Some(false);
    }
    for var in config.missing_optional_keys() {
        log::warn!("{} is not set; providers using it are disabled", var);
    }

    let config = Arc::new(config);
    let aggregator = Arc::new(Aggregator::from_config(&config));
    let transcriber =
        Arc::new(Transcriber::from_config(&config.speech).context("Configuring speech")?);
    let orchestrator = Arc::new(
        Orchestrator::from_config(&config, aggregator, transcriber.clone())
            .context("Configuring the assistant")?,
    );

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let mut session = Session::new(
                orchestrator,
                transcriber,
                Speaker::from_config(&config.speech),
            )
            .with_provider(cli.provider);
            if let Some(thread) = cli.thread {
                session = session.with_thread(thread);
            }
            session.run().await?;
        }
        Commands::Ask { question } => {
            let turn = orchestrator
                .respond(&question.join(" "), cli.thread.as_deref())
                .await?;
            println!("{}", render_turn(&turn));
        }
        Commands::Serve { host, port } => {
            let mut server_config = config.server.clone();
            if host.is_some() {
                server_config.host = host;
            }
            if port.is_some() {
                server_config.port = port;
            }
            let state = AppState {
                orchestrator,
                transcriber,
            };
            server::serve(state, &server_config.addr()).await?;
        }
    }
    Ok(())
}
