//! Chat service entry point
//!
//! Loads configuration, wires the agent, guardrails, and trace client
//! together, and serves the HTTP API until SIGINT or SIGTERM.

use chatguard::agent::{AgentSettings, ChatAgent};
use chatguard::auth::TokenStore;
use chatguard::config::ServiceConfig;
use chatguard::guardrails::{ReadingTimeGuardrail, TopicGuardrail};
use chatguard::llm::provider::LlmProvider;
use chatguard::llm::providers::{OpenAiConfig, OpenAiProvider};
use chatguard::observability::init_default_logging;
use chatguard::server::{routes, AppState};
use chatguard::tools::builtin::WebSearchTool;
use chatguard::tools::ToolRegistry;
use chatguard::trace::TraceClient;
use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Demo chat service with an LLM agent and content guardrails
#[derive(Parser)]
#[command(name = "chatguard")]
#[command(about = "Chat service with an LLM agent, web search, and content guardrails")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    // Load .env before anything reads the environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_default_logging();

    info!("Starting chatguard v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_service(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Service shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(ServiceConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = vec!["service.toml", "config/service.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(ServiceConfig::load_from_file(&path)?);
                }
            }

            error!(
                "No configuration file found. Please provide one with -c/--config or create service.toml"
            );
            process::exit(1);
        }
    }
}

async fn run_service(config: ServiceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let provider = create_provider(&config);
    if provider.is_none() {
        warn!("No LLM provider available, replies will be rule-based");
    }

    let tools = Arc::new(build_tool_registry(&config).await);
    info!(tools = ?tools.list_tools(), "Tool registry ready");

    let agent = ChatAgent::new(
        provider.clone(),
        tools,
        AgentSettings {
            model: config.llm.model.clone(),
            system_prompt: config.llm.system_prompt.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        },
    );

    let topic_guard = TopicGuardrail::new(provider, config.llm.model.clone(), &config.guardrails);
    let reading_guard = ReadingTimeGuardrail::new(&config.guardrails);

    let trace = TraceClient::new(config.trace.as_ref());
    if trace.is_enabled() {
        info!("Trace exporter enabled");
    } else {
        info!("Trace exporter disabled, chat turns will report monitored=false");
    }

    let host: IpAddr = config.server.host.parse()?;
    let port = config.server.port;

    let state = Arc::new(AppState {
        config,
        tokens: TokenStore::new(),
        agent,
        topic_guard,
        reading_guard,
        trace,
    });

    let (addr, server) =
        warp::serve(routes(state)).bind_with_graceful_shutdown((host, port), shutdown_signal());

    info!("Listening on http://{}", addr);
    server.await;

    info!("Service shutdown initiated");
    Ok(())
}

/// Build the LLM provider from configuration. A missing API key is not
/// fatal: the agent falls back to rule-based replies.
fn create_provider(config: &ServiceConfig) -> Option<Arc<dyn LlmProvider>> {
    match config.llm.provider.as_str() {
        "openai" => {
            let api_key = match config.get_llm_api_key() {
                Ok(key) => key,
                Err(e) => {
                    warn!("LLM API key not available: {}", e);
                    return None;
                }
            };

            let openai_config = OpenAiConfig {
                api_key,
                ..Default::default()
            };

            match OpenAiProvider::new(openai_config) {
                Ok(provider) => Some(Arc::new(provider)),
                Err(e) => {
                    warn!("Failed to create OpenAI provider: {}", e);
                    None
                }
            }
        }
        provider => {
            warn!("Unsupported LLM provider: {}", provider);
            None
        }
    }
}

/// Register the web search tool when its API key is present. Without the
/// key the agent simply runs without tools.
async fn build_tool_registry(config: &ServiceConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    if config.get_search_api_key().is_ok() {
        let tool = WebSearchTool::new(config.search.clone());
        if let Err(e) = registry.register(Box::new(tool)).await {
            warn!("Failed to register web search tool: {}", e);
        }
    } else {
        warn!(
            env = %config.search.api_key_env,
            "Search API key not set, web search tool disabled"
        );
    }

    registry
}

async fn shutdown_signal() {
    let mut sigint = match signal::unix::signal(signal::unix::SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to install SIGINT handler: {}", e);
            return;
        }
    };
    let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            return;
        }
    };

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

fn handle_config_command(
    config: ServiceConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    info!("Configuration is valid");

    if show {
        let rendered = toml::to_string_pretty(&config)?;
        println!("{rendered}");
    }

    Ok(())
}
