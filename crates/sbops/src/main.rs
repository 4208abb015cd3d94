use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config/sbops.toml";

#[derive(Parser, Debug)]
#[command(
    name = "sbops",
    about = "Fund operations agents - a manager that checks on and restarts trading bots through an operator"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: String,

    /// Override the MCP server SSE URL
    #[arg(long)]
    mcp_url: Option<String>,

    /// Override the model for both agents (e.g. google-gla:gemini-2.0-flash)
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = sbops::load_config(Path::new(&cli.config), cli.config != DEFAULT_CONFIG)?;
    if let Some(url) = cli.mcp_url {
        config.mcp.url = url;
    }
    if let Some(model) = cli.model {
        config.model.name = model;
        config.agents.operator_model = None;
        config.agents.manager_model = None;
    }

    let team = sbops::connect(&config).await?;

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Received shutdown signal");
        signal.cancel();
    });

    let result = sbops::repl::run_repl(
        &team.manager,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        cancel,
    )
    .await;

    team.shutdown().await;
    result.map(|_| ())
}
