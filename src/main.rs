//! Aurora MCP - Entry Point
//!
//! `serve` runs the relay the editor extension connects to.
//! `interpret` turns one prompt into an MCP command and can hand it to a
//! running relay.

use std::path::PathBuf;
use std::sync::Arc;

use aurora_mcp::core::config::Config;
use aurora_mcp::core::error::{McpError, Result};
use aurora_mcp::llm::{interpret, LlmClient};
use aurora_mcp::relay::{self, ConnectionSlot};
use clap::{Parser, Subcommand};
use tokio::runtime::Builder;

#[derive(Parser, Debug)]
#[command(name = "aurora-mcp")]
#[command(about = "Natural language to MCP commands for the Aurora editor")]
struct Cli {
    /// Optional TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the relay (HTTP submissions on /mcp, editor connection on /ws)
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Interpret a prompt and print the resulting command
    Interpret {
        prompt: String,

        /// Relay submission URL, e.g. http://localhost:3001/mcp
        #[arg(long)]
        submit: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("aurora_mcp=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    // Single cooperative event loop
    let rt = Builder::new_current_thread().enable_all().build()?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.relay.host = host;
            }
            if let Some(port) = port {
                config.relay.port = port;
            }
            rt.block_on(run_relay(config))
        }
        Commands::Interpret { prompt, submit } => {
            rt.block_on(run_interpret(config, &prompt, submit.as_deref()))
        }
    }
}

async fn run_relay(config: Config) -> Result<()> {
    let listener = relay::bind(&config.relay).await?;
    let slot = Arc::new(ConnectionSlot::new());

    tokio::select! {
        result = relay::serve(listener, slot) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("MCP relay shutting down");
            Ok(())
        }
    }
}

async fn run_interpret(config: Config, prompt: &str, submit: Option<&str>) -> Result<()> {
    let client = LlmClient::from_settings(&config.llm)?;
    tracing::info!(model = client.model(), "interpreting prompt");

    let command = interpret(&client, prompt).await?;
    println!("{}", serde_json::to_string_pretty(&command)?);

    if let Some(url) = submit {
        let response = reqwest::Client::new().post(url).json(&command).send().await?;
        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        println!("Relay responded {}: {}", status, body);
        if !status.is_success() {
            return Err(McpError::RelayRejected(
                body["reason"].as_str().unwrap_or("unknown").to_string(),
            ));
        }
    }

    Ok(())
}
