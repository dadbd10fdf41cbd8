// src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use neural_core::backend::diagnostics;
use neural_core::config::CoreConfig;
use neural_core::server;
use neural_core::state::create_app_state;

#[derive(Parser)]
#[command(name = "neural-core")]
#[command(about = "Personal agent backend: specialist delegation over resilient LLM backends", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway (default)
    Serve {
        /// Bind host (overrides HOST)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run a single message through the orchestrator and print the reply
    Ask {
        #[arg(long, default_value = "cli")]
        platform: String,

        #[arg(long, default_value = "local")]
        channel: String,

        #[arg(long, env = "USER", default_value = "owner")]
        user: String,

        /// Message text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Print provider credential diagnostics
    Diagnostics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CoreConfig::from_env();

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.tracing_level())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            info!("Starting neural-core {}", env!("CARGO_PKG_VERSION"));
            let state = create_app_state(config).await?;
            server::serve(state).await?;
        }
        Command::Ask {
            platform,
            channel,
            user,
            text,
        } => {
            let state = create_app_state(config).await?;
            let reply = state
                .orchestrator
                .process(&platform, &channel, &user, &text.join(" "))
                .await;
            println!("{}", reply);
        }
        Command::Diagnostics => {
            println!("Preferred provider: {}", config.preferred_provider);
            for diag in diagnostics(&config) {
                println!(
                    "{:<12} {:<20} configured={:<5} preferred={:<5} {}",
                    diag.provider, diag.source_key, diag.configured, diag.preferred, diag.notes
                );
            }
        }
    }

    Ok(())
}
