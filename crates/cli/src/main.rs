use clap::{Parser, Subcommand};
use lib::auth::TokenProvider;
use lib::broadcast::{BroadcastMessage, Broadcaster};
use lib::channels::{ConnectorClient, TeamsClient};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "teams-bridge")]
#[command(about = "Microsoft Teams bot bridge", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the Bot Framework messaging endpoint and the broadcast triggers.
    Serve {
        /// Config file path (default: TEAMS_BRIDGE_CONFIG_PATH or ~/.teams-bridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 3978)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Post the broadcast message to every channel of the configured team once, then exit.
    Broadcast {
        /// Config file path (default: TEAMS_BRIDGE_CONFIG_PATH or ~/.teams-bridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Send the exec summary card instead of the image.
        #[arg(long)]
        execsum: bool,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("teams-bridge {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Broadcast { config, execsum }) => {
            if let Err(e) = run_broadcast(config, execsum).await {
                log::error!("broadcast failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{} (config {})",
        config.gateway.bind,
        config.gateway.port,
        path.display()
    );
    lib::gateway::run_gateway(config).await
}

async fn run_broadcast(config_path: Option<std::path::PathBuf>, execsum: bool) -> anyhow::Result<()> {
    let (config, _) = lib::config::load_config(config_path)?;
    let credentials = Arc::new(lib::config::resolve_app_credentials(&config));
    let connector = ConnectorClient::new(TokenProvider::new(credentials));
    let teams = TeamsClient::new(connector, config.broadcast.service_url.clone());
    let broadcaster = Broadcaster::new(Arc::new(teams), config.broadcast.failure_policy);

    let message = if execsum {
        BroadcastMessage::execsum(&config.broadcast)
    } else {
        BroadcastMessage::image(&config.broadcast)
    };
    let report = broadcaster.broadcast(&config.broadcast.team_id, &message).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.is_complete() {
        anyhow::bail!(
            "{} channel(s) failed, {} skipped",
            report.failed.len(),
            report.skipped.len()
        );
    }
    Ok(())
}
