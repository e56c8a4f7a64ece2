use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use parkin_gateway::config::fleet::FleetFile;
use parkin_gateway::daemon::{mesh_transport, peek_registry};
use parkin_gateway::{Config, Daemon, Dispatcher, Error, NodeId};

/// Parkin - control gateway for Bluetooth mesh lamp fleets
#[derive(Parser)]
#[command(name = "parkin", version, about)]
struct Cli {
    /// Address to bind the HTTP API to
    #[arg(long, env = "PARKIN_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PARKIN_PORT")]
    port: Option<u16>,

    /// Fleet file listing node IDs and slots
    #[arg(long, env = "PARKIN_FLEET_FILE")]
    fleet_file: Option<PathBuf>,

    /// Mesh command used to reach the lamps
    #[arg(long, env = "PARKIN_MESH_COMMAND")]
    mesh_command: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default fleet file
    InitFleet {
        /// Number of lamps, numbered from 1
        #[arg(short, long)]
        size: Option<u32>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Send one color command and report the outcome
    Send {
        /// Target node ID
        node_id: NodeId,
        /// Color (red, green or purple)
        color: String,
    },
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when set
    let filter = match cli.verbose {
        0 => "info,parkin_gateway=info",
        1 => "info,parkin_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(host) = cli.host {
        config.api_server.host = host;
    }
    if let Some(port) = cli.port {
        config.api_server.port = port;
    }
    if let Some(path) = cli.fleet_file {
        config.fleet.path = path;
    }
    if let Some(command) = cli.mesh_command {
        config.mesh.command = command;
    }
    config.validate()?;

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::InitFleet { size, force } => init_fleet(&config, size, force),
            Command::Send { node_id, color } => send(&config, node_id, &color).await,
            Command::ShowConfig => {
                println!("{config:#?}");
                Ok(())
            }
        };
    }

    tracing::info!(
        addr = %config.bind_addr(),
        fleet_file = %config.fleet.path.display(),
        mesh_command = %config.mesh.command,
        "starting parkin gateway"
    );

    let daemon = Daemon::new(config)?;
    daemon.run().await?;

    Ok(())
}

/// Write a default fleet file
fn init_fleet(config: &Config, size: Option<u32>, force: bool) -> anyhow::Result<()> {
    let path = &config.fleet.path;
    if path.exists() && !force {
        anyhow::bail!(
            "fleet file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }

    let size = size.unwrap_or(config.fleet.default_size);
    if size == 0 {
        anyhow::bail!("fleet size must be at least 1");
    }

    FleetFile::default_fleet(size).save(path)?;
    println!("Wrote {size} lamps to {}", path.display());
    Ok(())
}

/// Send one command through the configured transport
async fn send(config: &Config, node_id: NodeId, color: &str) -> anyhow::Result<()> {
    let registry = Arc::new(peek_registry(&config.fleet)?);
    let transport = Arc::new(mesh_transport(config));
    let dispatcher = Dispatcher::new(Arc::clone(&registry), transport, config.mesh.timeout);

    let result = dispatcher.dispatch(node_id, color).await;
    match result {
        Ok(ack) => {
            println!("Node {} set to {} at {}", ack.node_id, ack.color, ack.updated_at.to_rfc3339());
            Ok(())
        }
        Err(e) => {
            if !e.is_validation()
                && let Ok(state) = registry.get(node_id)
            {
                println!("Node {node_id} is now {}", state.health);
            }
            Err(Error::from(e).into())
        }
    }
}
