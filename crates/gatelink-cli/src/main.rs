//! gatelink CLI
//!
//! Hosts a link network for a set of configured game servers.

mod config;
mod server;

use clap::{Parser, Subcommand};
use gatelink_core::peer::EmptyRegistry;
use gatelink_core::{PROTOCOL_TIMEOUT, Peer, PeerRegistry};
use gatelink_transport::Network;
use rand::RngCore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

use config::Config;
use server::Servers;

/// Version reported to remote servers during the handshake
const PLUGIN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// gatelink - trusted link between game servers
#[derive(Parser)]
#[command(name = "gatelink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "gatelink.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for and link with every configured server
    Run,

    /// Round-trip a ping to one configured server
    Ping {
        /// Server name
        #[arg(required = true)]
        server: String,

        /// How long to wait for the link to come up (seconds)
        #[arg(long, default_value_t = 10)]
        wait: u64,
    },

    /// Show configuration
    Status,

    /// Generate a random network key
    Keygen,

    /// Ban remote addresses matching a pattern
    Ban {
        /// Regular expression matched against the whole IP address
        #[arg(required = true)]
        pattern: String,
    },

    /// Lift an address ban
    Unban {
        /// Pattern previously added with `ban`
        #[arg(required = true)]
        pattern: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        Some(Config::load(&cli.config)?)
    } else {
        None
    };

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config
            .as_ref()
            .map_or_else(|| "info".to_string(), |c| c.logging.level.clone())
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    if let Commands::Keygen = cli.command {
        return generate_key();
    }

    let Some(config) = config else {
        anyhow::bail!("Configuration file not found: {}", cli.config.display());
    };
    config.validate()?;

    match cli.command {
        Commands::Run => run(config).await?,
        Commands::Ping { server, wait } => ping(config, server, Duration::from_secs(wait)).await?,
        Commands::Status => show_status(&config),
        Commands::Ban { pattern } => ban(config, &cli.config, &pattern)?,
        Commands::Unban { pattern } => unban(config, &cli.config, &pattern)?,
        Commands::Keygen => {}
    }

    Ok(())
}

/// Start the network and link with all enabled servers until Ctrl+C
async fn run(config: Config) -> anyhow::Result<()> {
    let (network, servers) = start_network(&config)?;
    servers.connect_all();

    println!("gatelink v{}", PLUGIN_VERSION);
    if let Some(addr) = network.local_addr() {
        println!("Listening on: {}", addr);
    }
    println!("Servers: {}", servers.iter().count());
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");

    stop_network(network, &servers).await
}

/// Link with one server and time a ping request
async fn ping(config: Config, name: String, wait: Duration) -> anyhow::Result<()> {
    let (network, servers) = start_network(&config)?;
    let Some(server) = servers.get(&name) else {
        stop_network(network, &servers).await?;
        anyhow::bail!("Unknown server: {}", name);
    };
    server.connect();

    let deadline = Instant::now() + wait;
    while !server.is_connection_connected() {
        if Instant::now() >= deadline {
            stop_network(network, &servers).await?;
            anyhow::bail!("Server '{}' did not connect within {:?}", name, wait);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let pinger = Arc::clone(&server);
    let result = tokio::task::spawn_blocking(move || pinger.ping(PROTOCOL_TIMEOUT)).await?;
    match result {
        Ok(elapsed) => println!("ping to '{}' took {} millis", name, elapsed.as_millis()),
        Err(e) => println!("ping to '{}' failed: {}", name, e),
    }
    if let Some(version) = server.remote_version() {
        println!("remote version: {}", version);
    }

    stop_network(network, &servers).await
}

fn start_network(config: &Config) -> anyhow::Result<(Arc<Network>, Arc<Servers>)> {
    let servers = Servers::from_config(config, tokio::runtime::Handle::current());
    let network = Arc::new(Network::new(
        config.network.clone(),
        Arc::clone(&servers) as Arc<dyn PeerRegistry>,
        PLUGIN_VERSION,
    ));
    servers.attach(&network);
    network.start()?;
    Ok((network, servers))
}

async fn stop_network(network: Arc<Network>, servers: &Servers) -> anyhow::Result<()> {
    servers.disconnect_all();
    tokio::task::spawn_blocking(move || network.stop()).await??;
    Ok(())
}

/// Show configuration
fn show_status(config: &Config) {
    println!("gatelink Status");
    println!("Version: {}", PLUGIN_VERSION);
    println!();

    println!("Network:");
    println!(
        "  Listen: {}",
        config.network.listen_address.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  Key: {}",
        if config.network.effective_key().is_some() {
            "set"
        } else {
            "(not set)"
        }
    );
    println!("  Reconnect interval: {} ms", config.network.reconnect_interval_ms);
    println!("  Reconnect skew: {} ms", config.network.reconnect_skew_ms);
    println!();

    println!("Servers:");
    if config.servers.is_empty() {
        println!("  (none)");
    }
    for server in &config.servers {
        println!(
            "  {} -> {}{}",
            server.name,
            server.address,
            if server.enabled { "" } else { " (disabled)" }
        );
    }
    println!();

    println!("Banned addresses:");
    if config.network.banned_addresses.is_empty() {
        println!("  (none)");
    }
    for pattern in &config.network.banned_addresses {
        println!("  {}", pattern);
    }
}

/// Generate a random network key
fn generate_key() -> anyhow::Result<()> {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    println!("{}", hex::encode(bytes));
    Ok(())
}

/// Add a ban pattern to the configuration file
fn ban(mut config: Config, path: &Path, pattern: &str) -> anyhow::Result<()> {
    let network = Network::new(config.network.clone(), Arc::new(EmptyRegistry), PLUGIN_VERSION);
    if !network.add_banned_address(pattern)? {
        println!("Pattern '{}' is already banned", pattern);
        return Ok(());
    }
    config.network = network.config();
    config.save(path)?;
    println!("Banned '{}'", pattern);
    Ok(())
}

/// Remove a ban pattern from the configuration file
fn unban(mut config: Config, path: &Path, pattern: &str) -> anyhow::Result<()> {
    let network = Network::new(config.network.clone(), Arc::new(EmptyRegistry), PLUGIN_VERSION);
    if !network.remove_banned_address(pattern) {
        println!("Pattern '{}' is not banned", pattern);
        return Ok(());
    }
    config.network = network.config();
    config.save(path)?;
    println!("Unbanned '{}'", pattern);
    Ok(())
}
