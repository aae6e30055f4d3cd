use clap::{Parser, Subcommand};
use ferrous_doh_domain::CliOverrides;
use tracing::info;

mod bootstrap;
mod commands;
mod di;

#[derive(Parser)]
#[command(name = "ferrous-doh")]
#[command(version)]
#[command(about = "Ferrous DoH - DNS-over-HTTPS tunnel with certificate pinning")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// DoH endpoint URL (https://host[:port]/path)
    #[arg(short = 'e', long, value_name = "URL", global = true)]
    endpoint: Option<String>,

    /// Certificate pin store path
    #[arg(long, value_name = "FILE", global = true)]
    pin_store: Option<String>,

    /// Mark outgoing DoH sockets with SO_MARK so policy routing keeps them
    /// out of the tunnel
    #[arg(long, value_name = "MARK", global = true)]
    fwmark: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tunnel session until interrupted; SIGHUP reloads the config
    Run {
        /// Tunnel device: `fd:<n>` for a host-provided descriptor, or a TUN
        /// interface name
        #[arg(short = 'd', long, value_name = "SPEC")]
        device: Option<String>,
    },

    /// Fetch the endpoint certificate and pin its fingerprint
    Pin,

    /// Remove the stored pin for the endpoint host
    Unpin,

    /// Print the presented and pinned fingerprints of the endpoint
    Fingerprint,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let device = match &cli.command {
        Commands::Run { device } => device.clone(),
        _ => None,
    };
    let cli_overrides = CliOverrides {
        endpoint: cli.endpoint.clone(),
        device,
        pin_store_path: cli.pin_store.clone(),
        log_level: cli.log_level.clone(),
    };

    let config = bootstrap::load_config(cli.config.as_deref(), cli_overrides.clone())?;

    bootstrap::init_logging(&config.logging);

    let services = di::Services::new(&config, cli.fwmark)?;

    match cli.command {
        Commands::Run { .. } => {
            info!("Starting Ferrous DoH v{}", env!("CARGO_PKG_VERSION"));
            commands::run(&services, config, cli.config.as_deref(), cli_overrides).await
        }
        Commands::Pin => commands::pin(&services, &config).await,
        Commands::Unpin => commands::unpin(&services, &config),
        Commands::Fingerprint => commands::fingerprint(&services, &config).await,
    }
}
