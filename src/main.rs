use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

use live_odds_proxy::{app, monitoring, types::AppConfig};

#[derive(Parser, Debug)]
#[command(name = "live-odds-proxy")]
#[command(about = "Live match odds and stats aggregation proxy", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.toml")]
    config: String,

    /// Override the HTTP listen port
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the refresh scheduler and the HTTP API
    Serve {},
    /// Run a single refresh cycle and print the snapshot as JSON
    Refresh {},
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "live_odds_proxy=debug,proxy=debug,info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(target: "proxy", "live-odds-proxy starting");

    let cli = Cli::parse();
    tracing::debug!(target: "proxy", config = %cli.config, "loading config");

    let mut settings = AppConfig::from_file(&cli.config)?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    tracing::info!(
        target: "proxy",
        config = %cli.config,
        sports = settings.sports.len(),
        gamma_api = %settings.upstream.gamma_api,
        sofascore_api = %settings.upstream.sofascore_api,
        "config loaded"
    );

    match cli.command.unwrap_or(Commands::Serve {}) {
        Commands::Serve {} => {
            monitoring::logger::log_startup(&settings);
            app::run_server(settings).await?;
        }
        Commands::Refresh {} => {
            app::refresh_and_print(settings).await?;
        }
    }

    Ok(())
}
