use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use dropconf::{DropConfig, StorageKind};
use tokio_util::sync::CancellationToken;

use qrdrop::{server, telemetry, SystemClock};

/// Share files between devices with a QR code.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web service (the default)
    Serve(ServeArgs),

    /// Print the effective configuration and where it came from
    Config {
        /// Config file to load instead of ./qrdrop.toml
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Config file to load instead of ./qrdrop.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Interface to bind
    #[arg(long)]
    host: Option<String>,

    /// Externally reachable base URL for download links
    #[arg(long)]
    public_url: Option<String>,

    /// Directory for the disk store
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Keep uploads in memory instead of on disk
    #[arg(long)]
    memory: bool,

    /// OTLP gRPC endpoint for OpenTelemetry (e.g., "127.0.0.1:4317")
    #[arg(long)]
    otlp_endpoint: Option<String>,
}

impl ServeArgs {
    fn apply(self, config: &mut DropConfig) {
        if let Some(port) = self.port {
            config.bind.port = port;
        }
        if let Some(host) = self.host {
            config.bind.host = host;
        }
        if let Some(public_url) = self.public_url {
            config.bind.public_url = public_url;
        }
        if let Some(data_dir) = self.data_dir {
            config.paths.data_dir = data_dir;
        }
        if self.memory {
            config.uploads.storage = StorageKind::Memory;
        }
        if let Some(endpoint) = self.otlp_endpoint {
            config.telemetry.otlp_endpoint = endpoint;
        }
    }
}

fn check_config_path(path: Option<&PathBuf>) -> Result<()> {
    if let Some(path) = path {
        if !path.is_file() {
            bail!("Config file not found: {}", path.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => serve(args).await,
        Command::Config { config } => print_config(config),
    }
}

fn print_config(config_path: Option<PathBuf>) -> Result<()> {
    check_config_path(config_path.as_ref())?;
    let (config, sources) = DropConfig::load_with_sources_from(config_path.as_deref())
        .context("Failed to load configuration")?;

    if sources.files.is_empty() {
        println!("# No config files found, using defaults");
    } else {
        println!("# Loaded from:");
        for file in &sources.files {
            println!("#   {}", file.display());
        }
    }
    if !sources.env_overrides.is_empty() {
        println!("# Environment overrides: {}", sources.env_overrides.join(", "));
    }
    println!();
    print!("{}", config.to_toml()?);

    config.validate().context("Configuration is invalid")?;
    Ok(())
}

async fn serve(args: ServeArgs) -> Result<()> {
    check_config_path(args.config.as_ref())?;
    let (mut config, sources) = DropConfig::load_with_sources_from(args.config.as_deref())
        .context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    telemetry::init(&config.telemetry).context("Failed to initialize telemetry")?;

    for file in &sources.files {
        tracing::info!("⚙️  Config: {}", file.display());
    }
    if !sources.env_overrides.is_empty() {
        tracing::info!("   Env overrides: {}", sources.env_overrides.join(", "));
    }

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        server::shutdown_signal().await;
        signal_token.cancel();
    });

    server::run(config, Arc::new(SystemClock), shutdown_token).await?;

    tracing::info!("Shutdown complete");

    // Shutdown OpenTelemetry and flush remaining spans
    telemetry::shutdown()?;

    Ok(())
}
