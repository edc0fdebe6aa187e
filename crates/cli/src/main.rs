mod uploads_commands;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
    wabridge_config::BridgeConfig,
    wabridge_whatsapp::{WhatsAppWebClient, WhatsAppWebOptions, qr},
};

#[derive(Parser)]
#[command(name = "wabridge", about = "wabridge: HTTP bridge to a WhatsApp Web session")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP bridge and the WhatsApp session.
    Serve {
        /// Config file; defaults to the discovered `wabridge.*`.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Inspect and prune stored uploads.
    Uploads {
        #[command(subcommand)]
        action: uploads_commands::UploadsAction,
    },
    /// Render a payload as a terminal QR code.
    Qr { payload: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print where the user-global config file lives.
    Path,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Explicit file, else discovery; environment overrides apply last.
pub(crate) fn load_config(path: Option<PathBuf>) -> anyhow::Result<BridgeConfig> {
    let mut config = match path {
        Some(path) => wabridge_config::load_config(&path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => wabridge_config::discover_and_load(),
    };
    wabridge_config::apply_env_overrides(&mut config);
    Ok(config)
}

async fn serve(config: Option<PathBuf>, bind: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = load_config(config)?;
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let client = Arc::new(WhatsAppWebClient::new(WhatsAppWebOptions {
        session_dir: config.whatsapp.session_dir.clone(),
        device_name: config.whatsapp.device_name.clone(),
    }));
    wabridge_gateway::start_gateway(config, client).await
}

fn show_config(path: Option<PathBuf>) -> anyhow::Result<()> {
    let mut config = load_config(path)?;
    if config.server.api_token.is_some() {
        config.server.api_token = Some("********".into());
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "wabridge starting");

    match cli.command {
        Commands::Serve { config, bind, port } => serve(config, bind, port).await,
        Commands::Config { action } => match action {
            ConfigAction::Show { config } => show_config(config),
            ConfigAction::Path => {
                match wabridge_config::config_dir() {
                    Some(dir) => println!("{}", dir.join("wabridge.toml").display()),
                    None => eprintln!("no home directory found"),
                }
                Ok(())
            },
        },
        Commands::Uploads { action } => uploads_commands::handle_uploads(action).await,
        Commands::Qr { payload } => {
            println!("{}", qr::render_terminal(&payload)?);
            Ok(())
        },
    }
}
