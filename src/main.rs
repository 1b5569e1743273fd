use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vertex_gateway::backend::http_client;
use vertex_gateway::config::{config_search_paths, ResponseIds};
use vertex_gateway::{build_router, AppState, GatewayConfig, SharedLogger};

#[derive(Parser)]
#[command(
    name = "vertex-gateway",
    about = "OpenAI-compatible chat completions gateway for Vertex AI",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log file path
    #[arg(long, default_value = "vertex-gateway.log")]
    log_file: PathBuf,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env is fine; the variables may come from the real environment.
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vertex_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = GatewayConfig::find_and_load(cli.config.as_deref())?;

    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    // Both secrets are required; refuse to start without them.
    let secrets = config.resolve_secrets()?;
    let backend_base = config.backend_base()?;

    let logger = SharedLogger::new(&cli.log_file)?;

    info!("vertex-gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("  Backend:   {}", backend_base);
    match config.connect_timeout() {
        Some(timeout) => info!("  Connect:   {}s timeout", timeout.as_secs()),
        None => info!("  Connect:   no timeout"),
    }
    info!("  Bind:      {}", config.bind_addr());
    info!(
        "  Ids:       {}",
        match config.response.ids {
            ResponseIds::Placeholder => "placeholder (chatcmpl-xxxx, created=0)",
            ResponseIds::Unique => "unique per response",
        }
    );
    info!("  Log file:  {}", cli.log_file.display());

    logger.info(
        "startup",
        format!(
            "Starting vertex-gateway backend={} bind={}",
            config.backend.base_url,
            config.bind_addr()
        ),
    );

    let client = http_client(&config)?;

    let bind_addr = config.bind_addr();
    let state = Arc::new(AppState {
        config,
        secrets,
        client,
        logger,
    });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
