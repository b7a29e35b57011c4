use anyhow::Context;
use audio_merge_backend::config::MergeConfig;
use audio_merge_backend::infrastructure::storage;
use audio_merge_backend::services::invocation::{InvocationEvent, handle_event};
use audio_merge_backend::{AppState, create_app};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::io::Read;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API server (default)
    Serve {
        /// Port for the API server
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
    /// Process one invocation event and print the response as JSON
    Invoke {
        /// Path to the event JSON, or "-" for stdin
        #[arg(short, long, default_value = "-")]
        event: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    // Logs go to stderr so `invoke` output stays machine-readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audio_merge_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = MergeConfig::from_env();
    info!(
        "🎛️  Merge Config: Bucket={}, Scratch={}, Max Keys={}, Timeout={}s",
        config.bucket,
        config.scratch_dir.display(),
        config.max_keys,
        config.request_timeout_secs
    );
    if config.api_key.is_none() {
        warn!("🔑 API_KEY is not set: every request will be rejected with 403");
    }

    let storage_service = storage::setup_storage(&config).await;
    let state = AppState::new(storage_service, config);

    match args.command.unwrap_or(Command::Serve { port: 3000 }) {
        Command::Serve { port } => serve(state, port).await,
        Command::Invoke { event } => invoke(state, &event).await,
    }
}

async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    info!("🚀 Starting Audio Merge Backend...");

    let app = create_app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ API Server listening on: http://0.0.0.0:{}", port);
    info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Backend exited cleanly.");
    Ok(())
}

async fn invoke(state: AppState, source: &str) -> anyhow::Result<()> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read event from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read event file {}", source))?
    };

    let event: InvocationEvent =
        serde_json::from_str(&raw).context("Event is not a valid invocation JSON object")?;
    let response = handle_event(&state.merge_service, &event).await;

    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
