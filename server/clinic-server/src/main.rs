use clap::{Parser, Subcommand};
use std::env;
use tracing::{info, Level};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use clinic_server::{create_app, seed, ClinicServer, ServerConfig};
use error_common::{log_error, ClinicError, Result};

/// Clinic management HTTP server
#[derive(Parser, Debug)]
#[command(name = "clinic-server")]
#[command(about = "Patient records, histories, prescriptions and invoices API")]
struct Args {
    /// Configuration file path (extension optional)
    #[arg(short, long, default_value = "clinic-server")]
    config: String,

    /// Server bind address, overrides HOST
    #[arg(long)]
    host: Option<String>,

    /// Server port, overrides PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Apply migrations and serve the API (default)
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Apply migrations and insert sample data
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the environment may already be set
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        log_error("startup", &e);
        return Err(e);
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let mut config = ServerConfig::load(Some(&args.config))
        .map_err(|e| ClinicError::ConfigError(e.to_string()))?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting clinic server");
    tracing::debug!(config = ?config, "Configuration loaded");

    let server = ClinicServer::new(config)
        .await
        .map_err(|e| ClinicError::DatabaseError(format!("{:#}", e)))?;

    server
        .database
        .run_migrations()
        .await
        .map_err(|e| ClinicError::DatabaseError(e.to_string()))?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            info!("Migrations applied");
            Ok(())
        }
        Command::Seed => {
            seed::run(&server)
                .await
                .map_err(|e| ClinicError::DatabaseError(format!("Seed failed: {:#}", e)))?;
            Ok(())
        }
        Command::Serve => serve(server).await,
    }
}

async fn serve(server: ClinicServer) -> Result<()> {
    let addr = server.config.bind_address();
    let database = server.database.clone();
    let app = create_app(server);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ClinicError::NetworkError(format!("Failed to bind to {}: {}", addr, e)))?;

    info!("Clinic server running on http://{}", addr);
    info!("Health check available at: http://{}/api/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ClinicError::ServerError(format!("HTTP server error: {}", e)))?;

    database.close().await;
    info!("Clinic server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let is_production = env::var("CLINIC_ENV")
        .map(|v| v.eq_ignore_ascii_case("production"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("clinic_server={},tower_http=info,sqlx=warn", level).into()
    });

    if is_production {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_line_number(true),
            )
            .init();
    }
}
