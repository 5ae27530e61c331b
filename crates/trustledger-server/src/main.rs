//! `trustledger-server [CONFIG_PATH]`
//!
//! Serves the TrustLedger registries over HTTP until SIGINT or SIGTERM.
//! Exits non-zero if the configuration is unusable, the ledger store cannot
//! be opened, or the listener cannot bind.

use std::net::SocketAddr;
use std::process::ExitCode;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use trustledger_db::PoolError;
use trustledger_server::config::{self, Config, LoggingConfig};
use trustledger_server::{app, AppState};

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Ledger(#[from] PoolError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn serve(config: Config) -> Result<(), StartupError> {
    let state = AppState::open(&config.database)?;
    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;

    tracing::info!(%addr, ledger = %config.database.path, "trustledger listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(StartupError::Serve)
}

#[tokio::main]
async fn main() -> ExitCode {
    let (path, source) = config::resolve_config_path(
        std::env::args().nth(1),
        std::env::var("TRUSTLEDGER_CONFIG_PATH").ok(),
    );
    let config = match config::load_config(Some(&path)) {
        Ok(config) => config,
        Err(e) => {
            // No subscriber yet: the log level comes from this file.
            eprintln!("trustledger-server: {path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.logging);
    tracing::info!(path = %path, source = source.as_str(), "configuration loaded");

    match serve(config).await {
        Ok(()) => {
            tracing::info!("trustledger server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "trustledger server failed");
            ExitCode::FAILURE
        }
    }
}

/// Resolves once SIGINT or, on Unix, SIGTERM arrives. In-flight requests
/// are drained by `axum::serve` afterwards.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "SIGINT handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => tracing::info!(signal = "SIGINT", "shutting down"),
        () = terminate => tracing::info!(signal = "SIGTERM", "shutting down"),
    }
}
