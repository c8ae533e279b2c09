use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lug_directory::{
    build_router,
    cli::{Cli, Command, clamp_notice},
    config::{AppConfig, StoreBackend},
    dispatch::Dispatcher,
    state::AppState,
    store::{GroupStore, InMemoryGroupStore, SqliteGroupStore},
    token::TokenGenerator,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("failed to load application configuration")?;

    match cli.command() {
        Command::Serve { port, backend } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(backend) = backend {
                config.store_backend = backend;
            }
            serve(config).await
        }
        Command::InitDb => init_db(&config).await,
        Command::Token { length, count } => {
            print_tokens(&config, length, count);
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    let store = open_store(&config).await?;
    store
        .init()
        .await
        .context("failed to initialize group schema")?;

    let dispatcher = Dispatcher::new(store)
        .with_tokens(token_generator(&config))
        .with_store_timeout(config.store_timeout);

    let shutdown = CancellationToken::new();
    let app = build_router(AppState::with_shutdown(dispatcher, shutdown.clone()));

    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(address = %addr, backend = ?config.store_backend, "lug directory started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("shutdown requested, cancelling in-flight requests");
            shutdown.cancel();
        })
        .await
        .context("server error")?;

    Ok(())
}

async fn init_db(config: &AppConfig) -> Result<()> {
    let store = SqliteGroupStore::open(&config.database_url, config.db_max_connections)
        .await
        .with_context(|| format!("failed to open {}", config.database_url))?;
    store
        .init()
        .await
        .context("failed to apply migrations")?;
    info!(database = %config.database_url, "schema ready");
    Ok(())
}

fn print_tokens(config: &AppConfig, length: usize, count: usize) {
    if let Some(notice) = clamp_notice(length) {
        warn!("{notice}");
    }

    let generator = token_generator(config);
    for _ in 0..count {
        match generator.generate(length) {
            Ok(token) => println!("{token}"),
            Err(err) => error!(error = %err, "token generation failed"),
        }
    }
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn GroupStore>> {
    let store: Arc<dyn GroupStore> = match config.store_backend {
        StoreBackend::Memory => {
            info!("store backend: memory");
            Arc::new(InMemoryGroupStore::new())
        }
        StoreBackend::Sqlite => {
            info!(database = %config.database_url, "store backend: sqlite");
            let store = SqliteGroupStore::open(&config.database_url, config.db_max_connections)
                .await
                .context("failed to connect to SQLite")?;
            Arc::new(store)
        }
    };
    Ok(store)
}

fn token_generator(config: &AppConfig) -> TokenGenerator {
    match &config.token_salt {
        Some(salt) => TokenGenerator::system().with_salt(salt.clone()),
        None => TokenGenerator::system(),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lug_directory=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
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
}
