use dotenvy::dotenv;
use std::sync::Arc;
use tg_favorites::config::{SessionBackendKind, Settings};
use tg_favorites::logging;
use tg_favorites::session::{FileSessionStore, MemorySessionStore, SessionStore};
use tg_favorites::telegram::{ConnectionRegistry, GrammersBackend, TelegramClient};
use tg_favorites::web::{self, AppState};
use tg_favorites::workflow::Services;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Upper bound on stored Telegram sessions in the in-memory backend
const MAX_STORED_SESSIONS: u64 = 10_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenv().ok();

    logging::init();

    info!("Starting Telegram favorites downloader...");

    let settings = init_settings();
    let sessions = init_session_store(&settings);

    let registry = Arc::new(ConnectionRegistry::new());
    let backend = Arc::new(GrammersBackend::new(settings.api_id, settings.api_hash.clone()));
    let telegram = TelegramClient::new(backend, registry.clone());

    let services = Services {
        telegram,
        sessions,
        favorites_limit: settings.favorites_limit,
    };
    let state = AppState::new(services, settings.session_idle());

    let listener = TcpListener::bind(settings.socket_addr()?).await?;

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    web::serve(listener, state, shutdown.cancelled_owned()).await?;

    info!("Web server stopped, closing Telegram connections...");
    let remaining = registry.shutdown(settings.shutdown_grace()).await;
    if remaining > 0 {
        warn!(remaining, "Exiting with Telegram connections still open");
    }
    info!("Shutdown complete.");
    Ok(())
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!(
                bind_addr = %s.bind_addr,
                session_backend = ?s.session_backend,
                "Configuration loaded successfully."
            );
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_session_store(settings: &Settings) -> Arc<dyn SessionStore> {
    match settings.session_backend {
        SessionBackendKind::Memory => {
            info!("Using in-memory session store.");
            Arc::new(MemorySessionStore::new(settings.session_idle(), MAX_STORED_SESSIONS))
        }
        SessionBackendKind::File => {
            let dir = settings.session_dir();
            info!(dir = %dir.display(), "Using file session store.");
            Arc::new(FileSessionStore::new(dir))
        }
    }
}

/// Cancel `token` on Ctrl-C or SIGTERM
async fn watch_signals(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }
    token.cancel();
}
