//! HTTP front end
//!
//! One [`Workflow`] per browser session, looked up through the
//! `tgfav_session` cookie. Actions of one session run one at a time behind
//! its mutex; different sessions do not block each other.

pub mod cookie;
mod handlers;
pub mod pages;

use crate::session::BrowserSessionId;
use crate::workflow::{Services, Workflow};
use axum::routing::{get, post};
use axum::{middleware, Router};
use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;

/// Upper bound on concurrently tracked browser sessions
const MAX_BROWSER_SESSIONS: u64 = 10_000;

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    services: Services,
    workflows: Cache<BrowserSessionId, Arc<Mutex<Workflow>>>,
}

impl AppState {
    /// Workflows expire after `idle` without requests
    #[must_use]
    pub fn new(services: Services, idle: Duration) -> Self {
        let workflows = Cache::builder()
            .max_capacity(MAX_BROWSER_SESSIONS)
            .time_to_idle(idle)
            .build();
        Self { services, workflows }
    }

    /// Shared services
    #[must_use]
    pub const fn services(&self) -> &Services {
        &self.services
    }

    /// Workflow of `browser`, created on the landing screen if unknown
    pub async fn workflow(&self, browser: &BrowserSessionId) -> Arc<Mutex<Workflow>> {
        self.workflows
            .get_with(browser.clone(), async {
                Arc::new(Mutex::new(Workflow::new(browser.clone())))
            })
            .await
    }
}

/// Routes of the web UI
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/start", post(handlers::start))
        .route("/login", post(handlers::login))
        .route("/verify", post(handlers::verify))
        .route("/password", post(handlers::password))
        .route("/back", post(handlers::back))
        .route("/logout", post(handlers::logout))
        .route("/download/:id", get(handlers::download))
        .route("/archive", get(handlers::archive))
        .layer(middleware::from_fn(cookie::browser_session))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Serve until `shutdown` resolves, then let in-flight requests finish
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Web UI listening on http://{addr}");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
