//! Web server module.
//!
//! JSON API over the session controller and the ping log.

mod handlers;

use crate::config::AppConfig;
use crate::scheduler::SessionManager;

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

/// Web server for pingwatch.
pub struct Server {
    config: AppConfig,
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: AppConfig, sessions: Arc<SessionManager>) -> Self {
        Self {
            config,
            state: AppState { sessions },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            .route(
                "/api/session",
                get(handlers::handle_get_session)
                    .post(handlers::handle_start_session)
                    .delete(handlers::handle_stop_session),
            )
            .route(
                "/api/logs",
                get(handlers::handle_get_logs).delete(handlers::handle_delete_logs),
            )
            .route("/api/logs/export", get(handlers::handle_export_logs))
            .route("/health", get(handlers::handle_health))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
            .with_state(self.state.clone())
    }

    /// Serve on the configured port until `shutdown` resolves.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
