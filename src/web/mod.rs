//! Web server module.

mod handlers;

use crate::client::AstproxyClient;
use crate::config::ServerConfig;
use crate::poller::Poller;

use axum::{
    routing::{get, post},
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
    pub config: ServerConfig,
    pub client: AstproxyClient,
    pub poller: Arc<Poller<AstproxyClient>>,
}

/// Web server for queueboard.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(
        config: ServerConfig,
        client: AstproxyClient,
        poller: Arc<Poller<AstproxyClient>>,
    ) -> Self {
        Self {
            state: AppState {
                config,
                client,
                poller,
            },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            .route("/api/queues", get(handlers::handle_get_queues))
            .route("/api/summary", get(handlers::handle_summary))
            .route("/api/breakdown/{family}", get(handlers::handle_breakdown))
            .route("/api/history", get(handlers::handle_history))
            .route("/api/rank/queues", get(handlers::handle_rank_queues))
            .route("/api/rank/agents", get(handlers::handle_rank_agents))
            .route("/api/recall", get(handlers::handle_recall))
            .route("/api/alarms", get(handlers::handle_alarms))
            .route("/api/status", get(handlers::handle_status))
            .route("/api/refresh", post(handlers::handle_refresh))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Serve on the configured port until `shutdown` resolves.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
