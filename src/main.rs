use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use pdfchat_backend::core::config::AppPaths;
use pdfchat_backend::core::logging;
use pdfchat_backend::server;
use pdfchat_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths).context("Failed to initialize logging")?;

    let state = match AppState::initialize(paths) {
        Ok(state) => state,
        Err(err) => {
            tracing::error!("Startup failed: {}", err);
            return Err(err.into());
        }
    };

    if let Err(err) = state.session.get_or_initialize().await {
        tracing::error!("Startup failed: {}", err);
        state.session.shutdown().await;
        return Err(err).context("Failed to build the retrieval session");
    }

    let bind_addr = format!("{}:{}", state.settings.server.host, state.settings.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    println!("PDFCHAT_PORT={}", addr.port());
    tracing::info!("Listening on http://{}", addr);

    let app: Router = server::router::router(state.clone());
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    tracing::info!("Shutting down");
    state.session.shutdown().await;
    served
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", err);
        std::future::pending::<()>().await;
    }
}
