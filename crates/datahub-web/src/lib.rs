use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Router, middleware,
    routing::{any, get},
};

use datahub_core::DataHub;

mod dto;
mod error;
mod handlers;
mod security;

#[cfg(test)]
mod tests;

#[derive(Clone)]
pub(crate) struct WebState {
    pub(crate) hub: Arc<DataHub>,
}

impl WebState {
    fn new(hub: DataHub) -> Self {
        Self { hub: Arc::new(hub) }
    }
}

/// Serve the hub over HTTP and block until ctrl-c.
///
/// # Errors
/// Returns an error when the runtime cannot be created, the socket cannot be
/// bound, or the server exits with a runtime failure.
pub fn serve_web(hub: DataHub, host: &str, port: u16) -> Result<()> {
    let state = WebState::new(hub);
    let bind_addr = format!("{host}:{port}");
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build web runtime")?;

    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind web server at {bind_addr}"))?;
        tracing::info!(addr = %listener.local_addr()?, "datahub listening");

        let worker = tokio::spawn(run_task_loop(Arc::clone(&state.hub)));
        let served = axum::serve(listener, app_router(state))
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
            .context("web server failed");
        worker.abort();
        served
    })
}

/// Drains the task queue on the blocking pool every poll interval.
async fn run_task_loop(hub: Arc<DataHub>) {
    let mut interval =
        tokio::time::interval(Duration::from_millis(hub.config().tasks.poll_ms));
    loop {
        interval.tick().await;
        let sweep = Arc::clone(&hub);
        match tokio::task::spawn_blocking(move || sweep.run_pending_tasks()).await {
            Ok(Ok(report)) if report.fetched > 0 => {
                tracing::debug!(
                    processed = report.processed,
                    retried = report.retried,
                    dead_lettered = report.dead_lettered,
                    "task sweep"
                );
            }
            Ok(Ok(_)) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "task sweep failed"),
            Err(err) => tracing::warn!(error = %err, "task sweep panicked"),
        }
    }
}

pub(crate) fn app_router(state: WebState) -> Router {
    Router::new()
        .route("/_matches", get(handlers::drain_matches))
        .route("/", any(handlers::dispatch_root))
        .route("/{*path}", any(handlers::dispatch_path))
        .layer(middleware::from_fn(security::security_headers_middleware))
        .with_state(state)
}
