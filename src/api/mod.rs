//! Read-only HTTP API over the persisted catalog.

pub mod handlers;
pub mod routes;
pub mod types;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use handlers::AppState;
use routes::create_router;

/// Serves the catalog at `catalog_path` until `shutdown` resolves.
pub async fn serve<F>(
    host: &str,
    port: u16,
    catalog_path: PathBuf,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    if !catalog_path.exists() {
        warn!(
            "{} not found! Run the scrape command first to populate product data.",
            catalog_path.display()
        );
    }

    let app = create_router(AppState { catalog_path: Arc::new(catalog_path) });
    let listener = TcpListener::bind(&addr).await?;
    info!("Server available at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP server stopped");
    Ok(())
}
