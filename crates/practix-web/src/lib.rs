//! practix-web - JSON API and SSE server over the practix query service

pub mod error;
pub mod router;
pub mod sse;

pub use error::ApiError;
pub use router::create_router;

use anyhow::Result;
use practix_core::QueryService;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Run the web server
pub async fn run(service: Arc<QueryService>, port: u16) -> Result<()> {
    let router = create_router(service);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr).await?;

    info!("Web server listening on http://{}", addr);
    println!("Web server listening on http://{}", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
