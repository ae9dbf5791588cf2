//! Example consumer: a separate Rust project that serves tenant-aware routes with architect-tenant.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Requests are resolved by host (`acme.localhost:3000`) or by tenant id as the first path segment.

use architect_tenant::cli::build_state;
use architect_tenant::{common_routes_with_ready, tenant_routes, Settings};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("architect_tenant=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let state = build_state(&settings)?;

    let app = common_routes_with_ready(state.clone())
        .merge(tenant_routes(state))
        .layer(TraceLayer::new_for_http());
    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("Example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
