use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quota_gateway::config::{Args, register_policies, resolve_policies};
use quota_gateway::handlers::{admin_router, router};
use quota_gateway::state::AppState;
use quota_gateway::sweeper::sweeper;
use quota_gateway::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quota_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // parse cli arguments
    let args = Args::parse();

    // one limiter for the process, policies registered before serving
    let limiter = Arc::new(RateLimiter::new());
    let policies = resolve_policies(args.policies.as_deref())?;
    register_policies(&limiter, policies)?;

    if args.sweep_interval > 0 {
        tokio::spawn(sweeper(
            Arc::clone(&limiter),
            Duration::from_secs(args.sweep_interval),
        ));
    }

    let state = Arc::new(AppState::new(limiter));

    // state-changing routes stay off the public listener
    if let Some(admin_port) = args.admin_port {
        let admin_addr = SocketAddr::from(([127, 0, 0, 1], admin_port));
        let admin_listener = tokio::net::TcpListener::bind(admin_addr).await?;
        let admin_app = admin_router(Arc::clone(&state)).layer(TraceLayer::new_for_http());
        info!("admin routes listening on http://{}", admin_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(admin_listener, admin_app).await {
                error!("admin listener stopped: {e}");
            }
        });
    }

    let app = router(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("quota gateway listening on http://{}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
