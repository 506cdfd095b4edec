//! Codespace 실시간 방 동기화 서버

use codespace_sync::config::Config;
use codespace_sync::handlers;
use codespace_sync::server;
use codespace_sync::state::AppState;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = Arc::new(AppState::new(config.clone()));

    // 빈 방 정리 스케줄러
    let cleanup_state = state.clone();
    let cleanup_every = tokio::time::Duration::from_secs(config.room.cleanup_interval_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_every);
        loop {
            interval.tick().await;
            handlers::cleanup_idle_rooms(&cleanup_state);
        }
    });

    let app = server::router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 Codespace Sync Server started");
    tracing::info!("Address: {}", addr);
    tracing::info!("WebSocket: ws://{}/ws", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
