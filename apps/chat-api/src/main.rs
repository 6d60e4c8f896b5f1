use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_api::chat::registry::RoomRegistry;
use chat_api::config::Config;
use chat_api::db::pg::PgChatStore;
use chat_api::db::store::ChatStore;
use chat_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing; env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    let db = chat_api::db::pool::connect(&config.database_url, config.db_pool_size);
    let store: Arc<dyn ChatStore> = Arc::new(PgChatStore::new(db));

    let idle_ttl = config.room_idle_ttl;
    let state = AppState::new(store, config);

    if let Some(ttl) = idle_ttl {
        tracing::info!(ttl_secs = ttl.as_secs(), "idle room pruning enabled");
        tokio::spawn(prune_idle_rooms(state.rooms.clone(), ttl));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(chat_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "chat-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

/// Periodically drop in-memory rooms nobody is in.
async fn prune_idle_rooms(rooms: Arc<RoomRegistry>, ttl: Duration) {
    let mut interval = tokio::time::interval(ttl.div_f32(2.0).max(Duration::from_secs(1)));
    interval.tick().await; // First tick fires immediately; skip it.
    loop {
        interval.tick().await;
        let removed = rooms.prune_idle(ttl);
        if removed > 0 {
            tracing::info!(removed, live = rooms.len(), "pruned idle rooms");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(?e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
