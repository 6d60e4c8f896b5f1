#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Once};
use std::time::Duration;

use axum::Router;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use diesel_migrations::MigrationHarness;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::{tungstenite, MaybeTlsStream, WebSocketStream};

use chat_api::config::{with_test_db_suffix, Config};
use chat_api::db::pg::PgChatStore;
use chat_api::db::pool::DbPool;
use chat_api::db::schema::{rooms, users};
use chat_api::db::store::MemoryChatStore;
use chat_api::db::MIGRATIONS;
use chat_api::AppState;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build a test AppState over the in-memory store.
pub fn test_state() -> (AppState, Arc<MemoryChatStore>) {
    let store = Arc::new(MemoryChatStore::new());
    let config = Config {
        database_url: "postgres://unused/chat_test".to_string(),
        port: 0,
        db_pool_size: 1,
        room_idle_ttl: None,
    };
    (AppState::new(store.clone(), config), store)
}

pub fn test_app() -> (Router, AppState, Arc<MemoryChatStore>) {
    let (state, store) = test_state();
    let app = chat_api::routes::router().with_state(state.clone());
    (app, state, store)
}

/// Start an actual TCP server for WebSocket testing. The server runs in the
/// background.
pub async fn start_ws_server() -> (SocketAddr, AppState, Arc<MemoryChatStore>) {
    let (app, state, store) = test_app();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state, store)
}

pub async fn connect(addr: SocketAddr, room: &str) -> WsClient {
    let url = format!("ws://{addr}/chat/{room}");
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws
}

pub async fn send_json(ws: &mut WsClient, value: serde_json::Value) {
    ws.send(tungstenite::Message::Text(value.to_string().into()))
        .await
        .expect("ws send");
}

pub async fn join(ws: &mut WsClient, name: &str, receiver: &str) {
    send_json(
        ws,
        serde_json::json!({ "type": "join", "name": name, "receiver": receiver }),
    )
    .await;
}

/// Read the next text frame as JSON, failing after 5 seconds.
pub async fn recv_json(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream ended")
            .expect("ws read error");
        if let tungstenite::Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("parse message");
        }
    }
}

/// Read frames until one has the given `type`.
pub async fn recv_type(ws: &mut WsClient, kind: &str) -> serde_json::Value {
    loop {
        let value = recv_json(ws).await;
        if value["type"] == kind {
            return value;
        }
    }
}

/// Poll until `check` holds, failing after 5 seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(time::Instant::now() < deadline, "condition not met in time");
        time::sleep(Duration::from_millis(10)).await;
    }
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

static MIGRATE: Once = Once::new();

/// Connect to the `_test` variant of `DATABASE_URL` and bring its schema up
/// to date. Returns `None` when no database is configured.
pub async fn pg_store() -> Option<(DbPool, Arc<PgChatStore>)> {
    let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(env_path);

    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping Postgres-backed test");
        return None;
    };
    let database_url = with_test_db_suffix(&database_url);

    let url = database_url.clone();
    tokio::task::spawn_blocking(move || {
        MIGRATE.call_once(|| {
            let mut conn = PgConnection::establish(&url).expect("connect to test database");
            conn.run_pending_migrations(MIGRATIONS)
                .expect("run migrations");
        });
    })
    .await
    .expect("migration task");

    let db = chat_api::db::pool::connect(&database_url, 4);
    Some((db.clone(), Arc::new(PgChatStore::new(db))))
}

/// A room name no other test run uses.
pub fn unique_name(prefix: &str) -> String {
    bookclub_common::id::prefixed_ulid(prefix)
}

pub async fn seed_user(db: &DbPool, username: &str, image_url: Option<&str>) {
    let mut conn = db.get().await.unwrap();
    diesel::insert_into(users::table)
        .values((users::username.eq(username), users::image_url.eq(image_url)))
        .on_conflict_do_nothing()
        .execute(&mut conn)
        .await
        .unwrap();
}

/// Delete rooms by name; memberships and messages cascade.
pub async fn cleanup_rooms(db: &DbPool, names: &[&str]) {
    let mut conn = db.get().await.unwrap();
    diesel::delete(rooms::table.filter(rooms::name.eq_any(names)))
        .execute(&mut conn)
        .await
        .unwrap();
}

pub async fn cleanup_users(db: &DbPool, usernames: &[&str]) {
    let mut conn = db.get().await.unwrap();
    diesel::delete(users::table.filter(users::username.eq_any(usernames)))
        .execute(&mut conn)
        .await
        .unwrap();
}
