pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;

use std::sync::Arc;

use chat::history::MessageHistory;
use chat::registry::RoomRegistry;
use config::Config;
use db::store::ChatStore;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChatStore>,
    pub rooms: Arc<RoomRegistry>,
    pub history: MessageHistory,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire the registry and history service to one persistence backend.
    pub fn new(store: Arc<dyn ChatStore>, config: Config) -> Self {
        Self {
            rooms: Arc::new(RoomRegistry::new(store.clone())),
            history: MessageHistory::new(store.clone()),
            store,
            config: Arc::new(config),
        }
    }
}
