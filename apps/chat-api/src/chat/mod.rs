pub mod connection;
pub mod events;
pub mod history;
pub mod registry;
pub mod room;
pub mod server;
pub mod sink;
