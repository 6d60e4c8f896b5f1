//! Read-side history endpoints.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::chat::history::RecentRoom;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::message::RoomMessage;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms/{name}/messages", get(list_room_messages))
        .route("/users/{username}/rooms", get(list_recent_rooms))
}

// ---------------------------------------------------------------------------
// GET /api/v1/rooms/{name}/messages
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomMessagesResponse {
    pub room: String,
    pub messages: Vec<RoomMessage>,
}

/// `GET /api/v1/rooms/{name}/messages`: Full history of a room, oldest first.
#[utoipa::path(
    get,
    path = "/api/v1/rooms/{name}/messages",
    tag = "Rooms",
    params(
        ("name" = String, Path, description = "Room name"),
    ),
    responses(
        (status = 200, description = "Room history", body = RoomMessagesResponse),
        (status = 404, description = "No such room", body = ApiErrorBody),
    ),
)]
pub async fn list_room_messages(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RoomMessagesResponse>, ApiError> {
    let messages = state.history.messages_for_room(&name).await?;
    Ok(Json(RoomMessagesResponse {
        room: name,
        messages,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/v1/users/{username}/rooms
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct RecentRoomsResponse {
    pub username: String,
    pub rooms: Vec<RecentRoom>,
}

/// `GET /api/v1/users/{username}/rooms`: The user's rooms, most recently
/// active first, with their last message and counterpart.
#[utoipa::path(
    get,
    path = "/api/v1/users/{username}/rooms",
    tag = "Rooms",
    params(
        ("username" = String, Path, description = "Username"),
    ),
    responses(
        (status = 200, description = "Recent rooms", body = RecentRoomsResponse),
    ),
)]
pub async fn list_recent_rooms(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<RecentRoomsResponse>, ApiError> {
    let rooms = state.history.last_message_per_room(&username).await?;
    Ok(Json(RecentRoomsResponse { username, rooms }))
}
