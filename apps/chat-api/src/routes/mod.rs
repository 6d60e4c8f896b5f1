pub mod health;
pub mod rooms;

use axum::Router;
use utoipa::OpenApi;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::chat::server::router())
        .nest("/api/v1", rooms::router())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        rooms::list_room_messages,
        rooms::list_recent_rooms,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::models::message::Message,
            crate::models::message::RoomMessage,
            crate::models::user::MemberProfile,
            crate::chat::history::RecentRoom,
            health::HealthResponse,
            rooms::RoomMessagesResponse,
            rooms::RecentRoomsResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Rooms", description = "Room history"),
    )
)]
pub struct ApiDoc;
