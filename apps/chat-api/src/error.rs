use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// Failure of a single member's send capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The receiving side of the connection is gone.
    #[error("connection closed")]
    Closed,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors raised by the chat core (registry, rooms, handlers, history).
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("unrecognized message kind: {0}")]
    UnrecognizedMessage(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("connection has not joined a room")]
    NotJoined,

    #[error("connection is closed")]
    Closed,

    #[error("message delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("persistence error: {0}")]
    Persistence(String),
}

impl ChatError {
    /// Protocol-level errors are local to one inbound message; the connection
    /// stays open.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::UnrecognizedMessage(_)
                | Self::MalformedMessage(_)
                | Self::NotJoined
                | Self::Closed
        )
    }
}

impl From<diesel::result::Error> for ChatError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for ChatError {
    fn from(err: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Structured API error returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

/// Application-level error type that converts into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND".to_string(),
            message: message.into(),
        }
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            code: "DELIVERY_FAILED".to_string(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR".to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::RoomNotFound(name) => Self::not_found(format!("No such room: {name}")),
            ChatError::Delivery(err) => {
                tracing::warn!(?err, "delivery failed");
                Self::bad_gateway("Message delivery failed, please reconnect")
            }
            ChatError::Persistence(err) => {
                tracing::error!(%err, "database error");
                Self::internal("An internal error occurred")
            }
            err @ (ChatError::UnrecognizedMessage(_)
            | ChatError::MalformedMessage(_)
            | ChatError::NotJoined
            | ChatError::Closed) => Self::bad_request(err.to_string()),
        }
    }
}
