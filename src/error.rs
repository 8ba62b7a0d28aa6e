use serde_json::json;
use std::fmt::Display;

use anyhow::Error as anyhowError;
use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

/// Where a [`ChatError`] sits in the failure taxonomy. Everything except
/// `Infrastructure` is deterministic and recoverable by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    Validation,
    Authorization,
    Rate,
    NotFound,
    Infrastructure,
}

/// Domain error raised by the chat and notification services.
///
/// The `Display` form of every non-infrastructure variant is its wire code,
/// so it can be handed back to clients verbatim.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("UNAUTHORIZED")]
    Unauthorized,
    #[error("FORBIDDEN")]
    Forbidden,
    #[error("ROOM_NAME_INVALID_LENGTH")]
    RoomNameInvalidLength,
    #[error("ROOM_MEMBER_LIMIT_EXCEEDED")]
    RoomMemberLimitExceeded,
    #[error("MESSAGE_EMPTY")]
    MessageEmpty,
    #[error("MESSAGE_TOO_LONG")]
    MessageTooLong,
    #[error("INVALID_PAYLOAD: {0}")]
    InvalidPayload(String),
    #[error("SENDER_NOT_IN_ROOM")]
    SenderNotInRoom,
    #[error("ONLY_CREATOR_CAN_DELETE_ROOM")]
    OnlyCreatorCanDeleteRoom,
    #[error("NOT_ALLOWED_TO_EDIT_THIS_MESSAGE")]
    NotAllowedToEdit,
    #[error("NOT_ALLOWED_TO_DELETE_THIS_MESSAGE")]
    NotAllowedToDelete,
    #[error("NOT_ALLOWED_TO_CLEAR_ROOM")]
    NotAllowedToClearRoom,
    #[error("RATE_LIMIT_EXCEEDED")]
    RateLimitExceeded,
    #[error("ROOM_NOT_FOUND")]
    RoomNotFound,
    #[error("MESSAGE_NOT_FOUND")]
    MessageNotFound,
    #[error("NOTIFICATION_NOT_FOUND")]
    NotificationNotFound,
    #[error("store failure: {0:#}")]
    Store(anyhowError),
}

impl ChatError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::RoomNameInvalidLength => "ROOM_NAME_INVALID_LENGTH",
            Self::RoomMemberLimitExceeded => "ROOM_MEMBER_LIMIT_EXCEEDED",
            Self::MessageEmpty => "MESSAGE_EMPTY",
            Self::MessageTooLong => "MESSAGE_TOO_LONG",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::SenderNotInRoom => "SENDER_NOT_IN_ROOM",
            Self::OnlyCreatorCanDeleteRoom => "ONLY_CREATOR_CAN_DELETE_ROOM",
            Self::NotAllowedToEdit => "NOT_ALLOWED_TO_EDIT_THIS_MESSAGE",
            Self::NotAllowedToDelete => "NOT_ALLOWED_TO_DELETE_THIS_MESSAGE",
            Self::NotAllowedToClearRoom => "NOT_ALLOWED_TO_CLEAR_ROOM",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::MessageNotFound => "MESSAGE_NOT_FOUND",
            Self::NotificationNotFound => "NOTIFICATION_NOT_FOUND",
            Self::Store(_) => "INTERNAL_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized => ErrorKind::Auth,
            Self::RoomNameInvalidLength
            | Self::RoomMemberLimitExceeded
            | Self::MessageEmpty
            | Self::MessageTooLong
            | Self::InvalidPayload(_) => ErrorKind::Validation,
            Self::Forbidden
            | Self::SenderNotInRoom
            | Self::OnlyCreatorCanDeleteRoom
            | Self::NotAllowedToEdit
            | Self::NotAllowedToDelete
            | Self::NotAllowedToClearRoom => ErrorKind::Authorization,
            Self::RateLimitExceeded => ErrorKind::Rate,
            Self::RoomNotFound | Self::MessageNotFound | Self::NotificationNotFound => {
                ErrorKind::NotFound
            }
            Self::Store(_) => ErrorKind::Infrastructure,
        }
    }

    /// Message safe to show to the caller. Infrastructure causes stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Store(_) => "Something went wrong, please try again".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for ChatError {
    fn from(e: sqlx::Error) -> Self {
        ChatError::Store(e.into())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug)]
pub enum AppError {
    // 400 bad request
    BadRequest(anyhowError),
    // 401 unauthorized
    Unauthorized(anyhowError),
    // 403 forbidden
    Forbidden(anyhowError),
    // 404 not found
    NotFound(anyhowError),
    // 429 too many requests
    TooManyRequests(anyhowError),
    // 500 internal server error
    InternalServerError(anyhowError),
}

impl Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::BadRequest(e) => write!(f, "BadRequest: {}", e),
            AppError::Unauthorized(e) => write!(f, "Unauthorized: {}", e),
            AppError::Forbidden(e) => write!(f, "Forbidden: {}", e),
            AppError::NotFound(e) => write!(f, "NotFound: {}", e),
            AppError::TooManyRequests(e) => write!(f, "TooManyRequests: {}", e),
            AppError::InternalServerError(e) => write!(f, "InternalServerError: {}", e),
        }
    }
}

impl From<anyhowError> for AppError {
    fn from(e: anyhowError) -> Self {
        AppError::InternalServerError(e)
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        let message = anyhow::anyhow!(e.public_message());
        match e.kind() {
            ErrorKind::Auth => AppError::Unauthorized(message),
            ErrorKind::Validation => AppError::BadRequest(message),
            ErrorKind::Authorization => AppError::Forbidden(message),
            ErrorKind::Rate => AppError::TooManyRequests(message),
            ErrorKind::NotFound => AppError::NotFound(message),
            ErrorKind::Infrastructure => {
                tracing::error!(error = %e, "request failed on store access");
                AppError::InternalServerError(message)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match &self {
            Self::BadRequest(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Unauthorized(err) => (StatusCode::UNAUTHORIZED, err.to_string()),
            Self::Forbidden(err) => (StatusCode::FORBIDDEN, err.to_string()),
            Self::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            Self::TooManyRequests(err) => (StatusCode::TOO_MANY_REQUESTS, err.to_string()),
            Self::InternalServerError(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };

        #[cfg(debug_assertions)]
        let error_response = json!({
            "error": {
                "message": error_message,
                "type": format!("{:?}", self),
            }
        });

        #[cfg(not(debug_assertions))]
        let error_response = json!({
            "error": {
                "message": error_message,
            }
        });
        (status, axum::Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
