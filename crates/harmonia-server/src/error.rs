use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sea_orm::DbErr;
use serde_json::json;
use std::collections::BTreeMap;

/// Error type shared by all handlers and services.
///
/// Implements [`IntoResponse`] so handlers can return `ApiResult<T>` and
/// rely on `?`. Every variant maps to a JSON body with a human-readable
/// `message`; validation errors additionally carry a `fields` map.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i32 },

    #[error("{message}")]
    Validation {
        message: String,
        fields: BTreeMap<&'static str, String>,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Validation error with no per-field breakdown.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Validation error pinned to a single field.
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = BTreeMap::new();
        fields.insert(field, message.clone());
        ApiError::Validation { message, fields }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, label, message, fields) = match self {
            ApiError::NotFound { entity, id } => (
                StatusCode::NOT_FOUND,
                "Not found",
                format!("{entity} with id {id} not found"),
                None,
            ),
            ApiError::Validation { message, fields } => (
                StatusCode::BAD_REQUEST,
                "Validation failed",
                message,
                (!fields.is_empty()).then_some(fields),
            ),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "Conflict", message, None),
            ApiError::InvalidState(message) => {
                (StatusCode::BAD_REQUEST, "Invalid state", message, None)
            }
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized", message, None)
            }
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, "Forbidden", message, None),
            // Database and internal failures are logged server-side and
            // surfaced with a generic message. Clients never see a 500 or
            // driver details.
            ApiError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::BAD_REQUEST,
                    "Request failed",
                    "The request could not be processed".to_string(),
                    None,
                )
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::BAD_REQUEST,
                    "Request failed",
                    "The request could not be processed".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({ "message": message, "error": label });
        if let Some(fields) = fields {
            body["fields"] = json!(fields);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_maps_to_404() {
        let response = ApiError::NotFound {
            entity: "Artist",
            id: 42,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Artist with id 42 not found");
        assert_eq!(body["error"], "Not found");
        assert!(body.get("fields").is_none());
    }

    #[tokio::test]
    async fn test_validation_carries_fields_map() {
        let response = ApiError::field("album_id", "Album 7 belongs to artist 3").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["fields"]["album_id"], "Album 7 belongs to artist 3");
    }

    #[tokio::test]
    async fn test_validation_without_fields_omits_key() {
        let response = ApiError::validation("Title must not be empty").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Title must not be empty");
        assert!(body.get("fields").is_none());
    }

    #[tokio::test]
    async fn test_conflict_maps_to_409() {
        let response = ApiError::Conflict("Artist 'Muse' already exists".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_invalid_state_maps_to_400() {
        let response =
            ApiError::InvalidState("Artist 3 is already deleted".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unauthorized_and_forbidden() {
        let response = ApiError::Unauthorized("Missing authorization header".to_string())
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response =
            ApiError::Forbidden("Playlist 9 belongs to another user".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_database_error_is_sanitized() {
        let response =
            ApiError::Database(DbErr::Custom("connection reset".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "The request could not be processed");
        assert!(!body["message"].as_str().unwrap().contains("connection"));
    }
}
