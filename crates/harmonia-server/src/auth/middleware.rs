use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::jwt::{validate_token, Claims, TokenType};
use crate::error::ApiError;
use harmonia_db::AppState;

/// Extension type to access authenticated user claims in handlers
#[derive(Clone, Debug)]
pub struct AuthUser(pub Claims);

/// Middleware: require valid access token
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return ApiError::Unauthorized("Missing or invalid Authorization header".to_string())
                .into_response();
        }
    };

    match validate_token(token, &state.jwt_secret) {
        Ok(claims) if claims.token_type == TokenType::Access => {
            request.extensions_mut().insert(AuthUser(claims));
            next.run(request).await
        }
        Ok(_) => ApiError::Unauthorized("Invalid token type, access token required".to_string())
            .into_response(),
        Err(_) => ApiError::Unauthorized("Invalid or expired token".to_string()).into_response(),
    }
}

/// Middleware: attach user claims when a valid access token is present,
/// but let anonymous requests through untouched.
///
/// Read endpoints use this so plays can be attributed to a listener and
/// private playlists resolved for their owner without forcing login.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(auth_header) = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
    {
        if auth_header.starts_with("Bearer ") {
            if let Ok(claims) = validate_token(&auth_header[7..], &state.jwt_secret) {
                if claims.token_type == TokenType::Access {
                    request.extensions_mut().insert(AuthUser(claims));
                }
            }
        }
    }
    next.run(request).await
}
