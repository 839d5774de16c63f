use axum::{extract::State, http::StatusCode, Json};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::jwt::{generate_token_pair, validate_token, TokenPair, TokenType};
use super::middleware::AuthUser;
use super::password::{hash_password, verify_password};
use crate::error::{ApiError, ApiResult};
use harmonia_db::entities::user;
use harmonia_db::AppState;

// ─── Request/Response DTOs ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        UserResponse {
            id: user.id,
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            role: user.role.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

fn validate_registration(body: &RegisterRequest) -> Result<(), ApiError> {
    if body.username.len() < 3 || body.username.len() > 64 {
        return Err(ApiError::field(
            "username",
            "Username must be between 3 and 64 characters",
        ));
    }

    if body.username.contains('@') || body.username.contains('/') || body.username.contains(' ') {
        return Err(ApiError::field(
            "username",
            "Username cannot contain @, / or spaces",
        ));
    }

    if body.password.len() < 8 {
        return Err(ApiError::field(
            "password",
            "Password must be at least 8 characters",
        ));
    }

    let email_ok = body.email.contains('@')
        && !body.email.starts_with('@')
        && !body.email.ends_with('@')
        && body
            .email
            .split('@')
            .nth(1)
            .map_or(false, |d| d.contains('.'))
        && body.email.len() <= 254;
    if !email_ok {
        return Err(ApiError::field("email", "Invalid email address"));
    }

    Ok(())
}

// ─── Handlers ──────────────────────────────────────────────────────

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    validate_registration(&body)?;

    let user_count = user::Entity::find().count(&state.db).await?;

    // Uniqueness spans deactivated accounts too; the columns carry unique
    // indexes and a tombstoned row still owns its name.
    let existing = user::Entity::find()
        .filter(
            user::Column::Username
                .eq(&body.username)
                .or(user::Column::Email.eq(&body.email)),
        )
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict(
            "Username or email already taken".to_string(),
        ));
    }

    let password_hash =
        hash_password(&body.password).map_err(|e| ApiError::Internal(format!("password hash: {e}")))?;

    // First registered user becomes the admin
    let role = if user_count == 0 {
        user::UserRole::Admin
    } else {
        user::UserRole::User
    };

    let now = chrono::Utc::now().fixed_offset();
    let created = user::ActiveModel {
        username: Set(body.username.clone()),
        email: Set(body.email.clone()),
        password_hash: Set(password_hash),
        display_name: Set(body.display_name.clone()),
        role: Set(role),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    let tokens = generate_token_pair(
        created.id,
        &created.username,
        created.role.as_str(),
        &state.jwt_secret,
    )
    .map_err(|e| ApiError::Internal(format!("token generation: {e}")))?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: created.into(),
            tokens,
        }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let found = user::Entity::find()
        .filter(user::Column::Username.eq(&body.username))
        .one(&state.db)
        .await?;

    let user = found.ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    let valid = verify_password(&body.password, &user.password_hash)
        .map_err(|e| ApiError::Internal(format!("password verify: {e}")))?;
    if !valid {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    // Deactivated accounts keep their row but cannot authenticate
    if user.deleted_at.is_some() {
        return Err(ApiError::Forbidden(
            "Account has been deactivated".to_string(),
        ));
    }

    let tokens = generate_token_pair(user.id, &user.username, user.role.as_str(), &state.jwt_secret)
        .map_err(|e| ApiError::Internal(format!("token generation: {e}")))?;

    Ok(Json(AuthResponse {
        user: user.into(),
        tokens,
    }))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    let claims = validate_token(&body.refresh_token, &state.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired refresh token".to_string()))?;

    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::Unauthorized("Invalid token type".to_string()));
    }

    // Verify user still exists and is active
    let user = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User no longer exists".to_string()))?;

    if user.deleted_at.is_some() {
        return Err(ApiError::Forbidden(
            "Account has been deactivated".to_string(),
        ));
    }

    let tokens = generate_token_pair(user.id, &user.username, user.role.as_str(), &state.jwt_secret)
        .map_err(|e| ApiError::Internal(format!("token generation: {e}")))?;

    Ok(Json(tokens))
}

/// GET /api/auth/me (requires auth)
pub async fn me(
    State(state): State<Arc<AppState>>,
    axum::Extension(auth_user): axum::Extension<AuthUser>,
) -> ApiResult<Json<UserResponse>> {
    let user = user::Entity::find_by_id(auth_user.0.sub)
        .one(&state.db)
        .await?
        .filter(|u| u.deleted_at.is_none())
        .ok_or(ApiError::NotFound {
            entity: "User",
            id: auth_user.0.sub,
        })?;

    Ok(Json(user.into()))
}
