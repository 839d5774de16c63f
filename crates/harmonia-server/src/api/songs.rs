use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    Extension, Json,
};
use chrono::{DateTime, FixedOffset};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::service;
use harmonia_db::entities::song;
use harmonia_db::page::{Page, PageParams};
use harmonia_db::repo;
use harmonia_db::repo::songs::{SongFilter, SongSort};
use harmonia_db::AppState;

use super::FetchParams;

#[derive(Debug, Default, Deserialize)]
pub struct SongListParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub artist_id: Option<i32>,
    pub album_id: Option<i32>,
    pub keyword: Option<String>,
    pub genre: Option<String>,
    pub has_album: Option<bool>,
    pub created_from: Option<DateTime<FixedOffset>>,
    pub created_to: Option<DateTime<FixedOffset>>,
    pub sort_by: Option<String>,
    pub desc: Option<bool>,
    pub include_deleted: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SongResponse {
    pub id: i32,
    pub title: String,
    pub artist_id: i32,
    pub album_id: Option<i32>,
    pub duration_secs: i32,
    pub track_number: Option<i16>,
    pub genre: Option<String>,
    pub audio_url: Option<String>,
    pub play_count: i64,
    pub like_count: i64,
    pub created_by: Option<i32>,
    pub updated_by: Option<i32>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    pub deleted_at: Option<DateTime<FixedOffset>>,
    pub is_active: bool,
    /// Joined artist name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_name: Option<String>,
    /// Joined album title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_title: Option<String>,
}

impl From<song::Model> for SongResponse {
    fn from(s: song::Model) -> Self {
        Self {
            id: s.id,
            title: s.title,
            artist_id: s.artist_id,
            album_id: s.album_id,
            duration_secs: s.duration_secs,
            track_number: s.track_number,
            genre: s.genre,
            audio_url: s.audio_url,
            play_count: s.play_count,
            like_count: s.like_count,
            created_by: s.created_by,
            updated_by: s.updated_by,
            created_at: s.created_at,
            updated_at: s.updated_at,
            is_active: s.deleted_at.is_none(),
            deleted_at: s.deleted_at,
            artist_name: None,
            album_title: None,
        }
    }
}

/// Batch-joins artist names and album titles onto a page of songs.
pub async fn with_names(
    db: &DatabaseConnection,
    page: Page<song::Model>,
) -> ApiResult<Page<SongResponse>> {
    let artist_ids: Vec<i32> = page
        .items
        .iter()
        .map(|s| s.artist_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let album_ids: Vec<i32> = page
        .items
        .iter()
        .filter_map(|s| s.album_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let artist_names = repo::artists::names_by_id(db, artist_ids).await?;
    let album_titles = repo::albums::titles_by_id(db, album_ids).await?;

    Ok(page.map(|s| {
        let artist_name = artist_names.get(&s.artist_id).cloned();
        let album_title = s.album_id.and_then(|id| album_titles.get(&id).cloned());
        let mut resp = SongResponse::from(s);
        resp.artist_name = artist_name;
        resp.album_title = album_title;
        resp
    }))
}

/// GET /api/songs
pub async fn list_songs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SongListParams>,
) -> ApiResult<Json<Page<SongResponse>>> {
    let filter = SongFilter {
        artist_id: params.artist_id,
        album_id: params.album_id,
        keyword: params.keyword,
        genre: params.genre,
        has_album: params.has_album,
        created_from: params.created_from,
        created_to: params.created_to,
        include_deleted: params.include_deleted.unwrap_or(false),
    };
    let sort = SongSort::parse(params.sort_by.as_deref());
    let pages = PageParams::new(params.page, params.page_size);

    let page = repo::songs::list(
        &state.db,
        &filter,
        sort,
        params.desc.unwrap_or(true),
        pages,
    )
    .await?;
    Ok(Json(with_names(&state.db, page).await?))
}

/// GET /api/songs/:id
pub async fn get_song(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(params): Query<FetchParams>,
) -> ApiResult<Json<SongResponse>> {
    let found = if params.include_deleted.unwrap_or(false) {
        repo::songs::find_any(&state.db, id).await?
    } else {
        repo::songs::find_live(&state.db, id).await?
    };
    let song = found.ok_or(ApiError::NotFound { entity: "Song", id })?;

    let artist_names = repo::artists::names_by_id(&state.db, vec![song.artist_id]).await?;
    let album_titles =
        repo::albums::titles_by_id(&state.db, song.album_id.into_iter().collect()).await?;

    let artist_name = artist_names.get(&song.artist_id).cloned();
    let album_title = song.album_id.and_then(|id| album_titles.get(&id).cloned());
    let mut resp = SongResponse::from(song);
    resp.artist_name = artist_name;
    resp.album_title = album_title;
    Ok(Json(resp))
}

/// POST /api/songs
pub async fn create_song(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<service::songs::CreateSongRequest>,
) -> ApiResult<(StatusCode, [(header::HeaderName, String); 1], Json<SongResponse>)> {
    let created = service::songs::create(&state.db, user.0.sub, body).await?;
    let location = format!("/api/songs/{}", created.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(SongResponse::from(created)),
    ))
}

/// PUT /api/songs/:id
pub async fn update_song(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(body): Json<service::songs::UpdateSongRequest>,
) -> ApiResult<Json<SongResponse>> {
    let updated = service::songs::update(&state.db, user.0.sub, id, body).await?;
    Ok(Json(SongResponse::from(updated)))
}

/// DELETE /api/songs/:id
pub async fn delete_song(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    service::songs::delete(&state.db, user.0.sub, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/songs/:id/restore
pub async fn restore_song(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    service::songs::restore(&state.db, user.0.sub, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Plays and Likes ────────────────────────────────────────────────

/// POST /api/songs/:id/play
///
/// Public; the listen is attributed when the caller presents a valid
/// access token.
pub async fn play_song(
    State(state): State<Arc<AppState>>,
    listener: Option<Extension<AuthUser>>,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    let listener_id = listener.map(|Extension(user)| user.0.sub);
    service::songs::play(&state.db, id, listener_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/songs/:id/like
pub async fn like_song(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    service::songs::like(&state.db, id, user.0.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/songs/:id/like
pub async fn unlike_song(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    service::songs::unlike(&state.db, id, user.0.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}
