use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    Extension, Json,
};
use chrono::{DateTime, FixedOffset, NaiveDate};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::service;
use harmonia_db::entities::album;
use harmonia_db::page::{Page, PageParams};
use harmonia_db::repo;
use harmonia_db::repo::albums::{AlbumFilter, AlbumSort};
use harmonia_db::AppState;

use super::FetchParams;

#[derive(Debug, Default, Deserialize)]
pub struct AlbumListParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub artist_id: Option<i32>,
    pub keyword: Option<String>,
    pub genre: Option<String>,
    pub released_from: Option<NaiveDate>,
    pub released_to: Option<NaiveDate>,
    pub sort_by: Option<String>,
    pub desc: Option<bool>,
    pub include_deleted: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct AlbumResponse {
    pub id: i32,
    pub title: String,
    pub artist_id: i32,
    pub release_date: Option<NaiveDate>,
    pub genre: Option<String>,
    pub cover_url: Option<String>,
    pub total_tracks: i32,
    pub total_duration_secs: i64,
    pub created_by: Option<i32>,
    pub updated_by: Option<i32>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    pub deleted_at: Option<DateTime<FixedOffset>>,
    pub is_active: bool,
    /// Joined artist name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_name: Option<String>,
}

impl From<album::Model> for AlbumResponse {
    fn from(a: album::Model) -> Self {
        Self {
            id: a.id,
            title: a.title,
            artist_id: a.artist_id,
            release_date: a.release_date,
            genre: a.genre,
            cover_url: a.cover_url,
            total_tracks: a.total_tracks,
            total_duration_secs: a.total_duration_secs,
            created_by: a.created_by,
            updated_by: a.updated_by,
            created_at: a.created_at,
            updated_at: a.updated_at,
            is_active: a.deleted_at.is_none(),
            deleted_at: a.deleted_at,
            artist_name: None,
        }
    }
}

/// Batch-joins artist names onto a page of albums.
pub async fn with_names(
    db: &DatabaseConnection,
    page: Page<album::Model>,
) -> ApiResult<Page<AlbumResponse>> {
    let artist_ids: Vec<i32> = page
        .items
        .iter()
        .map(|a| a.artist_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let names = repo::artists::names_by_id(db, artist_ids).await?;

    Ok(page.map(|a| {
        let artist_name = names.get(&a.artist_id).cloned();
        let mut resp = AlbumResponse::from(a);
        resp.artist_name = artist_name;
        resp
    }))
}

/// GET /api/albums
pub async fn list_albums(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AlbumListParams>,
) -> ApiResult<Json<Page<AlbumResponse>>> {
    let filter = AlbumFilter {
        artist_id: params.artist_id,
        keyword: params.keyword,
        genre: params.genre,
        released_from: params.released_from,
        released_to: params.released_to,
        include_deleted: params.include_deleted.unwrap_or(false),
    };
    let sort = AlbumSort::parse(params.sort_by.as_deref());
    let pages = PageParams::new(params.page, params.page_size);

    let page = repo::albums::list(
        &state.db,
        &filter,
        sort,
        params.desc.unwrap_or(true),
        pages,
    )
    .await?;
    Ok(Json(with_names(&state.db, page).await?))
}

/// GET /api/albums/:id
pub async fn get_album(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(params): Query<FetchParams>,
) -> ApiResult<Json<AlbumResponse>> {
    let found = if params.include_deleted.unwrap_or(false) {
        repo::albums::find_any(&state.db, id).await?
    } else {
        repo::albums::find_live(&state.db, id).await?
    };
    let album = found.ok_or(ApiError::NotFound { entity: "Album", id })?;

    let names = repo::artists::names_by_id(&state.db, vec![album.artist_id]).await?;
    let artist_name = names.get(&album.artist_id).cloned();
    let mut resp = AlbumResponse::from(album);
    resp.artist_name = artist_name;
    Ok(Json(resp))
}

/// POST /api/albums
pub async fn create_album(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<service::albums::CreateAlbumRequest>,
) -> ApiResult<(StatusCode, [(header::HeaderName, String); 1], Json<AlbumResponse>)> {
    let created = service::albums::create(&state.db, user.0.sub, body).await?;
    let location = format!("/api/albums/{}", created.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(AlbumResponse::from(created)),
    ))
}

/// PUT /api/albums/:id
pub async fn update_album(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(body): Json<service::albums::UpdateAlbumRequest>,
) -> ApiResult<Json<AlbumResponse>> {
    let updated = service::albums::update(&state.db, user.0.sub, id, body).await?;
    Ok(Json(AlbumResponse::from(updated)))
}

/// DELETE /api/albums/:id
pub async fn delete_album(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    service::albums::delete(&state.db, user.0.sub, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/albums/:id/restore
pub async fn restore_album(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    service::albums::restore(&state.db, user.0.sub, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/albums/:id/songs
pub async fn album_songs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(params): Query<super::artists::CatalogParams>,
) -> ApiResult<Json<Page<super::songs::SongResponse>>> {
    repo::albums::find_live(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound { entity: "Album", id })?;

    let page = repo::songs::tracklist(
        &state.db,
        id,
        PageParams::new(params.page, params.page_size),
    )
    .await?;
    Ok(Json(super::songs::with_names(&state.db, page).await?))
}

/// POST /api/albums/:id/recalculate
pub async fn recalculate_album(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> ApiResult<Json<AlbumResponse>> {
    let refreshed = service::albums::recalculate(&state.db, id).await?;
    Ok(Json(AlbumResponse::from(refreshed)))
}
