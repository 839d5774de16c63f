use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    Extension, Json,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::service;
use harmonia_db::entities::artist;
use harmonia_db::page::{Page, PageParams};
use harmonia_db::repo;
use harmonia_db::repo::artists::{ArtistFilter, ArtistSort, ArtistStatistics, RankedArtist};
use harmonia_db::AppState;

use super::FetchParams;

#[derive(Debug, Default, Deserialize)]
pub struct ArtistListParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub keyword: Option<String>,
    pub country: Option<String>,
    pub created_from: Option<DateTime<FixedOffset>>,
    pub created_to: Option<DateTime<FixedOffset>>,
    pub sort_by: Option<String>,
    pub desc: Option<bool>,
    pub include_deleted: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ArtistResponse {
    pub id: i32,
    pub name: String,
    pub bio: Option<String>,
    pub country: Option<String>,
    pub image_url: Option<String>,
    pub created_by: Option<i32>,
    pub updated_by: Option<i32>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    pub deleted_at: Option<DateTime<FixedOffset>>,
    pub is_active: bool,
}

impl From<artist::Model> for ArtistResponse {
    fn from(a: artist::Model) -> Self {
        Self {
            id: a.id,
            name: a.name,
            bio: a.bio,
            country: a.country,
            image_url: a.image_url,
            created_by: a.created_by,
            updated_by: a.updated_by,
            created_at: a.created_at,
            updated_at: a.updated_at,
            is_active: a.deleted_at.is_none(),
            deleted_at: a.deleted_at,
        }
    }
}

/// GET /api/artists
pub async fn list_artists(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ArtistListParams>,
) -> ApiResult<Json<Page<ArtistResponse>>> {
    let filter = ArtistFilter {
        keyword: params.keyword,
        country: params.country,
        created_from: params.created_from,
        created_to: params.created_to,
        include_deleted: params.include_deleted.unwrap_or(false),
    };
    let sort = ArtistSort::parse(params.sort_by.as_deref());
    let pages = PageParams::new(params.page, params.page_size);

    let page = repo::artists::list(
        &state.db,
        &filter,
        sort,
        params.desc.unwrap_or(true),
        pages,
    )
    .await?;
    Ok(Json(page.map(ArtistResponse::from)))
}

/// GET /api/artists/:id
pub async fn get_artist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(params): Query<FetchParams>,
) -> ApiResult<Json<ArtistResponse>> {
    let found = if params.include_deleted.unwrap_or(false) {
        repo::artists::find_any(&state.db, id).await?
    } else {
        repo::artists::find_live(&state.db, id).await?
    };
    let artist = found.ok_or(ApiError::NotFound {
        entity: "Artist",
        id,
    })?;
    Ok(Json(ArtistResponse::from(artist)))
}

/// POST /api/artists
pub async fn create_artist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<service::artists::CreateArtistRequest>,
) -> ApiResult<(StatusCode, [(header::HeaderName, String); 1], Json<ArtistResponse>)> {
    let created = service::artists::create(&state.db, user.0.sub, body).await?;
    let location = format!("/api/artists/{}", created.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(ArtistResponse::from(created)),
    ))
}

/// PUT /api/artists/:id
pub async fn update_artist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(body): Json<service::artists::UpdateArtistRequest>,
) -> ApiResult<Json<ArtistResponse>> {
    let updated = service::artists::update(&state.db, user.0.sub, id, body).await?;
    Ok(Json(ArtistResponse::from(updated)))
}

/// DELETE /api/artists/:id
pub async fn delete_artist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    service::artists::delete(&state.db, user.0.sub, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/artists/:id/restore
pub async fn restore_artist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    service::artists::restore(&state.db, user.0.sub, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Artist Catalog ─────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CatalogParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

/// GET /api/artists/:id/songs
pub async fn artist_songs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(params): Query<CatalogParams>,
) -> ApiResult<Json<Page<super::songs::SongResponse>>> {
    repo::artists::find_live(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "Artist",
            id,
        })?;

    let filter = repo::songs::SongFilter {
        artist_id: Some(id),
        ..Default::default()
    };
    let page = repo::songs::list(
        &state.db,
        &filter,
        repo::songs::SongSort::default(),
        true,
        PageParams::new(params.page, params.page_size),
    )
    .await?;
    Ok(Json(super::songs::with_names(&state.db, page).await?))
}

/// GET /api/artists/:id/albums
pub async fn artist_albums(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(params): Query<CatalogParams>,
) -> ApiResult<Json<Page<super::albums::AlbumResponse>>> {
    repo::artists::find_live(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "Artist",
            id,
        })?;

    let filter = repo::albums::AlbumFilter {
        artist_id: Some(id),
        ..Default::default()
    };
    let page = repo::albums::list(
        &state.db,
        &filter,
        repo::albums::AlbumSort::default(),
        true,
        PageParams::new(params.page, params.page_size),
    )
    .await?;
    Ok(Json(super::albums::with_names(&state.db, page).await?))
}

/// GET /api/artists/:id/statistics
pub async fn artist_statistics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<Json<ArtistStatistics>> {
    repo::artists::find_live(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "Artist",
            id,
        })?;
    let stats = repo::artists::statistics(&state.db, id).await?;
    Ok(Json(stats))
}

// ─── Artist Rankings ────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct RankingParams {
    pub limit: Option<u64>,
}

impl RankingParams {
    fn limit(&self) -> u64 {
        self.limit.unwrap_or(10).clamp(1, 50)
    }
}

/// GET /api/artists/trending
pub async fn trending_artists(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RankingParams>,
) -> ApiResult<Json<Vec<RankedArtist>>> {
    let ranked = repo::artists::trending(&state.db, params.limit()).await?;
    Ok(Json(ranked))
}

/// GET /api/artists/top
pub async fn top_artists(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RankingParams>,
) -> ApiResult<Json<Vec<RankedArtist>>> {
    let ranked = repo::artists::top(&state.db, params.limit()).await?;
    Ok(Json(ranked))
}
