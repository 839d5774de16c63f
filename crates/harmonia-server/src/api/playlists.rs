use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    Extension, Json,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::middleware::AuthUser;
use crate::error::ApiResult;
use crate::service;
use harmonia_db::entities::{playlist, playlist_song, song};
use harmonia_db::page::{Page, PageParams};
use harmonia_db::repo;
use harmonia_db::repo::playlists::{PlaylistFilter, PlaylistSort};
use harmonia_db::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PlaylistListParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub user_id: Option<i32>,
    pub keyword: Option<String>,
    pub is_public: Option<bool>,
    pub sort_by: Option<String>,
    pub desc: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct PlaylistResponse {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub user_id: i32,
    pub is_public: bool,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    pub deleted_at: Option<DateTime<FixedOffset>>,
    pub is_active: bool,
}

impl From<playlist::Model> for PlaylistResponse {
    fn from(p: playlist::Model) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            user_id: p.user_id,
            is_public: p.is_public,
            created_at: p.created_at,
            updated_at: p.updated_at,
            is_active: p.deleted_at.is_none(),
            deleted_at: p.deleted_at,
        }
    }
}

/// One playlist entry. `song` is the full song DTO, including tombstoned
/// songs so clients can render them as unavailable.
#[derive(Debug, Serialize)]
pub struct PlaylistEntryResponse {
    pub song_id: i32,
    pub position: i32,
    pub added_at: DateTime<FixedOffset>,
    pub song: Option<super::songs::SongResponse>,
}

impl From<(playlist_song::Model, Option<song::Model>)> for PlaylistEntryResponse {
    fn from((entry, song): (playlist_song::Model, Option<song::Model>)) -> Self {
        Self {
            song_id: entry.song_id,
            position: entry.position,
            added_at: entry.added_at,
            song: song.map(super::songs::SongResponse::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlaylistDetailResponse {
    #[serde(flatten)]
    pub playlist: PlaylistResponse,
    pub songs: Vec<PlaylistEntryResponse>,
}

/// Narrows a listing to what the viewer may see: private playlists appear
/// only when the owner lists their own.
fn effective_filter(params: PlaylistListParams, viewer: Option<i32>) -> PlaylistFilter {
    let mut filter = PlaylistFilter {
        user_id: params.user_id,
        keyword: params.keyword,
        is_public: params.is_public,
        include_deleted: false,
    };
    let owner_scoped = matches!((filter.user_id, viewer), (Some(u), Some(v)) if u == v);
    if !owner_scoped {
        filter.is_public = Some(true);
    }
    filter
}

/// GET /api/playlists
pub async fn list_playlists(
    State(state): State<Arc<AppState>>,
    viewer: Option<Extension<AuthUser>>,
    Query(params): Query<PlaylistListParams>,
) -> ApiResult<Json<Page<PlaylistResponse>>> {
    let viewer_id = viewer.map(|Extension(user)| user.0.sub);
    let sort = PlaylistSort::parse(params.sort_by.as_deref());
    let pages = PageParams::new(params.page, params.page_size);
    let descending = params.desc.unwrap_or(true);
    let filter = effective_filter(params, viewer_id);

    let page = repo::playlists::list(&state.db, &filter, sort, descending, pages).await?;
    Ok(Json(page.map(PlaylistResponse::from)))
}

/// GET /api/playlists/:id
pub async fn get_playlist(
    State(state): State<Arc<AppState>>,
    viewer: Option<Extension<AuthUser>>,
    Path(id): Path<i32>,
) -> ApiResult<Json<PlaylistDetailResponse>> {
    let viewer_id = viewer.map(|Extension(user)| user.0.sub);
    let found = service::playlists::fetch(&state.db, id, viewer_id).await?;

    let songs = repo::playlists::songs_of(&state.db, id)
        .await?
        .into_iter()
        .map(PlaylistEntryResponse::from)
        .collect();

    Ok(Json(PlaylistDetailResponse {
        playlist: PlaylistResponse::from(found),
        songs,
    }))
}

/// POST /api/playlists
pub async fn create_playlist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<service::playlists::CreatePlaylistRequest>,
) -> ApiResult<(StatusCode, [(header::HeaderName, String); 1], Json<PlaylistResponse>)> {
    let created = service::playlists::create(&state.db, user.0.sub, body).await?;
    let location = format!("/api/playlists/{}", created.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(PlaylistResponse::from(created)),
    ))
}

/// PUT /api/playlists/:id
pub async fn update_playlist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(body): Json<service::playlists::UpdatePlaylistRequest>,
) -> ApiResult<Json<PlaylistResponse>> {
    let updated = service::playlists::update(&state.db, user.0.sub, id, body).await?;
    Ok(Json(PlaylistResponse::from(updated)))
}

/// DELETE /api/playlists/:id
pub async fn delete_playlist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    service::playlists::delete(&state.db, user.0.sub, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/playlists/:id/restore
pub async fn restore_playlist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    service::playlists::restore(&state.db, user.0.sub, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/playlists/:id/songs
pub async fn add_playlist_song(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(body): Json<service::playlists::AddSongRequest>,
) -> ApiResult<StatusCode> {
    service::playlists::add_song(&state.db, user.0.sub, id, body).await?;
    Ok(StatusCode::CREATED)
}

/// DELETE /api/playlists/:id/songs/:song_id
pub async fn remove_playlist_song(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((id, song_id)): Path<(i32, i32)>,
) -> ApiResult<StatusCode> {
    service::playlists::remove_song(&state.db, user.0.sub, id, song_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_playlist(deleted: bool) -> playlist::Model {
        let now = Utc::now().fixed_offset();
        playlist::Model {
            id: 5,
            name: "Late Night".into(),
            description: Some("Wind-down mix".into()),
            user_id: 7,
            is_public: false,
            created_at: now,
            updated_at: now,
            deleted_at: deleted.then_some(now),
        }
    }

    #[test]
    fn test_response_derives_is_active() {
        assert!(PlaylistResponse::from(make_playlist(false)).is_active);
        assert!(!PlaylistResponse::from(make_playlist(true)).is_active);
    }

    #[test]
    fn test_detail_flattens_playlist_fields() {
        let detail = PlaylistDetailResponse {
            playlist: PlaylistResponse::from(make_playlist(false)),
            songs: vec![],
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["name"], "Late Night");
        assert_eq!(json["is_public"], false);
        assert!(json["songs"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_effective_filter_forces_public_for_anonymous() {
        let filter = effective_filter(PlaylistListParams::default(), None);
        assert_eq!(filter.is_public, Some(true));
    }

    #[test]
    fn test_effective_filter_forces_public_for_other_users_scope() {
        let params = PlaylistListParams {
            user_id: Some(7),
            ..Default::default()
        };
        let filter = effective_filter(params, Some(8));
        assert_eq!(filter.is_public, Some(true));
        assert_eq!(filter.user_id, Some(7));
    }

    #[test]
    fn test_effective_filter_keeps_owner_scope_unrestricted() {
        let params = PlaylistListParams {
            user_id: Some(7),
            ..Default::default()
        };
        let filter = effective_filter(params, Some(7));
        assert_eq!(filter.is_public, None);
        assert_eq!(filter.user_id, Some(7));
    }

    #[test]
    fn test_effective_filter_owner_may_still_narrow_to_public() {
        let params = PlaylistListParams {
            user_id: Some(7),
            is_public: Some(true),
            ..Default::default()
        };
        let filter = effective_filter(params, Some(7));
        assert_eq!(filter.is_public, Some(true));
    }

    #[test]
    fn test_entry_response_keeps_tombstoned_song() {
        let now = Utc::now().fixed_offset();
        let entry = playlist_song::Model {
            playlist_id: 5,
            song_id: 31,
            position: 2,
            added_at: now,
        };
        let mut dead_song = song::Model {
            id: 31,
            title: "Gone".into(),
            artist_id: 4,
            album_id: None,
            duration_secs: 100,
            track_number: None,
            genre: None,
            audio_url: None,
            play_count: 0,
            like_count: 0,
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        dead_song.deleted_at = Some(now);

        let resp = PlaylistEntryResponse::from((entry, Some(dead_song)));
        assert_eq!(resp.position, 2);
        let song = resp.song.expect("song present");
        assert!(!song.is_active);
    }
}
