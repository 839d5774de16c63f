use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiResult;
use harmonia_db::page::PageParams;
use harmonia_db::repo;
use harmonia_db::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub songs: Vec<super::songs::SongResponse>,
    pub albums: Vec<super::albums::AlbumResponse>,
    pub artists: Vec<super::artists::ArtistResponse>,
}

/// GET /api/search?q=...
///
/// Case-insensitive title/name match across live songs, albums, and
/// artists, each section capped at `limit`.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResults>> {
    let keyword = params.q.trim().to_string();
    let limit = params.limit.unwrap_or(10).clamp(1, 50);
    let pages = PageParams::new(Some(1), Some(limit));

    let song_filter = repo::songs::SongFilter {
        keyword: Some(keyword.clone()),
        ..Default::default()
    };
    let song_page = repo::songs::list(
        &state.db,
        &song_filter,
        repo::songs::SongSort::default(),
        true,
        pages,
    )
    .await?;
    let songs = super::songs::with_names(&state.db, song_page).await?.items;

    let album_filter = repo::albums::AlbumFilter {
        keyword: Some(keyword.clone()),
        ..Default::default()
    };
    let album_page = repo::albums::list(
        &state.db,
        &album_filter,
        repo::albums::AlbumSort::default(),
        true,
        pages,
    )
    .await?;
    let albums = super::albums::with_names(&state.db, album_page).await?.items;

    let artist_filter = repo::artists::ArtistFilter {
        keyword: Some(keyword),
        ..Default::default()
    };
    let artists = repo::artists::list(
        &state.db,
        &artist_filter,
        repo::artists::ArtistSort::Name,
        false,
        pages,
    )
    .await?
    .items
    .into_iter()
    .map(super::artists::ArtistResponse::from)
    .collect();

    Ok(Json(SearchResults {
        songs,
        albums,
        artists,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_params_deserialization() {
        let params: SearchParams = serde_json::from_str(r#"{"q":"love","limit":25}"#).unwrap();
        assert_eq!(params.q, "love");
        assert_eq!(params.limit, Some(25));
    }

    #[test]
    fn test_search_params_minimal() {
        let params: SearchParams = serde_json::from_str(r#"{"q":"test"}"#).unwrap();
        assert_eq!(params.q, "test");
        assert!(params.limit.is_none());
    }

    #[test]
    fn test_search_results_serialization() {
        let results = SearchResults {
            songs: vec![],
            albums: vec![],
            artists: vec![],
        };
        let json = serde_json::to_value(&results).unwrap();
        assert!(json["songs"].as_array().unwrap().is_empty());
        assert!(json["albums"].as_array().unwrap().is_empty());
        assert!(json["artists"].as_array().unwrap().is_empty());
    }
}
