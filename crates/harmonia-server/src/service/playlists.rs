use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use harmonia_db::entities::playlist;
use harmonia_db::repo;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct UpdatePlaylistRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddSongRequest {
    pub song_id: i32,
}

pub async fn create(
    db: &DatabaseConnection,
    owner: i32,
    body: CreatePlaylistRequest,
) -> ApiResult<playlist::Model> {
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::field("name", "Name must not be empty"));
    }

    let now = chrono::Utc::now().fixed_offset();
    let created = playlist::ActiveModel {
        name: Set(name),
        description: Set(body.description),
        user_id: Set(owner),
        is_public: Set(body.is_public.unwrap_or(false)),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(created)
}

/// Resolves a live playlist for a viewer. Private playlists are only
/// visible to their owner; everyone else gets the same NotFound a missing
/// id would produce.
pub async fn fetch(
    db: &DatabaseConnection,
    id: i32,
    viewer: Option<i32>,
) -> ApiResult<playlist::Model> {
    let found = repo::playlists::find_live(db, id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "Playlist",
            id,
        })?;
    if !found.is_public && viewer != Some(found.user_id) {
        return Err(ApiError::NotFound {
            entity: "Playlist",
            id,
        });
    }
    Ok(found)
}

pub async fn update(
    db: &DatabaseConnection,
    actor: i32,
    id: i32,
    body: UpdatePlaylistRequest,
) -> ApiResult<playlist::Model> {
    let existing = repo::playlists::find_live(db, id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "Playlist",
            id,
        })?;
    if existing.user_id != actor {
        return Err(ApiError::Forbidden("Not your playlist".to_string()));
    }

    let new_name = match body.name {
        Some(name) => {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ApiError::field("name", "Name must not be empty"));
            }
            Some(name)
        }
        None => None,
    };

    let mut active: playlist::ActiveModel = existing.into();
    if let Some(name) = new_name {
        active.name = Set(name);
    }
    if let Some(description) = body.description {
        active.description = Set(Some(description));
    }
    if let Some(is_public) = body.is_public {
        active.is_public = Set(is_public);
    }
    active.updated_at = Set(chrono::Utc::now().fixed_offset());
    Ok(active.update(db).await?)
}

pub async fn delete(db: &DatabaseConnection, actor: i32, id: i32) -> ApiResult<()> {
    let existing = repo::playlists::find_any(db, id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "Playlist",
            id,
        })?;
    if existing.user_id != actor {
        return Err(ApiError::Forbidden("Not your playlist".to_string()));
    }
    if existing.deleted_at.is_some() {
        return Err(ApiError::InvalidState(format!(
            "Playlist {id} is already deleted"
        )));
    }
    repo::playlists::soft_delete(db, existing).await?;
    Ok(())
}

pub async fn restore(db: &DatabaseConnection, actor: i32, id: i32) -> ApiResult<()> {
    let existing = repo::playlists::find_any(db, id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "Playlist",
            id,
        })?;
    if existing.user_id != actor {
        return Err(ApiError::Forbidden("Not your playlist".to_string()));
    }
    if existing.deleted_at.is_none() {
        return Err(ApiError::InvalidState(format!(
            "Playlist {id} is not deleted"
        )));
    }
    repo::playlists::restore(db, existing).await?;
    Ok(())
}

/// Appends a live song to the caller's playlist. Adding a song that is
/// already a member leaves the playlist unchanged.
pub async fn add_song(
    db: &DatabaseConnection,
    actor: i32,
    playlist_id: i32,
    body: AddSongRequest,
) -> ApiResult<()> {
    let found = repo::playlists::find_live(db, playlist_id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "Playlist",
            id: playlist_id,
        })?;
    if found.user_id != actor {
        return Err(ApiError::Forbidden("Not your playlist".to_string()));
    }

    repo::songs::find_live(db, body.song_id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "Song",
            id: body.song_id,
        })?;

    if repo::playlists::membership(db, playlist_id, body.song_id)
        .await?
        .is_some()
    {
        return Ok(());
    }
    repo::playlists::add_song(db, playlist_id, body.song_id).await?;
    Ok(())
}

pub async fn remove_song(
    db: &DatabaseConnection,
    actor: i32,
    playlist_id: i32,
    song_id: i32,
) -> ApiResult<()> {
    let found = repo::playlists::find_live(db, playlist_id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "Playlist",
            id: playlist_id,
        })?;
    if found.user_id != actor {
        return Err(ApiError::Forbidden("Not your playlist".to_string()));
    }

    if !repo::playlists::remove_song(db, playlist_id, song_id).await? {
        return Err(ApiError::NotFound {
            entity: "Song",
            id: song_id,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use harmonia_db::entities::{playlist_song, song};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};

    fn playlist_row(id: i32, user_id: i32, is_public: bool) -> playlist::Model {
        let now = chrono::Utc::now().fixed_offset();
        playlist::Model {
            id,
            name: "Morning Drive".to_string(),
            description: None,
            user_id,
            is_public,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn song_row(id: i32) -> song::Model {
        let now = chrono::Utc::now().fixed_offset();
        song::Model {
            id,
            title: "Take Five".to_string(),
            artist_id: 1,
            album_id: None,
            duration_secs: 324,
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
        }
    }

    fn membership_row(playlist_id: i32, song_id: i32) -> playlist_song::Model {
        playlist_song::Model {
            playlist_id,
            song_id,
            position: 1,
            added_at: chrono::Utc::now().fixed_offset(),
        }
    }

    #[tokio::test]
    async fn test_create_blank_name_fails_validation() {
        let db = DatabaseConnection::Disconnected;
        let body = CreatePlaylistRequest {
            name: "   ".to_string(),
            description: None,
            is_public: None,
        };

        let err = create(&db, 7, body).await.unwrap_err();
        match err {
            ApiError::Validation { fields, .. } => assert!(fields.contains_key("name")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_private_playlist_hidden_from_stranger() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![playlist_row(1, 7, false)]])
            .into_connection();

        let err = fetch(&db, 1, Some(8)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound { entity: "Playlist", .. }));
    }

    #[tokio::test]
    async fn test_fetch_private_playlist_hidden_from_anonymous() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![playlist_row(1, 7, false)]])
            .into_connection();

        let err = fetch(&db, 1, None).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_fetch_private_playlist_visible_to_owner() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![playlist_row(1, 7, false)]])
            .into_connection();

        let found = fetch(&db, 1, Some(7)).await.unwrap();
        assert_eq!(found.user_id, 7);
    }

    #[tokio::test]
    async fn test_update_by_non_owner_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![playlist_row(1, 7, true)]])
            .into_connection();

        let err = update(&db, 8, 1, UpdatePlaylistRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        assert_eq!(db.into_transaction_log().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_already_deleted_is_invalid_state() {
        let mut row = playlist_row(1, 7, true);
        row.deleted_at = Some(chrono::Utc::now().fixed_offset());

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row]])
            .into_connection();

        let err = delete(&db, 7, 1).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_add_song_appends_new_member() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![playlist_row(1, 7, false)]])
            .append_query_results([vec![song_row(9)]])
            .append_query_results([Vec::<playlist_song::Model>::new()])
            .append_query_results([vec![std::collections::BTreeMap::from([(
                "max_position",
                sea_orm::Value::Int(None),
            )])]])
            .append_query_results([vec![membership_row(1, 9)]])
            .into_connection();

        add_song(&db, 7, 1, AddSongRequest { song_id: 9 }).await.unwrap();
        assert_eq!(db.into_transaction_log().len(), 5);
    }

    #[tokio::test]
    async fn test_add_song_twice_is_noop() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![playlist_row(1, 7, false)]])
            .append_query_results([vec![song_row(9)]])
            .append_query_results([vec![membership_row(1, 9)]])
            .into_connection();

        add_song(&db, 7, 1, AddSongRequest { song_id: 9 }).await.unwrap();
        // membership hit short-circuits before the insert
        assert_eq!(db.into_transaction_log().len(), 3);
    }

    #[tokio::test]
    async fn test_add_song_dead_song_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![playlist_row(1, 7, false)]])
            .append_query_results([Vec::<song::Model>::new()])
            .into_connection();

        let err = add_song(&db, 7, 1, AddSongRequest { song_id: 9 })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound { entity: "Song", .. }));
        assert_eq!(db.into_transaction_log().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_absent_song_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![playlist_row(1, 7, false)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let err = remove_song(&db, 7, 1, 9).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound { entity: "Song", .. }));
    }

    #[test]
    fn test_create_request_rejects_unknown_fields() {
        let raw = r#"{"name":"Mix","owner_id":3}"#;
        assert!(serde_json::from_str::<CreatePlaylistRequest>(raw).is_err());
    }
}
