use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use harmonia_db::entities::song;
use harmonia_db::repo;

use super::albums;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSongRequest {
    pub title: String,
    pub artist_id: i32,
    pub album_id: Option<i32>,
    pub duration_secs: i32,
    pub track_number: Option<i16>,
    pub genre: Option<String>,
    pub audio_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct UpdateSongRequest {
    pub title: Option<String>,
    pub artist_id: Option<i32>,
    pub album_id: Option<i32>,
    pub duration_secs: Option<i32>,
    pub track_number: Option<i16>,
    pub genre: Option<String>,
    pub audio_url: Option<String>,
}

/// Creates a song under a live artist. When an album is given it must be
/// live and belong to the same artist; the album's derived stats are
/// refreshed after the insert.
pub async fn create(
    db: &DatabaseConnection,
    actor: i32,
    body: CreateSongRequest,
) -> ApiResult<song::Model> {
    let title = body.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::field("title", "Title must not be empty"));
    }
    if body.duration_secs <= 0 {
        return Err(ApiError::field(
            "duration_secs",
            "Duration must be greater than zero",
        ));
    }

    repo::artists::find_live(db, body.artist_id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "Artist",
            id: body.artist_id,
        })?;

    if let Some(album_id) = body.album_id {
        let album = repo::albums::find_live(db, album_id)
            .await?
            .ok_or(ApiError::NotFound {
                entity: "Album",
                id: album_id,
            })?;
        if album.artist_id != body.artist_id {
            return Err(ApiError::field(
                "album_id",
                format!("Album {album_id} belongs to a different artist"),
            ));
        }
    }

    let now = chrono::Utc::now().fixed_offset();
    let created = song::ActiveModel {
        title: Set(title),
        artist_id: Set(body.artist_id),
        album_id: Set(body.album_id),
        duration_secs: Set(body.duration_secs),
        track_number: Set(body.track_number),
        genre: Set(body.genre),
        audio_url: Set(body.audio_url),
        play_count: Set(0),
        like_count: Set(0),
        created_by: Set(Some(actor)),
        updated_by: Set(Some(actor)),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    if let Some(album_id) = created.album_id {
        albums::resync(db, album_id).await?;
    }

    Ok(created)
}

/// Applies the present fields onto a live song, re-checking the
/// artist/album pairing whenever either side changes. Stats are refreshed
/// on every album the change touches.
pub async fn update(
    db: &DatabaseConnection,
    actor: i32,
    id: i32,
    body: UpdateSongRequest,
) -> ApiResult<song::Model> {
    let existing = repo::songs::find_live(db, id)
        .await?
        .ok_or(ApiError::NotFound { entity: "Song", id })?;

    let new_title = match body.title {
        Some(title) => {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(ApiError::field("title", "Title must not be empty"));
            }
            Some(title)
        }
        None => None,
    };
    if let Some(duration) = body.duration_secs {
        if duration <= 0 {
            return Err(ApiError::field(
                "duration_secs",
                "Duration must be greater than zero",
            ));
        }
    }

    let target_artist = body.artist_id.unwrap_or(existing.artist_id);
    if target_artist != existing.artist_id {
        repo::artists::find_live(db, target_artist)
            .await?
            .ok_or(ApiError::NotFound {
                entity: "Artist",
                id: target_artist,
            })?;
    }

    let old_album = existing.album_id;
    let target_album = body.album_id.or(existing.album_id);
    if let Some(album_id) = body.album_id {
        let album = repo::albums::find_live(db, album_id)
            .await?
            .ok_or(ApiError::NotFound {
                entity: "Album",
                id: album_id,
            })?;
        if album.artist_id != target_artist {
            return Err(ApiError::field(
                "album_id",
                format!("Album {album_id} belongs to a different artist"),
            ));
        }
    } else if target_artist != existing.artist_id {
        // Keeping the current album while moving artists would orphan the
        // pairing; the album has to move with the song or be changed too.
        if let Some(album_id) = existing.album_id {
            if let Some(album) = repo::albums::find_any(db, album_id).await? {
                if album.artist_id != target_artist {
                    return Err(ApiError::field(
                        "album_id",
                        format!("Album {album_id} belongs to a different artist"),
                    ));
                }
            }
        }
    }

    let mut active: song::ActiveModel = existing.into();
    if let Some(title) = new_title {
        active.title = Set(title);
    }
    if let Some(artist_id) = body.artist_id {
        active.artist_id = Set(artist_id);
    }
    if let Some(album_id) = body.album_id {
        active.album_id = Set(Some(album_id));
    }
    if let Some(duration) = body.duration_secs {
        active.duration_secs = Set(duration);
    }
    if let Some(track_number) = body.track_number {
        active.track_number = Set(Some(track_number));
    }
    if let Some(genre) = body.genre {
        active.genre = Set(Some(genre));
    }
    if let Some(audio_url) = body.audio_url {
        active.audio_url = Set(Some(audio_url));
    }
    active.updated_by = Set(Some(actor));
    active.updated_at = Set(chrono::Utc::now().fixed_offset());

    let updated = active.update(db).await?;

    if old_album != target_album {
        if let Some(album_id) = old_album {
            albums::resync(db, album_id).await?;
        }
    }
    if let Some(album_id) = target_album {
        albums::resync(db, album_id).await?;
    }

    Ok(updated)
}

/// Active → Deleted; the owning album's stats drop the song.
pub async fn delete(db: &DatabaseConnection, actor: i32, id: i32) -> ApiResult<()> {
    let existing = repo::songs::find_any(db, id)
        .await?
        .ok_or(ApiError::NotFound { entity: "Song", id })?;
    if existing.deleted_at.is_some() {
        return Err(ApiError::InvalidState(format!(
            "Song {id} is already deleted"
        )));
    }

    let album_id = existing.album_id;
    repo::songs::soft_delete(db, existing, actor).await?;
    if let Some(album_id) = album_id {
        albums::resync(db, album_id).await?;
    }
    Ok(())
}

/// Deleted → Active; the owning album's stats pick the song back up.
pub async fn restore(db: &DatabaseConnection, actor: i32, id: i32) -> ApiResult<()> {
    let existing = repo::songs::find_any(db, id)
        .await?
        .ok_or(ApiError::NotFound { entity: "Song", id })?;
    if existing.deleted_at.is_none() {
        return Err(ApiError::InvalidState(format!("Song {id} is not deleted")));
    }

    let album_id = existing.album_id;
    repo::songs::restore(db, existing, actor).await?;
    if let Some(album_id) = album_id {
        albums::resync(db, album_id).await?;
    }
    Ok(())
}

/// Logs a play against a live song, attributed to the listener when one is
/// authenticated.
pub async fn play(db: &DatabaseConnection, id: i32, listener: Option<i32>) -> ApiResult<()> {
    repo::songs::find_live(db, id)
        .await?
        .ok_or(ApiError::NotFound { entity: "Song", id })?;
    repo::songs::record_play(db, id, listener).await?;
    Ok(())
}

/// Likes a live song for a user. Liking twice is a no-op.
pub async fn like(db: &DatabaseConnection, id: i32, user_id: i32) -> ApiResult<()> {
    repo::songs::find_live(db, id)
        .await?
        .ok_or(ApiError::NotFound { entity: "Song", id })?;
    repo::songs::like(db, id, user_id).await?;
    Ok(())
}

/// Removes a user's like from a live song. Unliking a song that was never
/// liked is a no-op.
pub async fn unlike(db: &DatabaseConnection, id: i32, user_id: i32) -> ApiResult<()> {
    repo::songs::find_live(db, id)
        .await?
        .ok_or(ApiError::NotFound { entity: "Song", id })?;
    repo::songs::unlike(db, id, user_id).await?;
    Ok(())
}
