use chrono::NaiveDate;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use harmonia_db::entities::album;
use harmonia_db::repo;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAlbumRequest {
    pub title: String,
    pub artist_id: i32,
    pub release_date: Option<NaiveDate>,
    pub genre: Option<String>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct UpdateAlbumRequest {
    pub title: Option<String>,
    pub artist_id: Option<i32>,
    pub release_date: Option<NaiveDate>,
    pub genre: Option<String>,
    pub cover_url: Option<String>,
}

/// Creates an album under a live artist. The title must be unique among the
/// artist's live albums, compared case-insensitively. Derived stats start
/// at zero until songs are attached.
pub async fn create(
    db: &DatabaseConnection,
    actor: i32,
    body: CreateAlbumRequest,
) -> ApiResult<album::Model> {
    let title = body.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::field("title", "Title must not be empty"));
    }

    repo::artists::find_live(db, body.artist_id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "Artist",
            id: body.artist_id,
        })?;

    if repo::albums::title_taken(db, body.artist_id, &title, None).await? {
        return Err(ApiError::Conflict(format!(
            "Artist already has an album titled '{title}'"
        )));
    }

    let now = chrono::Utc::now().fixed_offset();
    let created = album::ActiveModel {
        title: Set(title),
        artist_id: Set(body.artist_id),
        release_date: Set(body.release_date),
        genre: Set(body.genre),
        cover_url: Set(body.cover_url),
        total_tracks: Set(0),
        total_duration_secs: Set(0),
        created_by: Set(Some(actor)),
        updated_by: Set(Some(actor)),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(created)
}

/// Applies the present fields onto a live album. Moving the album to
/// another artist requires that artist to be live; the title stays unique
/// within whichever artist ends up owning the album.
pub async fn update(
    db: &DatabaseConnection,
    actor: i32,
    id: i32,
    body: UpdateAlbumRequest,
) -> ApiResult<album::Model> {
    let existing = repo::albums::find_live(db, id)
        .await?
        .ok_or(ApiError::NotFound { entity: "Album", id })?;

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

    let target_artist = body.artist_id.unwrap_or(existing.artist_id);
    if target_artist != existing.artist_id {
        repo::artists::find_live(db, target_artist)
            .await?
            .ok_or(ApiError::NotFound {
                entity: "Artist",
                id: target_artist,
            })?;
    }

    if new_title.is_some() || body.artist_id.is_some() {
        let check_title = new_title.as_deref().unwrap_or(&existing.title);
        if repo::albums::title_taken(db, target_artist, check_title, Some(id)).await? {
            return Err(ApiError::Conflict(format!(
                "Artist already has an album titled '{check_title}'"
            )));
        }
    }

    let mut active: album::ActiveModel = existing.into();
    if let Some(title) = new_title {
        active.title = Set(title);
    }
    if let Some(artist_id) = body.artist_id {
        active.artist_id = Set(artist_id);
    }
    if let Some(release_date) = body.release_date {
        active.release_date = Set(Some(release_date));
    }
    if let Some(genre) = body.genre {
        active.genre = Set(Some(genre));
    }
    if let Some(cover_url) = body.cover_url {
        active.cover_url = Set(Some(cover_url));
    }
    active.updated_by = Set(Some(actor));
    active.updated_at = Set(chrono::Utc::now().fixed_offset());

    Ok(active.update(db).await?)
}

/// Active → Deleted.
pub async fn delete(db: &DatabaseConnection, actor: i32, id: i32) -> ApiResult<()> {
    let existing = repo::albums::find_any(db, id)
        .await?
        .ok_or(ApiError::NotFound { entity: "Album", id })?;
    if existing.deleted_at.is_some() {
        return Err(ApiError::InvalidState(format!(
            "Album {id} is already deleted"
        )));
    }
    repo::albums::soft_delete(db, existing, actor).await?;
    Ok(())
}

/// Deleted → Active.
pub async fn restore(db: &DatabaseConnection, actor: i32, id: i32) -> ApiResult<()> {
    let existing = repo::albums::find_any(db, id)
        .await?
        .ok_or(ApiError::NotFound { entity: "Album", id })?;
    if existing.deleted_at.is_none() {
        return Err(ApiError::InvalidState(format!("Album {id} is not deleted")));
    }
    repo::albums::restore(db, existing, actor).await?;
    Ok(())
}

/// Recomputes the album's derived track count and duration from its live
/// songs. Idempotent; running it twice with no catalog change yields the
/// same row.
pub async fn recalculate(db: &DatabaseConnection, id: i32) -> ApiResult<album::Model> {
    let album = repo::albums::find_live(db, id)
        .await?
        .ok_or(ApiError::NotFound { entity: "Album", id })?;
    Ok(repo::albums::recalculate_stats(db, album).await?)
}

/// Refreshes one album's stats after a song-side change, regardless of the
/// album's lifecycle state. Silently a no-op when the album is gone.
pub async fn resync(db: &DatabaseConnection, id: i32) -> ApiResult<()> {
    if let Some(album) = repo::albums::find_any(db, id).await? {
        repo::albums::recalculate_stats(db, album).await?;
    }
    Ok(())
}
