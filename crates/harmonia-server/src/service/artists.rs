use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use harmonia_db::entities::artist;
use harmonia_db::repo;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateArtistRequest {
    pub name: String,
    pub bio: Option<String>,
    pub country: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct UpdateArtistRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub country: Option<String>,
    pub image_url: Option<String>,
}

/// Creates an artist. The name must be unique among live artists,
/// compared case-insensitively.
pub async fn create(
    db: &DatabaseConnection,
    actor: i32,
    body: CreateArtistRequest,
) -> ApiResult<artist::Model> {
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::field("name", "Name must not be empty"));
    }

    if repo::artists::name_taken(db, &name, None).await? {
        return Err(ApiError::Conflict(format!("Artist '{name}' already exists")));
    }

    let now = chrono::Utc::now().fixed_offset();
    let created = artist::ActiveModel {
        name: Set(name),
        bio: Set(body.bio),
        country: Set(body.country),
        image_url: Set(body.image_url),
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

/// Applies the present fields onto a live artist. Renaming to a name held
/// by another live artist is a conflict; renaming to the current name is a
/// no-op and allowed.
pub async fn update(
    db: &DatabaseConnection,
    actor: i32,
    id: i32,
    body: UpdateArtistRequest,
) -> ApiResult<artist::Model> {
    let existing = repo::artists::find_live(db, id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "Artist",
            id,
        })?;

    let mut active: artist::ActiveModel = existing.into();
    if let Some(name) = body.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::field("name", "Name must not be empty"));
        }
        if repo::artists::name_taken(db, &name, Some(id)).await? {
            return Err(ApiError::Conflict(format!("Artist '{name}' already exists")));
        }
        active.name = Set(name);
    }
    if let Some(bio) = body.bio {
        active.bio = Set(Some(bio));
    }
    if let Some(country) = body.country {
        active.country = Set(Some(country));
    }
    if let Some(image_url) = body.image_url {
        active.image_url = Set(Some(image_url));
    }
    active.updated_by = Set(Some(actor));
    active.updated_at = Set(chrono::Utc::now().fixed_offset());

    Ok(active.update(db).await?)
}

/// Active → Deleted. Deleting an already-deleted artist is an invalid
/// state transition, distinct from NotFound.
pub async fn delete(db: &DatabaseConnection, actor: i32, id: i32) -> ApiResult<()> {
    let existing = repo::artists::find_any(db, id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "Artist",
            id,
        })?;
    if existing.deleted_at.is_some() {
        return Err(ApiError::InvalidState(format!(
            "Artist {id} is already deleted"
        )));
    }
    repo::artists::soft_delete(db, existing, actor).await?;
    Ok(())
}

/// Deleted → Active.
pub async fn restore(db: &DatabaseConnection, actor: i32, id: i32) -> ApiResult<()> {
    let existing = repo::artists::find_any(db, id)
        .await?
        .ok_or(ApiError::NotFound {
            entity: "Artist",
            id,
        })?;
    if existing.deleted_at.is_none() {
        return Err(ApiError::InvalidState(format!("Artist {id} is not deleted")));
    }
    repo::artists::restore(db, existing, actor).await?;
    Ok(())
}
