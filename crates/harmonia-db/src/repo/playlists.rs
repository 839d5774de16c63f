use chrono::Utc;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::entities::{playlist, playlist_song, song};
use crate::page::{Page, PageParams};

#[derive(Debug, Clone, Default)]
pub struct PlaylistFilter {
    pub user_id: Option<i32>,
    pub keyword: Option<String>,
    pub is_public: Option<bool>,
    pub include_deleted: bool,
}

impl PlaylistFilter {
    fn condition(&self) -> Condition {
        let mut cond = Condition::all();
        if !self.include_deleted {
            cond = cond.add(playlist::Column::DeletedAt.is_null());
        }
        if let Some(ref keyword) = self.keyword {
            cond = cond.add(
                Expr::expr(Func::lower(Expr::col(playlist::Column::Name)))
                    .like(super::like_pattern(keyword)),
            );
        }
        cond.add_option(self.user_id.map(|id| playlist::Column::UserId.eq(id)))
            .add_option(self.is_public.map(|p| playlist::Column::IsPublic.eq(p)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaylistSort {
    Name,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl PlaylistSort {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("name") => Self::Name,
            Some("updated_at") => Self::UpdatedAt,
            _ => Self::CreatedAt,
        }
    }

    fn column(self) -> playlist::Column {
        match self {
            Self::Name => playlist::Column::Name,
            Self::CreatedAt => playlist::Column::CreatedAt,
            Self::UpdatedAt => playlist::Column::UpdatedAt,
        }
    }
}

pub async fn list(
    db: &DatabaseConnection,
    filter: &PlaylistFilter,
    sort: PlaylistSort,
    descending: bool,
    pages: PageParams,
) -> Result<Page<playlist::Model>, DbErr> {
    let query = playlist::Entity::find().filter(filter.condition());
    let query = if descending {
        query.order_by_desc(sort.column())
    } else {
        query.order_by_asc(sort.column())
    };

    let paginator = query.paginate(db, pages.page_size);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(pages.index()).await?;
    Ok(Page::new(items, pages, total))
}

pub async fn find_live(db: &DatabaseConnection, id: i32) -> Result<Option<playlist::Model>, DbErr> {
    playlist::Entity::find_by_id(id)
        .filter(playlist::Column::DeletedAt.is_null())
        .one(db)
        .await
}

pub async fn find_any(db: &DatabaseConnection, id: i32) -> Result<Option<playlist::Model>, DbErr> {
    playlist::Entity::find_by_id(id).one(db).await
}

pub async fn soft_delete(
    db: &DatabaseConnection,
    model: playlist::Model,
) -> Result<playlist::Model, DbErr> {
    let now = Utc::now().fixed_offset();
    let mut active: playlist::ActiveModel = model.into();
    active.deleted_at = Set(Some(now));
    active.updated_at = Set(now);
    active.update(db).await
}

pub async fn restore(
    db: &DatabaseConnection,
    model: playlist::Model,
) -> Result<playlist::Model, DbErr> {
    let mut active: playlist::ActiveModel = model.into();
    active.deleted_at = Set(None);
    active.updated_at = Set(Utc::now().fixed_offset());
    active.update(db).await
}

pub async fn membership(
    db: &DatabaseConnection,
    playlist_id: i32,
    song_id: i32,
) -> Result<Option<playlist_song::Model>, DbErr> {
    playlist_song::Entity::find_by_id((playlist_id, song_id))
        .one(db)
        .await
}

#[derive(Debug, FromQueryResult)]
struct MaxPosition {
    max_position: Option<i32>,
}

/// Appends at the end of the playlist (position = current max + 1, starting
/// at 1 for an empty playlist).
pub async fn add_song(
    db: &DatabaseConnection,
    playlist_id: i32,
    song_id: i32,
) -> Result<playlist_song::Model, DbErr> {
    let max_position = playlist_song::Entity::find()
        .select_only()
        .column_as(playlist_song::Column::Position.max(), "max_position")
        .filter(playlist_song::Column::PlaylistId.eq(playlist_id))
        .into_model::<MaxPosition>()
        .one(db)
        .await?
        .and_then(|row| row.max_position)
        .unwrap_or(0);

    playlist_song::ActiveModel {
        playlist_id: Set(playlist_id),
        song_id: Set(song_id),
        position: Set(max_position + 1),
        added_at: Set(Utc::now().fixed_offset()),
    }
    .insert(db)
    .await
}

/// Removes a song from the playlist. Positions of the remaining entries are
/// left untouched; ordering stays monotonic with gaps.
pub async fn remove_song(
    db: &DatabaseConnection,
    playlist_id: i32,
    song_id: i32,
) -> Result<bool, DbErr> {
    let res = playlist_song::Entity::delete_many()
        .filter(playlist_song::Column::PlaylistId.eq(playlist_id))
        .filter(playlist_song::Column::SongId.eq(song_id))
        .exec(db)
        .await?;
    Ok(res.rows_affected > 0)
}

/// Playlist entries joined to their songs in position order. Soft-deleted
/// songs stay listed so clients can render tombstones.
pub async fn songs_of(
    db: &DatabaseConnection,
    playlist_id: i32,
) -> Result<Vec<(playlist_song::Model, Option<song::Model>)>, DbErr> {
    playlist_song::Entity::find()
        .find_also_related(song::Entity)
        .filter(playlist_song::Column::PlaylistId.eq(playlist_id))
        .order_by_asc(playlist_song::Column::Position)
        .all(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use std::collections::BTreeMap;

    #[test]
    fn test_sort_parse_falls_back_to_created_at() {
        assert_eq!(PlaylistSort::parse(Some("name")), PlaylistSort::Name);
        assert_eq!(PlaylistSort::parse(Some("owner")), PlaylistSort::CreatedAt);
        assert_eq!(PlaylistSort::parse(None), PlaylistSort::CreatedAt);
    }

    #[tokio::test]
    async fn test_add_song_appends_after_current_max() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![BTreeMap::from([(
                "max_position",
                Value::Int(Some(4)),
            )])]])
            .append_query_results([vec![playlist_song::Model {
                playlist_id: 1,
                song_id: 9,
                position: 5,
                added_at: Utc::now().fixed_offset(),
            }]])
            .into_connection();

        let entry = add_song(&db, 1, 9).await.unwrap();
        assert_eq!(entry.position, 5);
        assert_eq!(db.into_transaction_log().len(), 2);
    }

    #[tokio::test]
    async fn test_add_song_starts_empty_playlist_at_one() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![BTreeMap::from([(
                "max_position",
                Value::Int(None),
            )])]])
            .append_query_results([vec![playlist_song::Model {
                playlist_id: 1,
                song_id: 9,
                position: 1,
                added_at: Utc::now().fixed_offset(),
            }]])
            .into_connection();

        let entry = add_song(&db, 1, 9).await.unwrap();
        assert_eq!(entry.position, 1);
    }

    #[tokio::test]
    async fn test_remove_song_reports_missing_membership() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        assert!(!remove_song(&db, 1, 9).await.unwrap());
    }
}
