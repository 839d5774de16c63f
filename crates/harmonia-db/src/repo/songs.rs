use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::{listen_history, song, song_like};
use crate::page::{Page, PageParams};

#[derive(Debug, Clone, Default)]
pub struct SongFilter {
    pub artist_id: Option<i32>,
    pub album_id: Option<i32>,
    pub keyword: Option<String>,
    pub genre: Option<String>,
    /// `Some(true)` keeps album tracks only, `Some(false)` keeps singles.
    pub has_album: Option<bool>,
    pub created_from: Option<DateTime<FixedOffset>>,
    pub created_to: Option<DateTime<FixedOffset>>,
    pub include_deleted: bool,
}

impl SongFilter {
    fn condition(&self) -> Condition {
        let mut cond = Condition::all();
        if !self.include_deleted {
            cond = cond.add(song::Column::DeletedAt.is_null());
        }
        if let Some(ref keyword) = self.keyword {
            cond = cond.add(
                Expr::expr(Func::lower(Expr::col(song::Column::Title)))
                    .like(super::like_pattern(keyword)),
            );
        }
        if let Some(has_album) = self.has_album {
            cond = cond.add(if has_album {
                song::Column::AlbumId.is_not_null()
            } else {
                song::Column::AlbumId.is_null()
            });
        }
        cond.add_option(self.artist_id.map(|id| song::Column::ArtistId.eq(id)))
            .add_option(self.album_id.map(|id| song::Column::AlbumId.eq(id)))
            .add_option(self.genre.clone().map(|g| song::Column::Genre.eq(g)))
            .add_option(self.created_from.map(|t| song::Column::CreatedAt.gte(t)))
            .add_option(self.created_to.map(|t| song::Column::CreatedAt.lte(t)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SongSort {
    Title,
    Duration,
    PlayCount,
    LikeCount,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SongSort {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("title") => Self::Title,
            Some("duration") => Self::Duration,
            Some("play_count") => Self::PlayCount,
            Some("like_count") => Self::LikeCount,
            Some("updated_at") => Self::UpdatedAt,
            _ => Self::CreatedAt,
        }
    }

    fn column(self) -> song::Column {
        match self {
            Self::Title => song::Column::Title,
            Self::Duration => song::Column::DurationSecs,
            Self::PlayCount => song::Column::PlayCount,
            Self::LikeCount => song::Column::LikeCount,
            Self::CreatedAt => song::Column::CreatedAt,
            Self::UpdatedAt => song::Column::UpdatedAt,
        }
    }
}

pub async fn list(
    db: &DatabaseConnection,
    filter: &SongFilter,
    sort: SongSort,
    descending: bool,
    pages: PageParams,
) -> Result<Page<song::Model>, DbErr> {
    let query = song::Entity::find().filter(filter.condition());
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

/// Live songs of one album in track-number order, for album tracklists.
pub async fn tracklist(
    db: &DatabaseConnection,
    album_id: i32,
    pages: PageParams,
) -> Result<Page<song::Model>, DbErr> {
    let paginator = song::Entity::find()
        .filter(song::Column::AlbumId.eq(album_id))
        .filter(song::Column::DeletedAt.is_null())
        .order_by_asc(song::Column::TrackNumber)
        .paginate(db, pages.page_size);

    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(pages.index()).await?;
    Ok(Page::new(items, pages, total))
}

pub async fn find_live(db: &DatabaseConnection, id: i32) -> Result<Option<song::Model>, DbErr> {
    song::Entity::find_by_id(id)
        .filter(song::Column::DeletedAt.is_null())
        .one(db)
        .await
}

pub async fn find_any(db: &DatabaseConnection, id: i32) -> Result<Option<song::Model>, DbErr> {
    song::Entity::find_by_id(id).one(db).await
}

pub async fn soft_delete(
    db: &DatabaseConnection,
    model: song::Model,
    actor: i32,
) -> Result<song::Model, DbErr> {
    let now = Utc::now().fixed_offset();
    let mut active: song::ActiveModel = model.into();
    active.deleted_at = Set(Some(now));
    active.updated_at = Set(now);
    active.updated_by = Set(Some(actor));
    active.update(db).await
}

pub async fn restore(
    db: &DatabaseConnection,
    model: song::Model,
    actor: i32,
) -> Result<song::Model, DbErr> {
    let mut active: song::ActiveModel = model.into();
    active.deleted_at = Set(None);
    active.updated_at = Set(Utc::now().fixed_offset());
    active.updated_by = Set(Some(actor));
    active.update(db).await
}

/// Appends a listen-history row and bumps the stored play counter in place.
/// The counter update is a single SQL expression so concurrent plays do not
/// lose increments.
pub async fn record_play(
    db: &DatabaseConnection,
    song_id: i32,
    user_id: Option<i32>,
) -> Result<(), DbErr> {
    listen_history::ActiveModel {
        user_id: Set(user_id),
        song_id: Set(song_id),
        played_at: Set(Utc::now().fixed_offset()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    song::Entity::update_many()
        .col_expr(
            song::Column::PlayCount,
            Expr::col(song::Column::PlayCount).add(1),
        )
        .filter(song::Column::Id.eq(song_id))
        .exec(db)
        .await?;

    Ok(())
}

/// Records a like for the pair; returns false without writing when the user
/// already likes the song.
pub async fn like(db: &DatabaseConnection, song_id: i32, user_id: i32) -> Result<bool, DbErr> {
    let existing = song_like::Entity::find_by_id((user_id, song_id)).one(db).await?;
    if existing.is_some() {
        return Ok(false);
    }

    song_like::ActiveModel {
        user_id: Set(user_id),
        song_id: Set(song_id),
        created_at: Set(Utc::now().fixed_offset()),
    }
    .insert(db)
    .await?;

    song::Entity::update_many()
        .col_expr(
            song::Column::LikeCount,
            Expr::col(song::Column::LikeCount).add(1),
        )
        .filter(song::Column::Id.eq(song_id))
        .exec(db)
        .await?;

    Ok(true)
}

/// Removes a like; the counter is only decremented when a row was actually
/// deleted, and never below zero.
pub async fn unlike(db: &DatabaseConnection, song_id: i32, user_id: i32) -> Result<bool, DbErr> {
    let res = song_like::Entity::delete_many()
        .filter(song_like::Column::UserId.eq(user_id))
        .filter(song_like::Column::SongId.eq(song_id))
        .exec(db)
        .await?;

    if res.rows_affected == 0 {
        return Ok(false);
    }

    song::Entity::update_many()
        .col_expr(
            song::Column::LikeCount,
            Expr::col(song::Column::LikeCount).sub(1),
        )
        .filter(song::Column::Id.eq(song_id))
        .filter(song::Column::LikeCount.gt(0))
        .exec(db)
        .await?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, QueryTrait};

    #[test]
    fn test_sort_parse_known_values() {
        assert_eq!(SongSort::parse(Some("duration")), SongSort::Duration);
        assert_eq!(SongSort::parse(Some("play_count")), SongSort::PlayCount);
        assert_eq!(SongSort::parse(Some("LIKE_COUNT")), SongSort::LikeCount);
    }

    #[test]
    fn test_sort_parse_falls_back_to_created_at() {
        assert_eq!(SongSort::parse(None), SongSort::CreatedAt);
        assert_eq!(SongSort::parse(Some("plays")), SongSort::CreatedAt);
    }

    #[test]
    fn test_filter_has_album_tristate() {
        let with_album = SongFilter {
            has_album: Some(true),
            ..Default::default()
        };
        let sql = song::Entity::find()
            .filter(with_album.condition())
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#""album_id" IS NOT NULL"#));

        let singles = SongFilter {
            has_album: Some(false),
            ..Default::default()
        };
        let sql = song::Entity::find()
            .filter(singles.condition())
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#""album_id" IS NULL"#));

        let unset = SongFilter::default();
        let sql = song::Entity::find()
            .filter(unset.condition())
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(!sql.contains(r#""album_id" IS"#));
    }

    #[tokio::test]
    async fn test_like_is_noop_when_already_liked() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![song_like::Model {
                user_id: 4,
                song_id: 9,
                created_at: Utc::now().fixed_offset(),
            }]])
            .into_connection();

        let liked = like(&db, 9, 4).await.unwrap();
        assert!(!liked);
        // Only the membership lookup ran.
        assert_eq!(db.into_transaction_log().len(), 1);
    }

    #[tokio::test]
    async fn test_unlike_missing_row_skips_decrement() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let removed = unlike(&db, 9, 4).await.unwrap();
        assert!(!removed);
        assert_eq!(db.into_transaction_log().len(), 1);
    }

    #[tokio::test]
    async fn test_unlike_decrements_once() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .into_connection();

        let removed = unlike(&db, 9, 4).await.unwrap();
        assert!(removed);
        assert_eq!(db.into_transaction_log().len(), 2);
    }
}
