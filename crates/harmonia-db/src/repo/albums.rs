use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};

use std::collections::HashMap;

use crate::entities::{album, song};
use crate::page::{Page, PageParams};

#[derive(Debug, Clone, Default)]
pub struct AlbumFilter {
    pub artist_id: Option<i32>,
    pub keyword: Option<String>,
    pub genre: Option<String>,
    pub released_from: Option<NaiveDate>,
    pub released_to: Option<NaiveDate>,
    pub include_deleted: bool,
}

impl AlbumFilter {
    fn condition(&self) -> Condition {
        let mut cond = Condition::all();
        if !self.include_deleted {
            cond = cond.add(album::Column::DeletedAt.is_null());
        }
        if let Some(ref keyword) = self.keyword {
            cond = cond.add(
                Expr::expr(Func::lower(Expr::col(album::Column::Title)))
                    .like(super::like_pattern(keyword)),
            );
        }
        cond.add_option(self.artist_id.map(|id| album::Column::ArtistId.eq(id)))
            .add_option(self.genre.clone().map(|g| album::Column::Genre.eq(g)))
            .add_option(self.released_from.map(|d| album::Column::ReleaseDate.gte(d)))
            .add_option(self.released_to.map(|d| album::Column::ReleaseDate.lte(d)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlbumSort {
    Title,
    ReleaseDate,
    TotalTracks,
    TotalDuration,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl AlbumSort {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("title") => Self::Title,
            Some("release_date") => Self::ReleaseDate,
            Some("total_tracks") => Self::TotalTracks,
            Some("total_duration") => Self::TotalDuration,
            Some("updated_at") => Self::UpdatedAt,
            _ => Self::CreatedAt,
        }
    }

    fn column(self) -> album::Column {
        match self {
            Self::Title => album::Column::Title,
            Self::ReleaseDate => album::Column::ReleaseDate,
            Self::TotalTracks => album::Column::TotalTracks,
            Self::TotalDuration => album::Column::TotalDurationSecs,
            Self::CreatedAt => album::Column::CreatedAt,
            Self::UpdatedAt => album::Column::UpdatedAt,
        }
    }
}

pub async fn list(
    db: &DatabaseConnection,
    filter: &AlbumFilter,
    sort: AlbumSort,
    descending: bool,
    pages: PageParams,
) -> Result<Page<album::Model>, DbErr> {
    let query = album::Entity::find().filter(filter.condition());
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

pub async fn find_live(db: &DatabaseConnection, id: i32) -> Result<Option<album::Model>, DbErr> {
    album::Entity::find_by_id(id)
        .filter(album::Column::DeletedAt.is_null())
        .one(db)
        .await
}

pub async fn find_any(db: &DatabaseConnection, id: i32) -> Result<Option<album::Model>, DbErr> {
    album::Entity::find_by_id(id).one(db).await
}

/// True when the artist already has a live album with this title,
/// compared case-insensitively, excluding `exclude_id` on updates.
pub async fn title_taken(
    db: &DatabaseConnection,
    artist_id: i32,
    title: &str,
    exclude_id: Option<i32>,
) -> Result<bool, DbErr> {
    let mut query = album::Entity::find()
        .filter(album::Column::ArtistId.eq(artist_id))
        .filter(album::Column::DeletedAt.is_null())
        .filter(
            Expr::expr(Func::lower(Expr::col(album::Column::Title)))
                .eq(title.trim().to_lowercase()),
        );
    if let Some(id) = exclude_id {
        query = query.filter(album::Column::Id.ne(id));
    }
    Ok(query.count(db).await? > 0)
}

pub async fn soft_delete(
    db: &DatabaseConnection,
    model: album::Model,
    actor: i32,
) -> Result<album::Model, DbErr> {
    let now = Utc::now().fixed_offset();
    let mut active: album::ActiveModel = model.into();
    active.deleted_at = Set(Some(now));
    active.updated_at = Set(now);
    active.updated_by = Set(Some(actor));
    active.update(db).await
}

pub async fn restore(
    db: &DatabaseConnection,
    model: album::Model,
    actor: i32,
) -> Result<album::Model, DbErr> {
    let mut active: album::ActiveModel = model.into();
    active.deleted_at = Set(None);
    active.updated_at = Set(Utc::now().fixed_offset());
    active.updated_by = Set(Some(actor));
    active.update(db).await
}

#[derive(Debug, FromQueryResult)]
struct TitleRow {
    id: i32,
    title: String,
}

/// Album titles keyed by id, for batch-joining song listings. Lifecycle
/// state is ignored so tombstoned rows still resolve.
pub async fn titles_by_id(
    db: &DatabaseConnection,
    ids: Vec<i32>,
) -> Result<HashMap<i32, String>, DbErr> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = album::Entity::find()
        .select_only()
        .column(album::Column::Id)
        .column(album::Column::Title)
        .filter(album::Column::Id.is_in(ids))
        .into_model::<TitleRow>()
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|r| (r.id, r.title)).collect())
}

#[derive(Debug, FromQueryResult)]
struct AlbumRollup {
    track_count: i64,
    duration_sum: Option<i64>,
}

/// Recomputes `total_tracks` and `total_duration_secs` from the album's live
/// songs and persists the result. Idempotent; an album with no live songs
/// rolls up to zeros.
pub async fn recalculate_stats(
    db: &DatabaseConnection,
    model: album::Model,
) -> Result<album::Model, DbErr> {
    let rollup = song::Entity::find()
        .select_only()
        .column_as(song::Column::Id.count(), "track_count")
        .column_as(song::Column::DurationSecs.sum(), "duration_sum")
        .filter(song::Column::AlbumId.eq(model.id))
        .filter(song::Column::DeletedAt.is_null())
        .into_model::<AlbumRollup>()
        .one(db)
        .await?;

    let (track_count, duration_sum) = rollup
        .map(|r| (r.track_count, r.duration_sum.unwrap_or(0)))
        .unwrap_or((0, 0));

    let mut active: album::ActiveModel = model.into();
    active.total_tracks = Set(track_count as i32);
    active.total_duration_secs = Set(duration_sum);
    active.updated_at = Set(Utc::now().fixed_offset());
    active.update(db).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, QueryTrait, Value};
    use std::collections::BTreeMap;

    fn make_album(id: i32) -> album::Model {
        album::Model {
            id,
            title: "Blue Train".into(),
            artist_id: 1,
            release_date: NaiveDate::from_ymd_opt(1958, 1, 15),
            genre: Some("Jazz".into()),
            cover_url: None,
            total_tracks: 0,
            total_duration_secs: 0,
            created_by: Some(1),
            updated_by: None,
            created_at: Utc::now().fixed_offset(),
            updated_at: Utc::now().fixed_offset(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_sort_parse_known_values() {
        assert_eq!(AlbumSort::parse(Some("title")), AlbumSort::Title);
        assert_eq!(AlbumSort::parse(Some("Release_Date")), AlbumSort::ReleaseDate);
        assert_eq!(AlbumSort::parse(Some("total_tracks")), AlbumSort::TotalTracks);
        assert_eq!(
            AlbumSort::parse(Some("total_duration")),
            AlbumSort::TotalDuration
        );
    }

    #[test]
    fn test_sort_parse_falls_back_to_created_at() {
        assert_eq!(AlbumSort::parse(None), AlbumSort::CreatedAt);
        assert_eq!(AlbumSort::parse(Some("tracks")), AlbumSort::CreatedAt);
    }

    #[test]
    fn test_filter_release_window_is_inclusive_range() {
        let filter = AlbumFilter {
            released_from: NaiveDate::from_ymd_opt(1950, 1, 1),
            released_to: NaiveDate::from_ymd_opt(1959, 12, 31),
            ..Default::default()
        };
        let sql = album::Entity::find()
            .filter(filter.condition())
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#""release_date" >="#));
        assert!(sql.contains(r#""release_date" <="#));
    }

    #[tokio::test]
    async fn test_recalculate_writes_rollup_back() {
        let mut refreshed = make_album(3);
        refreshed.total_tracks = 7;
        refreshed.total_duration_secs = 2520;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![BTreeMap::from([
                ("track_count", Value::BigInt(Some(7))),
                ("duration_sum", Value::BigInt(Some(2520))),
            ])]])
            .append_query_results([vec![refreshed]])
            .into_connection();

        let updated = recalculate_stats(&db, make_album(3)).await.unwrap();
        assert_eq!(updated.total_tracks, 7);
        assert_eq!(updated.total_duration_secs, 2520);
        assert_eq!(db.into_transaction_log().len(), 2);
    }

    #[tokio::test]
    async fn test_recalculate_empty_album_rolls_up_to_zero() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![BTreeMap::from([
                ("track_count", Value::BigInt(Some(0))),
                ("duration_sum", Value::BigInt(None)),
            ])]])
            .append_query_results([vec![make_album(3)]])
            .into_connection();

        let updated = recalculate_stats(&db, make_album(3)).await.unwrap();
        assert_eq!(updated.total_tracks, 0);
        assert_eq!(updated.total_duration_secs, 0);
    }
}
