use chrono::{DateTime, Duration, FixedOffset, Utc};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    FromQueryResult, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Set,
};
use serde::Serialize;
use std::collections::HashMap;

use crate::entities::{album, artist, listen_history, song};
use crate::page::{Page, PageParams};

/// Optional conjunctive filters for artist listings. Absent fields are
/// no-ops; soft-deleted rows are excluded unless `include_deleted` is set.
#[derive(Debug, Clone, Default)]
pub struct ArtistFilter {
    pub keyword: Option<String>,
    pub country: Option<String>,
    pub created_from: Option<DateTime<FixedOffset>>,
    pub created_to: Option<DateTime<FixedOffset>>,
    pub include_deleted: bool,
}

impl ArtistFilter {
    fn condition(&self) -> Condition {
        let mut cond = Condition::all();
        if !self.include_deleted {
            cond = cond.add(artist::Column::DeletedAt.is_null());
        }
        if let Some(ref keyword) = self.keyword {
            cond = cond.add(
                Expr::expr(Func::lower(Expr::col(artist::Column::Name)))
                    .like(super::like_pattern(keyword)),
            );
        }
        cond.add_option(self.country.clone().map(|c| artist::Column::Country.eq(c)))
            .add_option(self.created_from.map(|t| artist::Column::CreatedAt.gte(t)))
            .add_option(self.created_to.map(|t| artist::Column::CreatedAt.lte(t)))
    }
}

/// Sort keys accepted on artist listings. Unknown or absent values fall
/// back to `CreatedAt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtistSort {
    Name,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl ArtistSort {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("name") => Self::Name,
            Some("updated_at") => Self::UpdatedAt,
            _ => Self::CreatedAt,
        }
    }

    fn column(self) -> artist::Column {
        match self {
            Self::Name => artist::Column::Name,
            Self::CreatedAt => artist::Column::CreatedAt,
            Self::UpdatedAt => artist::Column::UpdatedAt,
        }
    }
}

/// Paged listing; the same narrowed query backs both the count and the page.
pub async fn list(
    db: &DatabaseConnection,
    filter: &ArtistFilter,
    sort: ArtistSort,
    descending: bool,
    pages: PageParams,
) -> Result<Page<artist::Model>, DbErr> {
    let query = artist::Entity::find().filter(filter.condition());
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

pub async fn find_live(db: &DatabaseConnection, id: i32) -> Result<Option<artist::Model>, DbErr> {
    artist::Entity::find_by_id(id)
        .filter(artist::Column::DeletedAt.is_null())
        .one(db)
        .await
}

/// Fetches regardless of lifecycle state; backs delete/restore and
/// `include_deleted` reads.
pub async fn find_any(db: &DatabaseConnection, id: i32) -> Result<Option<artist::Model>, DbErr> {
    artist::Entity::find_by_id(id).one(db).await
}

/// True when a live artist other than `exclude_id` already uses `name`,
/// compared case-insensitively.
pub async fn name_taken(
    db: &DatabaseConnection,
    name: &str,
    exclude_id: Option<i32>,
) -> Result<bool, DbErr> {
    let mut query = artist::Entity::find()
        .filter(artist::Column::DeletedAt.is_null())
        .filter(
            Expr::expr(Func::lower(Expr::col(artist::Column::Name)))
                .eq(name.trim().to_lowercase()),
        );
    if let Some(id) = exclude_id {
        query = query.filter(artist::Column::Id.ne(id));
    }
    Ok(query.count(db).await? > 0)
}

pub async fn soft_delete(
    db: &DatabaseConnection,
    model: artist::Model,
    actor: i32,
) -> Result<artist::Model, DbErr> {
    let now = Utc::now().fixed_offset();
    let mut active: artist::ActiveModel = model.into();
    active.deleted_at = Set(Some(now));
    active.updated_at = Set(now);
    active.updated_by = Set(Some(actor));
    active.update(db).await
}

pub async fn restore(
    db: &DatabaseConnection,
    model: artist::Model,
    actor: i32,
) -> Result<artist::Model, DbErr> {
    let mut active: artist::ActiveModel = model.into();
    active.deleted_at = Set(None);
    active.updated_at = Set(Utc::now().fixed_offset());
    active.updated_by = Set(Some(actor));
    active.update(db).await
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtistStatistics {
    pub album_count: u64,
    pub song_count: u64,
    pub total_plays: u64,
    pub total_duration_secs: i64,
}

#[derive(Debug, FromQueryResult)]
struct DurationSum {
    duration_sum: Option<i64>,
}

/// Aggregates over the artist's live albums and songs. Plays are counted
/// from listen history rather than the stored counters.
pub async fn statistics(
    db: &DatabaseConnection,
    artist_id: i32,
) -> Result<ArtistStatistics, DbErr> {
    let album_count = album::Entity::find()
        .filter(album::Column::ArtistId.eq(artist_id))
        .filter(album::Column::DeletedAt.is_null())
        .count(db)
        .await?;

    let song_count = song::Entity::find()
        .filter(song::Column::ArtistId.eq(artist_id))
        .filter(song::Column::DeletedAt.is_null())
        .count(db)
        .await?;

    let total_plays = listen_history::Entity::find()
        .join(JoinType::InnerJoin, listen_history::Relation::Song.def())
        .filter(song::Column::ArtistId.eq(artist_id))
        .filter(song::Column::DeletedAt.is_null())
        .count(db)
        .await?;

    let total_duration_secs = song::Entity::find()
        .select_only()
        .column_as(song::Column::DurationSecs.sum(), "duration_sum")
        .filter(song::Column::ArtistId.eq(artist_id))
        .filter(song::Column::DeletedAt.is_null())
        .into_model::<DurationSum>()
        .one(db)
        .await?
        .and_then(|row| row.duration_sum)
        .unwrap_or(0);

    Ok(ArtistStatistics {
        album_count,
        song_count,
        total_plays,
        total_duration_secs,
    })
}

#[derive(Debug, Clone, FromQueryResult, Serialize)]
pub struct RankedArtist {
    pub id: i32,
    pub name: String,
    pub image_url: Option<String>,
    pub listen_count: i64,
}

/// Live artists ranked by listens over the last seven days.
pub async fn trending(db: &DatabaseConnection, limit: u64) -> Result<Vec<RankedArtist>, DbErr> {
    let since = Utc::now().fixed_offset() - Duration::days(7);
    ranked(db, limit, Some(since)).await
}

/// Live artists ranked by all-time listens.
pub async fn top(db: &DatabaseConnection, limit: u64) -> Result<Vec<RankedArtist>, DbErr> {
    ranked(db, limit, None).await
}

#[derive(Debug, FromQueryResult)]
struct NameRow {
    id: i32,
    name: String,
}

/// Display names keyed by id, for batch-joining listings. Lifecycle state
/// is ignored so tombstoned rows still resolve.
pub async fn names_by_id(
    db: &DatabaseConnection,
    ids: Vec<i32>,
) -> Result<HashMap<i32, String>, DbErr> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = artist::Entity::find()
        .select_only()
        .column(artist::Column::Id)
        .column(artist::Column::Name)
        .filter(artist::Column::Id.is_in(ids))
        .into_model::<NameRow>()
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|r| (r.id, r.name)).collect())
}

async fn ranked(
    db: &DatabaseConnection,
    limit: u64,
    since: Option<DateTime<FixedOffset>>,
) -> Result<Vec<RankedArtist>, DbErr> {
    let mut query = artist::Entity::find()
        .select_only()
        .column(artist::Column::Id)
        .column(artist::Column::Name)
        .column(artist::Column::ImageUrl)
        .column_as(listen_history::Column::Id.count(), "listen_count")
        .join(JoinType::InnerJoin, artist::Relation::Song.def())
        .join(JoinType::InnerJoin, song::Relation::ListenHistory.def())
        .filter(artist::Column::DeletedAt.is_null())
        .filter(song::Column::DeletedAt.is_null());
    if let Some(since) = since {
        query = query.filter(listen_history::Column::PlayedAt.gte(since));
    }

    query
        .group_by(artist::Column::Id)
        .group_by(artist::Column::Name)
        .group_by(artist::Column::ImageUrl)
        .order_by_desc(listen_history::Column::Id.count())
        .limit(limit)
        .into_model::<RankedArtist>()
        .all(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, QueryTrait, Value};
    use std::collections::BTreeMap;

    fn make_artist(id: i32, name: &str) -> artist::Model {
        artist::Model {
            id,
            name: name.into(),
            bio: None,
            country: Some("SE".into()),
            image_url: None,
            created_by: Some(1),
            updated_by: None,
            created_at: Utc::now().fixed_offset(),
            updated_at: Utc::now().fixed_offset(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_sort_parse_known_values() {
        assert_eq!(ArtistSort::parse(Some("name")), ArtistSort::Name);
        assert_eq!(ArtistSort::parse(Some("NAME")), ArtistSort::Name);
        assert_eq!(ArtistSort::parse(Some("updated_at")), ArtistSort::UpdatedAt);
        assert_eq!(ArtistSort::parse(Some("created_at")), ArtistSort::CreatedAt);
    }

    #[test]
    fn test_sort_parse_falls_back_to_created_at() {
        assert_eq!(ArtistSort::parse(None), ArtistSort::CreatedAt);
        assert_eq!(ArtistSort::parse(Some("bogus")), ArtistSort::CreatedAt);
        assert_eq!(ArtistSort::parse(Some("")), ArtistSort::CreatedAt);
    }

    #[test]
    fn test_filter_excludes_deleted_by_default() {
        let sql = artist::Entity::find()
            .filter(ArtistFilter::default().condition())
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#""deleted_at" IS NULL"#));
    }

    #[test]
    fn test_filter_include_deleted_drops_lifecycle_predicate() {
        let filter = ArtistFilter {
            include_deleted: true,
            ..Default::default()
        };
        let sql = artist::Entity::find()
            .filter(filter.condition())
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(!sql.contains(r#""deleted_at" IS NULL"#));
    }

    #[test]
    fn test_filter_keyword_is_case_insensitive_and_escaped() {
        let filter = ArtistFilter {
            keyword: Some("A%B".into()),
            ..Default::default()
        };
        let sql = artist::Entity::find()
            .filter(filter.condition())
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains("LOWER"));
        assert!(sql.contains(r"%a\%b%"));
    }

    #[tokio::test]
    async fn test_list_builds_page_envelope() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![BTreeMap::from([(
                "num_items",
                Value::BigInt(Some(3)),
            )])]])
            .append_query_results([vec![make_artist(1, "Ana"), make_artist(2, "Bo")]])
            .into_connection();

        let page = list(
            &db,
            &ArtistFilter::default(),
            ArtistSort::CreatedAt,
            true,
            PageParams::new(Some(1), Some(2)),
        )
        .await
        .unwrap();

        assert_eq!(page.total_count, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 2);
        assert_eq!(db.into_transaction_log().len(), 2);
    }

    #[tokio::test]
    async fn test_statistics_decodes_aggregate_rows() {
        let count_row = |n: i64| BTreeMap::from([("num_items", Value::BigInt(Some(n)))]);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count_row(2)]])
            .append_query_results([vec![count_row(14)]])
            .append_query_results([vec![count_row(90)]])
            .append_query_results([vec![BTreeMap::from([(
                "duration_sum",
                Value::BigInt(Some(3600)),
            )])]])
            .into_connection();

        let stats = statistics(&db, 1).await.unwrap();
        assert_eq!(stats.album_count, 2);
        assert_eq!(stats.song_count, 14);
        assert_eq!(stats.total_plays, 90);
        assert_eq!(stats.total_duration_secs, 3600);
        assert_eq!(db.into_transaction_log().len(), 4);
    }

    #[tokio::test]
    async fn test_names_by_id_maps_rows() {
        let name_row = |id: i32, name: &str| {
            BTreeMap::from([
                ("id", Value::Int(Some(id))),
                ("name", Value::String(Some(Box::new(name.to_string())))),
            ])
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![name_row(1, "Ana"), name_row(2, "Bo")]])
            .into_connection();

        let names = names_by_id(&db, vec![1, 2]).await.unwrap();
        assert_eq!(names.get(&1).map(String::as_str), Some("Ana"));
        assert_eq!(names.get(&2).map(String::as_str), Some("Bo"));
    }

    #[tokio::test]
    async fn test_names_by_id_empty_input_queries_nothing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let names = names_by_id(&db, vec![]).await.unwrap();
        assert!(names.is_empty());
        assert!(db.into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn test_statistics_empty_catalog_sums_to_zero() {
        let count_row = || BTreeMap::from([("num_items", Value::BigInt(Some(0)))]);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count_row()]])
            .append_query_results([vec![count_row()]])
            .append_query_results([vec![count_row()]])
            .append_query_results([vec![BTreeMap::from([(
                "duration_sum",
                Value::BigInt(None),
            )])]])
            .into_connection();

        let stats = statistics(&db, 1).await.unwrap();
        assert_eq!(stats.total_duration_secs, 0);
        assert_eq!(stats.song_count, 0);
    }
}
