use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_users::Users;
use super::m20250101_000004_create_songs::Songs;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SongLikes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SongLikes::UserId).integer().not_null())
                    .col(ColumnDef::new(SongLikes::SongId).integer().not_null())
                    .col(
                        ColumnDef::new(SongLikes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(SongLikes::UserId)
                            .col(SongLikes::SongId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_song_likes_user_id")
                            .from(SongLikes::Table, SongLikes::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_song_likes_song_id")
                            .from(SongLikes::Table, SongLikes::SongId)
                            .to(Songs::Table, Songs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_song_likes_song_id")
                    .table(SongLikes::Table)
                    .col(SongLikes::SongId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SongLikes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum SongLikes {
    Table,
    UserId,
    SongId,
    CreatedAt,
}
