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
                    .table(ListenHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ListenHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    // Null user = anonymous play
                    .col(ColumnDef::new(ListenHistory::UserId).integer().null())
                    .col(ColumnDef::new(ListenHistory::SongId).integer().not_null())
                    .col(
                        ColumnDef::new(ListenHistory::PlayedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_listen_history_user_id")
                            .from(ListenHistory::Table, ListenHistory::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_listen_history_song_id")
                            .from(ListenHistory::Table, ListenHistory::SongId)
                            .to(Songs::Table, Songs::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_listen_history_song_id")
                    .table(ListenHistory::Table)
                    .col(ListenHistory::SongId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_listen_history_played_at")
                    .table(ListenHistory::Table)
                    .col(ListenHistory::PlayedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ListenHistory::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ListenHistory {
    Table,
    Id,
    UserId,
    SongId,
    PlayedAt,
}
