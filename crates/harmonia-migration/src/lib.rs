pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_users;
mod m20250101_000002_create_artists;
mod m20250101_000003_create_albums;
mod m20250101_000004_create_songs;
mod m20250101_000005_create_playlists;
mod m20250101_000006_create_playlist_songs;
mod m20250101_000007_create_song_likes;
mod m20250101_000008_create_listen_history;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_users::Migration),
            Box::new(m20250101_000002_create_artists::Migration),
            Box::new(m20250101_000003_create_albums::Migration),
            Box::new(m20250101_000004_create_songs::Migration),
            Box::new(m20250101_000005_create_playlists::Migration),
            Box::new(m20250101_000006_create_playlist_songs::Migration),
            Box::new(m20250101_000007_create_song_likes::Migration),
            Box::new(m20250101_000008_create_listen_history::Migration),
        ]
    }
}
