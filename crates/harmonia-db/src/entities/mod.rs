pub mod album;
pub mod artist;
pub mod listen_history;
pub mod playlist;
pub mod playlist_song;
pub mod song;
pub mod song_like;
pub mod user;
