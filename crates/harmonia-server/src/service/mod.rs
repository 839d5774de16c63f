//! Cross-entity rules that sit between the HTTP handlers and the
//! repositories: referential checks, natural-key uniqueness, lifecycle
//! transitions, audit stamping, and derived-stat resyncs.

pub mod albums;
pub mod artists;
pub mod playlists;
pub mod songs;
