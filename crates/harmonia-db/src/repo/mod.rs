//! Per-entity query composition: filters, sort allow-lists, paged listings,
//! soft-delete transitions, and the aggregate queries behind album stats and
//! artist rankings. Handlers and services stay free of raw query building.

pub mod albums;
pub mod artists;
pub mod playlists;
pub mod songs;

/// Builds a case-insensitive LIKE pattern from raw user input. SQL wildcards
/// are escaped so `%` and `_` in the input match literally.
fn like_pattern(input: &str) -> String {
    let escaped = input
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped.to_lowercase())
}
