pub mod albums;
pub mod artists;
pub mod playlists;
pub mod search;
pub mod songs;

use serde::Deserialize;

/// Query parameters for single-entity GETs. `include_deleted` widens the
/// lookup to soft-deleted rows.
#[derive(Debug, Default, Deserialize)]
pub struct FetchParams {
    pub include_deleted: Option<bool>,
}
