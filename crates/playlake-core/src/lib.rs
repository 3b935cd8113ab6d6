// playlake-core - Pure star-schema transformation logic
//
// Raw song catalog + listening log tables in, five star-schema tables out.
// No I/O, no async, no runtime dependencies: loading and persisting tables is
// the storage layer's job, and relational work is delegated to a
// `TabularEngine` so the same logic can run against any engine that honours
// the operator contracts.

use arrow::array::RecordBatch;
use serde::{Deserialize, Serialize};

pub mod dimension;
pub mod engine;
pub mod error;
pub mod fact;
pub mod schema;
pub mod table;
pub mod time;

// Re-export commonly used types
pub use dimension::{DimensionSpec, UserLevelPolicy};
pub use engine::{ArrowEngine, JoinOn, KeyMatch, Predicate, Select, SortKey, TabularEngine};
pub use error::{Result, TransformError};
pub use schema::{log_event_schema, song_catalog_schema, StarTable};
pub use time::CalendarParts;

/// Knobs that change transformation semantics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOptions {
    /// How event song titles are compared with catalog titles
    #[serde(default)]
    pub title_match: KeyMatch,
    /// Which event decides a user's subscription level
    #[serde(default)]
    pub user_level: UserLevelPolicy,
}

/// Dimension tables derived from the song catalog
#[derive(Debug, Clone)]
pub struct CatalogTables {
    pub songs: RecordBatch,
    pub artists: RecordBatch,
}

/// Tables derived from the listening log (plus the songs dimension)
#[derive(Debug, Clone)]
pub struct LogTables {
    pub users: RecordBatch,
    pub time: RecordBatch,
    pub songplays: RecordBatch,
}

/// Build the songs and artists dimensions from a raw catalog table.
pub fn build_catalog_tables<E>(engine: &E, catalog: &RecordBatch) -> Result<CatalogTables>
where
    E: TabularEngine + ?Sized,
{
    Ok(CatalogTables {
        songs: dimension::extract(engine, catalog, &DimensionSpec::songs())?,
        artists: dimension::extract(engine, catalog, &DimensionSpec::artists())?,
    })
}

/// Build users, time and song plays from raw events and the songs dimension.
pub fn build_log_tables<E>(
    engine: &E,
    events: &RecordBatch,
    songs: &RecordBatch,
    options: &TransformOptions,
) -> Result<LogTables>
where
    E: TabularEngine + ?Sized,
{
    let users = dimension::extract(engine, events, &DimensionSpec::users(options.user_level))?;
    let plays = fact::select_plays(engine, events)?;
    let time = dimension::extract(engine, &plays, &DimensionSpec::time())?;
    let songplays = fact::build_from_plays(engine, &plays, songs, options.title_match)?;
    Ok(LogTables {
        users,
        time,
        songplays,
    })
}
