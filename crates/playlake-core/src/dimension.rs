// Dimension extraction: project a fixed column subset, then keep exactly one
// row per natural key.
//
// Which raw row survives is decided by an explicit total order (the
// dimension's own ordering, then every column ascending), never by whatever
// order the rows happened to arrive in.

use arrow::array::RecordBatch;
use arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};

use crate::engine::arrow_engine::column_by_name;
use crate::engine::{Predicate, Select, SortKey, TabularEngine};
use crate::error::{Result, TransformError};
use crate::schema::field_names::{log, song, star};
use crate::schema::StarTable;
use crate::table::conform;

/// Which event decides a user's `level` when a user appears many times
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserLevelPolicy {
    /// The most recent event wins
    #[default]
    Latest,
    /// The oldest event wins
    Earliest,
}

impl std::str::FromStr for UserLevelPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "latest" => Ok(UserLevelPolicy::Latest),
            "earliest" => Ok(UserLevelPolicy::Earliest),
            other => Err(format!(
                "unsupported user level policy: {}. Supported: latest, earliest",
                other
            )),
        }
    }
}

/// Declarative description of one dimension table
#[derive(Debug, Clone)]
pub struct DimensionSpec<'a> {
    pub table: StarTable,
    /// Source columns and their output names, in output order
    pub columns: Vec<Select<'a>>,
    /// Output name of the natural key
    pub key: &'a str,
    /// Ordering over source columns applied before "keep first"
    pub order: Vec<SortKey<'a>>,
}

impl DimensionSpec<'static> {
    pub fn songs() -> Self {
        Self {
            table: StarTable::Songs,
            columns: vec![
                Select::col(song::SONG_ID),
                Select::col(song::TITLE),
                Select::col(song::ARTIST_ID),
                Select::col(song::YEAR),
                Select::col(song::DURATION),
            ],
            key: song::SONG_ID,
            order: Vec::new(),
        }
    }

    pub fn artists() -> Self {
        Self {
            table: StarTable::Artists,
            columns: vec![
                Select::col(song::ARTIST_ID),
                Select::aliased(song::ARTIST_NAME, star::NAME),
                Select::aliased(song::ARTIST_LOCATION, star::LOCATION),
                Select::aliased(song::ARTIST_LATITUDE, star::LATITUDE),
                Select::aliased(song::ARTIST_LONGITUDE, star::LONGITUDE),
            ],
            key: song::ARTIST_ID,
            order: Vec::new(),
        }
    }

    pub fn users(policy: UserLevelPolicy) -> Self {
        let recency = match policy {
            UserLevelPolicy::Latest => SortKey::desc(log::TS),
            UserLevelPolicy::Earliest => SortKey::asc(log::TS),
        };
        Self {
            table: StarTable::Users,
            columns: vec![
                Select::col(log::USER_ID),
                Select::col(log::FIRST_NAME),
                Select::col(log::LAST_NAME),
                Select::col(log::GENDER),
                Select::col(log::LEVEL),
            ],
            key: log::USER_ID,
            order: vec![recency],
        }
    }

    pub fn time() -> Self {
        Self {
            table: StarTable::Time,
            columns: vec![
                Select::col(star::START_TIME),
                Select::col(star::HOUR),
                Select::col(star::DAY),
                Select::col(star::WEEK),
                Select::col(star::MONTH),
                Select::col(star::YEAR),
            ],
            key: star::START_TIME,
            order: Vec::new(),
        }
    }
}

/// Build a dimension table from `source` according to `spec`.
///
/// Rows with a null (or, for string keys, blank) natural key are excluded.
/// The result conforms to the dimension's star schema.
pub fn extract<E>(engine: &E, source: &RecordBatch, spec: &DimensionSpec<'_>) -> Result<RecordBatch>
where
    E: TabularEngine + ?Sized,
{
    let key_source = spec
        .columns
        .iter()
        .find(|c| c.alias == spec.key)
        .map(|c| c.source)
        .ok_or_else(|| TransformError::MissingColumn {
            column: spec.key.to_string(),
            available: spec
                .columns
                .iter()
                .map(|c| c.alias)
                .collect::<Vec<_>>()
                .join(", "),
        })?;

    let key_predicate = match column_by_name(source, key_source)?.data_type() {
        DataType::Utf8 => Predicate::NotBlank(key_source),
        _ => Predicate::NotNull(key_source),
    };
    let keyed = engine.filter(source, &key_predicate)?;

    // Ordering columns that are not part of the output ride along until the
    // duplicates are resolved.
    let mut working = spec.columns.clone();
    let mut order = Vec::with_capacity(spec.order.len());
    for sort_key in &spec.order {
        match spec.columns.iter().find(|c| c.source == sort_key.column) {
            Some(selected) => order.push(SortKey {
                column: selected.alias,
                descending: sort_key.descending,
            }),
            None => {
                working.push(Select::col(sort_key.column));
                order.push(*sort_key);
            }
        }
    }

    let projected = engine.project(&keyed, &working)?;
    let unique = engine.deduplicate(&projected, &[spec.key], &order)?;
    let output: Vec<Select<'_>> = spec.columns.iter().map(|c| Select::col(c.alias)).collect();
    let trimmed = engine.project(&unique, &output)?;

    tracing::debug!(
        table = %spec.table,
        source_rows = source.num_rows(),
        keyed_rows = keyed.num_rows(),
        output_rows = trimmed.num_rows(),
        "extracted dimension"
    );

    conform(&trimmed, &spec.table.schema())
}
