// Arrow schemas and physical layout of the five star-schema tables
//
// Each table knows its output directory (relative to the output root), its
// partition columns, and its schema. Natural keys are non-nullable; every
// other descriptive attribute may be null.

use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use std::fmt;
use std::sync::{Arc, OnceLock};

use super::field_names::{log, song, star};

/// The five tables written by a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StarTable {
    Songs,
    Artists,
    Users,
    Time,
    Songplays,
}

impl StarTable {
    pub const ALL: [StarTable; 5] = [
        StarTable::Songs,
        StarTable::Artists,
        StarTable::Users,
        StarTable::Time,
        StarTable::Songplays,
    ];

    /// Short name used in logs and error context
    pub fn name(&self) -> &'static str {
        match self {
            StarTable::Songs => "songs",
            StarTable::Artists => "artists",
            StarTable::Users => "users",
            StarTable::Time => "time",
            StarTable::Songplays => "songplays",
        }
    }

    /// Directory under the output root holding this table's files
    pub fn location(&self) -> &'static str {
        match self {
            StarTable::Songs => "songs.parquet",
            StarTable::Artists => "artist.parquet",
            StarTable::Users => "users.parquet",
            StarTable::Time => "timetable.parquet",
            StarTable::Songplays => "songplays.parquet",
        }
    }

    /// Columns that become Hive-style path segments, in path order
    pub fn partition_columns(&self) -> &'static [&'static str] {
        match self {
            StarTable::Songs => &[song::YEAR, song::ARTIST_ID],
            StarTable::Artists | StarTable::Users => &[],
            StarTable::Time | StarTable::Songplays => &[star::YEAR, star::MONTH],
        }
    }

    /// Natural or surrogate key that is unique within the table
    pub fn key_column(&self) -> &'static str {
        match self {
            StarTable::Songs => song::SONG_ID,
            StarTable::Artists => song::ARTIST_ID,
            StarTable::Users => log::USER_ID,
            StarTable::Time => star::START_TIME,
            StarTable::Songplays => star::SONGPLAY_ID,
        }
    }

    pub fn schema(&self) -> SchemaRef {
        match self {
            StarTable::Songs => cached(&SONGS, songs_schema),
            StarTable::Artists => cached(&ARTISTS, artists_schema),
            StarTable::Users => cached(&USERS, users_schema),
            StarTable::Time => cached(&TIME, time_schema),
            StarTable::Songplays => cached(&SONGPLAYS, songplays_schema),
        }
    }
}

impl fmt::Display for StarTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static SONGS: OnceLock<SchemaRef> = OnceLock::new();
static ARTISTS: OnceLock<SchemaRef> = OnceLock::new();
static USERS: OnceLock<SchemaRef> = OnceLock::new();
static TIME: OnceLock<SchemaRef> = OnceLock::new();
static SONGPLAYS: OnceLock<SchemaRef> = OnceLock::new();

fn cached(cell: &'static OnceLock<SchemaRef>, build: fn() -> Schema) -> SchemaRef {
    Arc::clone(cell.get_or_init(|| Arc::new(build())))
}

/// Zone of every normalized timestamp column. An offset rather than a
/// zone name, so Arrow can cast and render it without a tz database.
pub const START_TIME_ZONE: &str = "+00:00";

/// Arrow type of every normalized timestamp column
pub fn start_time_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some(START_TIME_ZONE.into()))
}

fn songs_schema() -> Schema {
    Schema::new(vec![
        Field::new(song::SONG_ID, DataType::Utf8, false),
        Field::new(song::TITLE, DataType::Utf8, true),
        Field::new(song::ARTIST_ID, DataType::Utf8, true),
        Field::new(song::YEAR, DataType::Int64, true),
        Field::new(song::DURATION, DataType::Float64, true),
    ])
}

fn artists_schema() -> Schema {
    Schema::new(vec![
        Field::new(song::ARTIST_ID, DataType::Utf8, false),
        Field::new(star::NAME, DataType::Utf8, true),
        Field::new(star::LOCATION, DataType::Utf8, true),
        Field::new(star::LATITUDE, DataType::Float64, true),
        Field::new(star::LONGITUDE, DataType::Float64, true),
    ])
}

fn users_schema() -> Schema {
    Schema::new(vec![
        Field::new(log::USER_ID, DataType::Utf8, false),
        Field::new(log::FIRST_NAME, DataType::Utf8, true),
        Field::new(log::LAST_NAME, DataType::Utf8, true),
        Field::new(log::GENDER, DataType::Utf8, true),
        Field::new(log::LEVEL, DataType::Utf8, true),
    ])
}

fn time_schema() -> Schema {
    Schema::new(vec![
        Field::new(star::START_TIME, start_time_type(), false),
        Field::new(star::HOUR, DataType::Int32, false),
        Field::new(star::DAY, DataType::Int32, false),
        Field::new(star::WEEK, DataType::Int32, false),
        Field::new(star::MONTH, DataType::Int32, false),
        Field::new(star::YEAR, DataType::Int32, false),
    ])
}

fn songplays_schema() -> Schema {
    Schema::new(vec![
        Field::new(star::SONGPLAY_ID, DataType::Int64, false),
        Field::new(star::START_TIME, start_time_type(), false),
        Field::new(log::USER_ID, DataType::Utf8, true),
        Field::new(log::LEVEL, DataType::Utf8, true),
        Field::new(song::SONG_ID, DataType::Utf8, false),
        Field::new(song::ARTIST_ID, DataType::Utf8, false),
        Field::new(log::SESSION_ID, DataType::Int64, true),
        Field::new(log::LOCATION, DataType::Utf8, true),
        Field::new(log::USER_AGENT, DataType::Utf8, true),
        Field::new(star::YEAR, DataType::Int32, false),
        Field::new(star::MONTH, DataType::Int32, false),
    ])
}
