// Arrow schemas for the two raw JSON sources
//
// Every field is nullable: the sources are semi-structured and a missing
// attribute is null-filled by the loader rather than rejecting the file.
// Fields that are never projected into an output table are still declared
// so that a catalog or log dump loads into one stable shape.

use arrow::datatypes::{DataType, Field, Schema};
use std::sync::{Arc, OnceLock};

use super::field_names::{log, song};

/// Returns a cached `Arc<Schema>` for song catalog records.
pub fn song_catalog_schema() -> Arc<Schema> {
    static SCHEMA: OnceLock<Arc<Schema>> = OnceLock::new();
    Arc::clone(SCHEMA.get_or_init(|| {
        Arc::new(Schema::new(vec![
            Field::new(song::NUM_SONGS, DataType::Int64, true),
            Field::new(song::ARTIST_ID, DataType::Utf8, true),
            Field::new(song::ARTIST_LATITUDE, DataType::Float64, true),
            Field::new(song::ARTIST_LONGITUDE, DataType::Float64, true),
            Field::new(song::ARTIST_LOCATION, DataType::Utf8, true),
            Field::new(song::ARTIST_NAME, DataType::Utf8, true),
            Field::new(song::SONG_ID, DataType::Utf8, true),
            Field::new(song::TITLE, DataType::Utf8, true),
            Field::new(song::DURATION, DataType::Float64, true),
            Field::new(song::YEAR, DataType::Int64, true),
        ]))
    }))
}

/// Returns a cached `Arc<Schema>` for listening-session log events.
pub fn log_event_schema() -> Arc<Schema> {
    static SCHEMA: OnceLock<Arc<Schema>> = OnceLock::new();
    Arc::clone(SCHEMA.get_or_init(|| {
        Arc::new(Schema::new(vec![
            Field::new(log::ARTIST, DataType::Utf8, true),
            Field::new(log::AUTH, DataType::Utf8, true),
            Field::new(log::FIRST_NAME, DataType::Utf8, true),
            Field::new(log::GENDER, DataType::Utf8, true),
            Field::new(log::ITEM_IN_SESSION, DataType::Int64, true),
            Field::new(log::LAST_NAME, DataType::Utf8, true),
            Field::new(log::LENGTH, DataType::Float64, true),
            Field::new(log::LEVEL, DataType::Utf8, true),
            Field::new(log::LOCATION, DataType::Utf8, true),
            Field::new(log::METHOD, DataType::Utf8, true),
            Field::new(log::PAGE, DataType::Utf8, true),
            Field::new(log::REGISTRATION, DataType::Float64, true),
            Field::new(log::SESSION_ID, DataType::Int64, true),
            Field::new(log::SONG, DataType::Utf8, true),
            Field::new(log::STATUS, DataType::Int64, true),
            Field::new(log::TS, DataType::Int64, true),
            Field::new(log::USER_AGENT, DataType::Utf8, true),
            Field::new(log::USER_ID, DataType::Utf8, true),
        ]))
    }))
}
