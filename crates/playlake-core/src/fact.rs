// Song play fact table
//
// A play is a `NextSong` event whose `song` title matches a catalog title.
// The title is the only link between the two sources, and it is a weak one:
// differently cased or punctuated titles never match in exact mode, and a
// title shared by several catalog songs yields one fact row per song.
// Events that match nothing are dropped, so fact coverage equals catalog
// coverage.

use arrow::array::{ArrayRef, Int64Array, RecordBatch};
use arrow::datatypes::{DataType, Field};
use std::sync::Arc;

use crate::engine::{JoinOn, KeyMatch, Predicate, Select, TabularEngine};
use crate::error::Result;
use crate::schema::field_names::{log, song, star, NEXT_SONG_PAGE};
use crate::schema::StarTable;
use crate::table::{conform, prepend_column};
use crate::time;

const CARRY_FROM_CATALOG: [Select<'static>; 2] =
    [Select::col(song::SONG_ID), Select::col(song::ARTIST_ID)];

/// Keep only `NextSong` events and attach their calendar breakdown.
///
/// The result feeds both the time dimension and the fact table.
pub fn select_plays<E>(engine: &E, events: &RecordBatch) -> Result<RecordBatch>
where
    E: TabularEngine + ?Sized,
{
    let plays = engine.filter(
        events,
        &Predicate::Equals {
            column: log::PAGE,
            value: NEXT_SONG_PAGE,
        },
    )?;
    tracing::debug!(
        events = events.num_rows(),
        plays = plays.num_rows(),
        "selected NextSong events"
    );
    time::derive(&plays)
}

/// Build the fact table from raw events and the song catalog.
pub fn build<E>(
    engine: &E,
    events: &RecordBatch,
    songs: &RecordBatch,
    matching: KeyMatch,
) -> Result<RecordBatch>
where
    E: TabularEngine + ?Sized,
{
    let plays = select_plays(engine, events)?;
    build_from_plays(engine, &plays, songs, matching)
}

/// Build the fact table from events already passed through [`select_plays`].
///
/// `songplay_id` counts up from 0 in play order and is only unique within
/// one run.
pub fn build_from_plays<E>(
    engine: &E,
    plays: &RecordBatch,
    songs: &RecordBatch,
    matching: KeyMatch,
) -> Result<RecordBatch>
where
    E: TabularEngine + ?Sized,
{
    let joined = engine.inner_join(
        plays,
        songs,
        &JoinOn {
            left: log::SONG,
            right: song::TITLE,
            carry: &CARRY_FROM_CATALOG,
            matching,
        },
    )?;
    let joined = engine.filter(&joined, &Predicate::NotBlank(song::SONG_ID))?;
    let joined = engine.filter(&joined, &Predicate::NotBlank(song::ARTIST_ID))?;

    let facts = engine.project(
        &joined,
        &[
            Select::col(star::START_TIME),
            Select::col(log::USER_ID),
            Select::col(log::LEVEL),
            Select::col(song::SONG_ID),
            Select::col(song::ARTIST_ID),
            Select::col(log::SESSION_ID),
            Select::col(log::LOCATION),
            Select::col(log::USER_AGENT),
            Select::col(star::YEAR),
            Select::col(star::MONTH),
        ],
    )?;

    let ids: ArrayRef = Arc::new(Int64Array::from_iter_values(0..facts.num_rows() as i64));
    let facts = prepend_column(
        &facts,
        Field::new(star::SONGPLAY_ID, DataType::Int64, false),
        ids,
    )?;

    tracing::debug!(
        plays = plays.num_rows(),
        facts = facts.num_rows(),
        "built song play facts"
    );

    conform(&facts, &StarTable::Songplays.schema())
}
